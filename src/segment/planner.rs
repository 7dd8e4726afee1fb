//! Outline planning: one beat per planned segment.

use crate::defaults::TARGET_SEGMENT_SECS;
use crate::provider::{OutlineProvider, OutlineRequest};
use crate::route::RouteDetails;
use crate::segment::error::{SegmentError, Stage};
use crate::story::Outline;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Segments needed to narrate `duration_secs` at the default segment length.
///
/// Always at least one, even for a zero-length route.
pub fn total_segments(duration_secs: u32) -> u32 {
    total_segments_for(duration_secs, TARGET_SEGMENT_SECS)
}

/// Segments needed to narrate `duration_secs` at `segment_secs` per segment.
pub fn total_segments_for(duration_secs: u32, segment_secs: u32) -> u32 {
    duration_secs.div_ceil(segment_secs.max(1)).max(1)
}

/// Plans the outline, failing closed to filler beats.
#[derive(Clone)]
pub struct OutlinePlanner {
    provider: Arc<dyn OutlineProvider>,
    timeout: Duration,
}

impl OutlinePlanner {
    pub fn new(provider: Arc<dyn OutlineProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Outline of exactly `total_segments` beats.
    ///
    /// Any provider failure or timeout yields a filler outline instead of an
    /// error, since the outline only guides the narrative.
    pub async fn plan(&self, route: &Arc<RouteDetails>, total_segments: u32) -> Outline {
        match self.try_plan(route, total_segments).await {
            Ok(outline) => {
                info!(beats = outline.len(), "planned story outline");
                outline
            }
            Err(error) => {
                warn!(%error, "using filler outline");
                Outline::filler(total_segments)
            }
        }
    }

    /// Ask the provider once, fitting its answer to `total_segments` beats.
    pub async fn try_plan(
        &self,
        route: &Arc<RouteDetails>,
        total_segments: u32,
    ) -> Result<Outline, SegmentError> {
        let request = OutlineRequest {
            route: Arc::clone(route),
            total_segments,
        };
        let beats = tokio::time::timeout(self.timeout, self.provider.outline(&request))
            .await
            .map_err(|_| SegmentError::TimedOut {
                stage: Stage::Outline,
                index: 0,
                after: self.timeout,
            })?
            .map_err(|e| SegmentError::Planning(e.to_string()))?;

        if beats.is_empty() {
            return Err(SegmentError::Planning("No outline generated".to_string()));
        }
        Ok(Outline::fitted(beats, total_segments))
    }
}
