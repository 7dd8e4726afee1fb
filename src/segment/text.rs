//! Narrative text stage.

use crate::provider::{NarrativeProvider, SegmentRequest};
use crate::route::RouteDetails;
use crate::segment::error::SegmentError;
use crate::story::store::tail_chars;
use std::sync::Arc;

/// Writes the text for one segment from its beat and the story so far.
#[derive(Clone)]
pub struct SegmentTextGenerator {
    provider: Arc<dyn NarrativeProvider>,
    target_words: u32,
    context_chars: usize,
}

impl SegmentTextGenerator {
    pub fn new(provider: Arc<dyn NarrativeProvider>, target_words: u32, context_chars: usize) -> Self {
        Self {
            provider,
            target_words,
            context_chars,
        }
    }

    pub fn target_words(&self) -> u32 {
        self.target_words
    }

    /// Generate trimmed, non-empty narrative text for segment `index`.
    pub async fn generate_text(
        &self,
        route: &Arc<RouteDetails>,
        index: u32,
        total_segments: u32,
        beat: &str,
        context: &str,
    ) -> Result<String, SegmentError> {
        let request = SegmentRequest {
            route: Arc::clone(route),
            index,
            total_segments,
            beat: beat.to_string(),
            context: tail_chars(context, self.context_chars).to_string(),
            target_words: self.target_words,
        };

        let text = self
            .provider
            .narrate(&request)
            .await
            .map_err(|e| SegmentError::Generation {
                index,
                message: e.to_string(),
            })?;

        let text = text.trim();
        if text.is_empty() {
            return Err(SegmentError::Generation {
                index,
                message: "No text generated".to_string(),
            });
        }
        Ok(text.to_string())
    }
}
