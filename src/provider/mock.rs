//! In-process providers for tests and offline runs.

use crate::defaults::SAMPLE_RATE;
use crate::error::{EchoError, Result};
use crate::provider::{
    NarrativeProvider, OutlineProvider, OutlineRequest, SegmentRequest, SpeechProvider,
    SpeechRequest,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock outline provider
#[derive(Debug, Default)]
pub struct MockOutlineProvider {
    beats: Option<Vec<String>>,
    delay: Duration,
    should_fail: bool,
    calls: AtomicUsize,
}

impl MockOutlineProvider {
    /// Return exactly these beats (the planner fits them to the segment count).
    pub fn new(beats: Vec<String>) -> Self {
        Self {
            beats: Some(beats),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OutlineProvider for MockOutlineProvider {
    async fn outline(&self, request: &OutlineRequest) -> Result<Vec<String>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.should_fail {
            return Err(EchoError::Provider {
                message: "mock outline failure".to_string(),
            });
        }
        Ok(match &self.beats {
            Some(beats) => beats.clone(),
            None => (1..=request.total_segments)
                .map(|i| format!("Chapter {i} of the way to {}", request.route.end_address))
                .collect(),
        })
    }
}

/// Mock narrative provider
///
/// Records every requested index and the highest number of overlapping calls,
/// so tests can check the single-flight guarantee from the provider's side.
#[derive(Debug, Default)]
pub struct MockNarrativeProvider {
    delay: Duration,
    delays: HashMap<u32, Duration>,
    failures: Mutex<HashMap<u32, u32>>,
    empty: bool,
    requests: Mutex<Vec<SegmentRequest>>,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MockNarrativeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Delay calls for one segment index (overrides the global delay).
    pub fn with_delay_for(mut self, index: u32, delay: Duration) -> Self {
        self.delays.insert(index, delay);
        self
    }

    /// Fail every call for this index.
    pub fn with_failure_for(self, index: u32) -> Self {
        self.with_failures_for(index, u32::MAX)
    }

    /// Fail the first `times` calls for this index, then succeed.
    pub fn with_failures_for(self, index: u32, times: u32) -> Self {
        if let Ok(mut failures) = self.failures.lock() {
            failures.insert(index, times);
        }
        self
    }

    /// Answer with whitespace only.
    pub fn with_empty_response(mut self) -> Self {
        self.empty = true;
        self
    }

    /// Indices requested so far, in call order.
    pub fn requested_indices(&self) -> Vec<u32> {
        self.requests()
            .iter()
            .map(|request| request.index)
            .collect()
    }

    /// Full requests received so far, in call order.
    pub fn requests(&self) -> Vec<SegmentRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Highest number of calls that were running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    fn should_fail(&self, index: u32) -> bool {
        let Ok(mut failures) = self.failures.lock() else {
            return false;
        };
        match failures.get_mut(&index) {
            Some(remaining) if *remaining > 0 => {
                *remaining = remaining.saturating_sub(1);
                true
            }
            _ => false,
        }
    }
}

/// Decrements the active-call counter even when the call is dropped mid-flight.
struct ActiveCall<'a>(&'a AtomicUsize);

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl NarrativeProvider for MockNarrativeProvider {
    async fn narrate(&self, request: &SegmentRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);
        let _active = ActiveCall(&self.active);

        let delay = self
            .delays
            .get(&request.index)
            .copied()
            .unwrap_or(self.delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail(request.index) {
            return Err(EchoError::Provider {
                message: format!("mock narrative failure for segment {}", request.index),
            });
        }
        if self.empty {
            return Ok("  ".to_string());
        }
        Ok(format!(
            "Segment {} of {}: {}",
            request.index, request.total_segments, request.beat
        ))
    }
}

/// Mock speech provider
#[derive(Debug)]
pub struct MockSpeechProvider {
    samples: usize,
    delay: Duration,
    should_fail: bool,
    empty: bool,
    calls: AtomicUsize,
}

impl Default for MockSpeechProvider {
    fn default() -> Self {
        Self {
            samples: SAMPLE_RATE as usize,
            delay: Duration::ZERO,
            should_fail: false,
            empty: false,
            calls: AtomicUsize::new(0),
        }
    }
}

impl MockSpeechProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of PCM samples per response (24 000 = one second).
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// Succeed without any audio payload.
    pub fn with_empty_payload(mut self) -> Self {
        self.empty = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechProvider for MockSpeechProvider {
    async fn synthesize(&self, _request: &SpeechRequest) -> Result<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.should_fail {
            return Err(EchoError::Provider {
                message: "mock speech failure".to_string(),
            });
        }
        if self.empty {
            return Ok(Vec::new());
        }
        Ok(vec![0u8; self.samples * 2])
    }
}
