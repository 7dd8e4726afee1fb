//! External capability providers: outline, narrative text and speech.
//!
//! Each provider is a narrow async request/response trait so the real HTTP
//! client and the in-process mocks are interchangeable.

#[cfg(feature = "gemini")]
pub mod gemini;
pub mod mock;
pub mod prompt;

use crate::error::Result;
use crate::route::RouteDetails;
use async_trait::async_trait;
use std::sync::Arc;

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;
pub use mock::{MockNarrativeProvider, MockOutlineProvider, MockSpeechProvider};

/// Ask for an outline of `total_segments` beats.
#[derive(Debug, Clone)]
pub struct OutlineRequest {
    pub route: Arc<RouteDetails>,
    pub total_segments: u32,
}

/// Ask for the narrative text of one segment.
#[derive(Debug, Clone)]
pub struct SegmentRequest {
    pub route: Arc<RouteDetails>,
    /// 1-based segment index.
    pub index: u32,
    pub total_segments: u32,
    /// Outline beat this segment should cover.
    pub beat: String,
    /// Trailing text of the story so far, already bounded.
    pub context: String,
    pub target_words: u32,
}

/// Ask for speech for one segment's text.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
}

/// Produces the per-segment story beats.
#[async_trait]
pub trait OutlineProvider: Send + Sync {
    /// Return up to `total_segments` short beat strings.
    async fn outline(&self, request: &OutlineRequest) -> Result<Vec<String>>;
}

/// Writes the narrative text of one segment.
#[async_trait]
pub trait NarrativeProvider: Send + Sync {
    /// Return the raw narrative text (may be empty if the provider had nothing).
    async fn narrate(&self, request: &SegmentRequest) -> Result<String>;
}

/// Turns text into raw speech.
#[async_trait]
pub trait SpeechProvider: Send + Sync {
    /// Return signed 16-bit little-endian PCM at 24 kHz mono.
    ///
    /// An empty payload means the provider returned no audio.
    async fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>>;
}

/// The three providers a session needs.
#[derive(Clone)]
pub struct Providers {
    pub outline: Arc<dyn OutlineProvider>,
    pub narrative: Arc<dyn NarrativeProvider>,
    pub speech: Arc<dyn SpeechProvider>,
}

impl Providers {
    pub fn new(
        outline: Arc<dyn OutlineProvider>,
        narrative: Arc<dyn NarrativeProvider>,
        speech: Arc<dyn SpeechProvider>,
    ) -> Self {
        Self {
            outline,
            narrative,
            speech,
        }
    }

    /// One client serving all three roles.
    pub fn shared<P>(provider: Arc<P>) -> Self
    where
        P: OutlineProvider + NarrativeProvider + SpeechProvider + 'static,
    {
        Self {
            outline: provider.clone(),
            narrative: provider.clone(),
            speech: provider,
        }
    }

    /// Offline providers that answer instantly with placeholder content.
    pub fn mock() -> Self {
        Self {
            outline: Arc::new(MockOutlineProvider::default()),
            narrative: Arc::new(MockNarrativeProvider::default()),
            speech: Arc::new(MockSpeechProvider::default()),
        }
    }
}
