//! Speech stage.

use crate::defaults::{CHANNELS, SAMPLE_RATE};
use crate::provider::{SpeechProvider, SpeechRequest};
use crate::segment::error::SegmentError;
use crate::story::AudioBuffer;
use std::sync::Arc;

/// Turns segment text into decoded audio.
#[derive(Clone)]
pub struct SegmentAudioSynthesizer {
    provider: Arc<dyn SpeechProvider>,
    voice: String,
}

impl SegmentAudioSynthesizer {
    pub fn new(provider: Arc<dyn SpeechProvider>, voice: impl Into<String>) -> Self {
        Self {
            provider,
            voice: voice.into(),
        }
    }

    /// Synthesize `text` as 24 kHz mono audio.
    ///
    /// A provider answer without audio is a failure, not an empty segment.
    pub async fn synthesize(&self, index: u32, text: &str) -> Result<AudioBuffer, SegmentError> {
        let request = SpeechRequest {
            text: text.to_string(),
            voice: self.voice.clone(),
        };
        let pcm = self
            .provider
            .synthesize(&request)
            .await
            .map_err(|e| SegmentError::Synthesis {
                index,
                message: e.to_string(),
            })?;

        let audio = AudioBuffer::from_pcm16le(&pcm, SAMPLE_RATE, CHANNELS);
        if audio.is_empty() {
            return Err(SegmentError::Synthesis {
                index,
                message: "No audio data".to_string(),
            });
        }
        Ok(audio)
    }
}
