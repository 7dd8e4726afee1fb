//! Story data: outline, segments and the assembled story.

use crate::defaults::{CONTINUATION_BEAT, FILLER_BEAT, OPENING_BEAT};
use crate::story::audio::AudioBuffer;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Per-segment story beats, fixed at session start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Outline(Vec<String>);

impl Outline {
    pub fn new(beats: Vec<String>) -> Self {
        Self(beats)
    }

    /// `total` copies of the filler beat.
    pub fn filler(total: u32) -> Self {
        Self(vec![FILLER_BEAT.to_string(); total as usize])
    }

    /// Truncate or pad `beats` to exactly `total` entries.
    pub fn fitted(mut beats: Vec<String>, total: u32) -> Self {
        beats.resize(total as usize, FILLER_BEAT.to_string());
        Self(beats)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn beats(&self) -> &[String] {
        &self.0
    }

    /// Beat for a 1-based segment index, if the outline covers it.
    pub fn beat(&self, index: u32) -> Option<&str> {
        let slot = (index as usize).checked_sub(1)?;
        self.0.get(slot).map(String::as_str)
    }

    /// Beat for a 1-based segment index, falling back to a generic one.
    pub fn beat_or_default(&self, index: u32) -> &str {
        match self.beat(index) {
            Some(beat) if !beat.trim().is_empty() => beat,
            _ if index <= 1 => OPENING_BEAT,
            _ => CONTINUATION_BEAT,
        }
    }
}

/// One narrated chapter. Text and audio always travel together.
#[derive(Debug, Clone, PartialEq)]
pub struct StorySegment {
    /// 1-based position in the story.
    pub index: u32,
    pub text: String,
    pub audio: AudioBuffer,
}

impl StorySegment {
    pub fn new(index: u32, text: impl Into<String>, audio: AudioBuffer) -> Self {
        debug_assert!(index >= 1, "segment indices are 1-based");
        Self {
            index,
            text: text.into(),
            audio,
        }
    }

    pub fn duration(&self) -> Duration {
        self.audio.duration()
    }
}

/// Read-only view of the story: segments sorted ascending, no duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioStory {
    pub total_segments: u32,
    pub outline: Arc<Outline>,
    pub segments: Vec<Arc<StorySegment>>,
}

impl AudioStory {
    pub fn generated_count(&self) -> u32 {
        self.segments.len() as u32
    }

    pub fn segment(&self, index: u32) -> Option<&Arc<StorySegment>> {
        self.segments
            .binary_search_by_key(&index, |segment| segment.index)
            .ok()
            .map(|slot| &self.segments[slot])
    }

    pub fn indices(&self) -> Vec<u32> {
        self.segments.iter().map(|segment| segment.index).collect()
    }

    /// True once every planned segment has been generated.
    pub fn is_complete(&self) -> bool {
        self.generated_count() >= self.total_segments
    }

    pub fn audio_duration(&self) -> Duration {
        self.segments.iter().map(|segment| segment.duration()).sum()
    }
}
