//! Default configuration constants for echopaths.
//!
//! Shared between the config layer, the planner and the buffering loop so the
//! numbers that define a "segment" live in one place.

use std::time::Duration;

/// Target narration length of one segment, in seconds.
///
/// Route duration is divided by this to estimate how many segments the story
/// needs, so one segment roughly covers one minute of travel.
pub const TARGET_SEGMENT_SECS: u32 = 60;

/// Narration speed used to size each segment's text.
pub const WORDS_PER_MINUTE: u32 = 145;

/// Number of segments the buffer tries to stay ahead of playback.
pub const LOOKAHEAD: u32 = 3;

/// Maximum characters of prior story text handed to the text generator.
pub const CONTEXT_CHARS: usize = 3000;

/// Characters of prior text quoted inside the segment prompt itself.
pub const PROMPT_CONTEXT_CHARS: usize = 500;

/// Deadline for outline planning before it degrades to filler beats.
pub const OUTLINE_TIMEOUT_SECS: u64 = 60;

/// Deadline for the text stage of one segment.
pub const TEXT_TIMEOUT_SECS: u64 = 60;

/// Deadline for the audio stage of one segment.
///
/// Synthesis takes longer than text generation, so it gets the wider window.
pub const AUDIO_TIMEOUT_SECS: u64 = 100;

/// Sample rate of the PCM the speech provider returns.
pub const SAMPLE_RATE: u32 = 24_000;

/// Channel count of the PCM the speech provider returns.
pub const CHANNELS: u16 = 1;

/// Longest route the routing collaborator accepts (8 hours).
pub const MAX_ROUTE_SECS: u32 = 28_800;

/// Most intermediate stops a route may carry.
pub const MAX_WAYPOINTS: usize = 5;

/// Beat used when the outline cannot be planned.
pub const FILLER_BEAT: &str = "Continue the immersive journey through the landscape.";

/// Beat used for segment 1 when the outline has no entry for it.
pub const OPENING_BEAT: &str = "Begin the journey.";

/// Beat used for later segments when the outline has no entry for them.
pub const CONTINUATION_BEAT: &str = "Continue the journey.";

/// Default model for outline and segment text.
pub const TEXT_MODEL: &str = "gemini-3-flash-preview";

/// Default model for speech synthesis.
pub const SPEECH_MODEL: &str = "gemini-2.5-flash-preview-tts";

/// Default prebuilt voice for speech synthesis.
pub const VOICE: &str = "Kore";

/// Target words per segment: `round(segment_secs / 60 * wpm)`.
pub fn words_per_segment(segment_secs: u32, words_per_minute: u32) -> u32 {
    ((segment_secs as f64 / 60.0) * words_per_minute as f64).round() as u32
}

/// Convert a seconds constant into a [`Duration`].
pub const fn secs(value: u64) -> Duration {
    Duration::from_secs(value)
}
