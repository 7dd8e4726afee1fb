//! Failures of a single segment production.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which half of a production ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Outline,
    Text,
    Audio,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Outline => write!(f, "Outline"),
            Stage::Text => write!(f, "Text"),
            Stage::Audio => write!(f, "Audio"),
        }
    }
}

/// Errors that can occur while producing one segment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegmentError {
    /// Outline generation failed. Never fatal: the planner degrades to filler.
    #[error("Story outline generation failed: {0}")]
    Planning(String),

    #[error("Text generation failed for segment {index}: {message}")]
    Generation { index: u32, message: String },

    #[error("Audio generation failed for segment {index}: {message}")]
    Synthesis { index: u32, message: String },

    #[error("{stage} generation timed out for segment {index} after {}s", .after.as_secs())]
    TimedOut {
        stage: Stage,
        index: u32,
        after: Duration,
    },

    #[error("Production of segment {index} was cancelled")]
    Cancelled { index: u32 },

    /// The production task died without reporting.
    #[error("Production of segment {index} aborted: {message}")]
    Aborted { index: u32, message: String },
}

impl SegmentError {
    /// Segment the failure belongs to (0 for outline failures).
    pub fn index(&self) -> u32 {
        match self {
            SegmentError::Planning(_) => 0,
            SegmentError::Generation { index, .. }
            | SegmentError::Synthesis { index, .. }
            | SegmentError::TimedOut { index, .. }
            | SegmentError::Cancelled { index }
            | SegmentError::Aborted { index, .. } => *index,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, SegmentError::TimedOut { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SegmentError::Cancelled { .. })
    }
}
