//! Segment production: outline planning and the text/speech stages.

pub mod audio;
pub mod error;
pub mod planner;
pub mod producer;
pub mod text;
pub mod timing;

pub use audio::SegmentAudioSynthesizer;
pub use error::{SegmentError, Stage};
pub use planner::{OutlinePlanner, total_segments, total_segments_for};
pub use producer::{ProducedSegment, SegmentJob, SegmentProducer};
pub use text::SegmentTextGenerator;
pub use timing::{SegmentTiming, TimingStats, TimingTracker};
