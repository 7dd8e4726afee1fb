//! Story model and its single owner.

pub mod audio;
pub mod store;
pub mod types;

pub use audio::AudioBuffer;
pub use store::{MergeOutcome, StoryStore};
pub use types::{AudioStory, Outline, StorySegment};
