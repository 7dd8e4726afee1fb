//! echopaths - narrated audio stories that follow a route
//!
//! Plans an outline for a journey, produces the first segment, then keeps a
//! small buffer of text-and-speech segments ahead of playback.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod app;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod history;
pub mod provider;
pub mod route;
pub mod scheduler;
pub mod segment;
pub mod session;
pub mod story;

// Providers (outline → narrative → speech)
pub use provider::{NarrativeProvider, OutlineProvider, Providers, SpeechProvider};

// Session and buffering
pub use scheduler::{BufferScheduler, BufferSnapshot, FailurePolicy, SchedulerHandle};
pub use session::{Session, SessionState, TripRecorder, User};

// Story data
pub use route::{RouteDetails, StoryStyle, TravelMode};
pub use story::{AudioBuffer, AudioStory, Outline, StorySegment, StoryStore};

// Error handling
pub use error::{EchoError, Result};

// Config
pub use config::Config;

pub use history::{SavedTrip, TripHistory};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
