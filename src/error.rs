//! Error types for echopaths.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EchoError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Failed to serialize configuration: {0}")]
    ConfigSerialize(#[from] toml::ser::Error),

    // Route errors
    #[error("Invalid route: {message}")]
    InvalidRoute { message: String },

    // Provider errors
    #[error("Provider API key not configured (set GEMINI_API_KEY or provider.api_key)")]
    NoApiKey,

    #[error("Provider request failed: {message}")]
    Provider { message: String },

    #[error("Provider returned status {status}: {message}")]
    ProviderStatus { status: u16, message: String },

    // Session errors
    #[error("Cannot {action} while {state}")]
    InvalidTransition { action: String, state: String },

    #[error("Story generation failed: {message}")]
    Generation { message: String },

    #[error("Buffer scheduler is not running")]
    SchedulerStopped,

    // Trip history errors
    #[error("Trip not found: {id}")]
    TripNotFound { id: String },

    #[error("Ambiguous trip id {id}: matches {matches} trips")]
    AmbiguousTrip { id: String, matches: usize },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // Audio output errors
    #[error("Failed to write audio: {0}")]
    Wav(#[from] hound::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, EchoError>;
