use crate::defaults;
use crate::error::{EchoError, Result};
use crate::scheduler::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub story: StoryConfig,
    pub timeouts: TimeoutConfig,
    pub buffer: BufferConfig,
    pub provider: ProviderConfig,
}

/// Segment sizing and buffering depth
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoryConfig {
    pub lookahead: u32,
    pub context_chars: usize,
    pub segment_secs: u32,
    pub words_per_minute: u32,
}

/// Per-stage deadlines, in seconds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    pub outline_secs: u64,
    pub text_secs: u64,
    pub audio_secs: u64,
}

/// Background buffering behaviour
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct BufferConfig {
    pub on_failure: FailurePolicy,
}

/// Generation and speech provider settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProviderConfig {
    pub text_model: String,
    pub speech_model: String,
    pub voice: String,
    pub api_key: Option<String>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            lookahead: defaults::LOOKAHEAD,
            context_chars: defaults::CONTEXT_CHARS,
            segment_secs: defaults::TARGET_SEGMENT_SECS,
            words_per_minute: defaults::WORDS_PER_MINUTE,
        }
    }
}

impl StoryConfig {
    /// Target words for one segment at the configured narration speed.
    pub fn words_per_segment(&self) -> u32 {
        defaults::words_per_segment(self.segment_secs, self.words_per_minute)
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            outline_secs: defaults::OUTLINE_TIMEOUT_SECS,
            text_secs: defaults::TEXT_TIMEOUT_SECS,
            audio_secs: defaults::AUDIO_TIMEOUT_SECS,
        }
    }
}

impl TimeoutConfig {
    pub fn outline(&self) -> Duration {
        Duration::from_secs(self.outline_secs)
    }

    pub fn text(&self) -> Duration {
        Duration::from_secs(self.text_secs)
    }

    pub fn audio(&self) -> Duration {
        Duration::from_secs(self.audio_secs)
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            text_model: defaults::TEXT_MODEL.to_string(),
            speech_model: defaults::SPEECH_MODEL.to_string(),
            voice: defaults::VOICE.to_string(),
            api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML or values that fail
    /// validation. Missing fields will use default values.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(EchoError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Write the configuration as TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject values the buffering loop cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.story.lookahead == 0 {
            return Err(invalid("story.lookahead", "must be at least 1"));
        }
        if self.story.segment_secs == 0 {
            return Err(invalid("story.segment_secs", "must be at least 1"));
        }
        if self.timeouts.text_secs == 0 {
            return Err(invalid("timeouts.text_secs", "must be at least 1"));
        }
        if self.timeouts.audio_secs == 0 {
            return Err(invalid("timeouts.audio_secs", "must be at least 1"));
        }
        if let FailurePolicy::Retry { max_attempts: 0 } = self.buffer.on_failure {
            return Err(invalid("buffer.on_failure.max_attempts", "must be at least 1"));
        }
        Ok(())
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - ECHOPATHS_TEXT_MODEL → provider.text_model
    /// - ECHOPATHS_SPEECH_MODEL → provider.speech_model
    /// - ECHOPATHS_VOICE → provider.voice
    /// - ECHOPATHS_LOOKAHEAD → story.lookahead (ignored unless a positive integer)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("ECHOPATHS_TEXT_MODEL")
            && !model.is_empty()
        {
            self.provider.text_model = model;
        }

        if let Ok(model) = std::env::var("ECHOPATHS_SPEECH_MODEL")
            && !model.is_empty()
        {
            self.provider.speech_model = model;
        }

        if let Ok(voice) = std::env::var("ECHOPATHS_VOICE")
            && !voice.is_empty()
        {
            self.provider.voice = voice;
        }

        if let Ok(lookahead) = std::env::var("ECHOPATHS_LOOKAHEAD")
            && let Ok(value) = lookahead.trim().parse::<u32>()
            && value > 0
        {
            self.story.lookahead = value;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/echopaths/config.toml on Linux
    pub fn default_path() -> PathBuf {
        config_dir().join("config.toml")
    }
}

/// Directory holding echopaths' config and trip history.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("echopaths")
}

fn invalid(key: &str, message: &str) -> EchoError {
    EchoError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
