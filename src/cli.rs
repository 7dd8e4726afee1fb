//! Command-line interface for echopaths
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Narrated audio stories for your route
#[derive(Parser, Debug)]
#[command(name = "echopaths", version, about = "Narrated audio stories for your route")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: debug, -vv: trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Listener id; each user has their own trip history
    #[arg(long, global = true, value_name = "ID", default_value = "traveler")]
    pub user: String,
}

/// Options shared by every command that plays a story.
#[derive(clap::Args, Debug, Clone)]
pub struct PlaybackArgs {
    /// Directory for segment WAV and text files
    #[arg(long, value_name = "DIR", default_value = "narration")]
    pub out: PathBuf,

    /// Playback speed multiplier (2 plays a 60s segment in 30s)
    #[arg(long, value_name = "X", default_value = "1", value_parser = parse_speed)]
    pub speed: f64,

    /// Use offline mock providers instead of the Gemini API
    #[arg(long)]
    pub mock: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan and narrate a route, buffering segments ahead of playback
    Narrate {
        /// Route file (.toml or .json)
        #[arg(long, value_name = "FILE")]
        route: PathBuf,

        #[command(flatten)]
        playback: PlaybackArgs,
    },

    /// Browse, replay and delete saved trips
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Show how many segments a route of the given length needs
    Segments {
        /// Route duration (default unit: seconds). Examples: 150, 25m, 1h30m
        #[arg(long, value_name = "DURATION", value_parser = parse_duration_secs)]
        duration: u32,
    },

    /// View and create configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Trip history actions
#[derive(Subcommand, Debug)]
pub enum HistoryAction {
    /// List saved trips, newest first
    List,
    /// Show a trip's route and outline
    Show {
        /// Trip id or unique prefix
        id: String,
    },
    /// Delete a saved trip
    Delete {
        /// Trip id or unique prefix
        id: String,
    },
    /// Narrate a saved trip again with its original outline
    Resume {
        /// Trip id or unique prefix
        id: String,

        #[command(flatten)]
        playback: PlaybackArgs,
    },
}

/// Configuration management actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Parse a duration string into whole seconds.
///
/// Supports bare numbers (seconds) and anything `humantime` accepts
/// (`90s`, `25m`, `1h30m`).
fn parse_duration_secs(s: &str) -> Result<u32, String> {
    let s = s.trim();
    if let Ok(secs) = s.parse::<u32>() {
        return Ok(secs);
    }
    let secs = humantime::parse_duration(s)
        .map_err(|e| e.to_string())?
        .as_secs();
    u32::try_from(secs).map_err(|_| format!("duration too long: {s}"))
}

fn parse_speed(s: &str) -> Result<f64, String> {
    let speed: f64 = s.trim().parse().map_err(|e| format!("invalid speed: {e}"))?;
    if speed.is_finite() && speed > 0.0 {
        Ok(speed)
    } else {
        Err("speed must be a positive number".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_narrate_defaults() {
        let cli = Cli::try_parse_from(["echopaths", "narrate", "--route", "trip.toml"]).unwrap();
        match cli.command {
            Commands::Narrate { route, playback } => {
                assert_eq!(route, PathBuf::from("trip.toml"));
                assert_eq!(playback.out, PathBuf::from("narration"));
                assert_eq!(playback.speed, 1.0);
                assert!(!playback.mock);
            }
            _ => panic!("Expected Narrate command"),
        }
        assert_eq!(cli.user, "traveler");
        assert_eq!(cli.verbose, 0);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_parse_narrate_with_options() {
        let cli = Cli::try_parse_from([
            "echopaths",
            "narrate",
            "--route",
            "trip.json",
            "--out",
            "/tmp/story",
            "--speed",
            "4",
            "--mock",
            "--user",
            "ada",
            "-vv",
        ])
        .unwrap();
        match cli.command {
            Commands::Narrate { playback, .. } => {
                assert_eq!(playback.out, PathBuf::from("/tmp/story"));
                assert_eq!(playback.speed, 4.0);
                assert!(playback.mock);
            }
            _ => panic!("Expected Narrate command"),
        }
        assert_eq!(cli.user, "ada");
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_narrate_requires_route() {
        assert!(Cli::try_parse_from(["echopaths", "narrate"]).is_err());
    }

    #[test]
    fn test_rejects_non_positive_speed() {
        assert!(
            Cli::try_parse_from(["echopaths", "narrate", "--route", "r.toml", "--speed", "0"])
                .is_err()
        );
        assert!(parse_speed("-1").is_err());
        assert!(parse_speed("NaN").is_err());
        assert_eq!(parse_speed("0.5"), Ok(0.5));
    }

    #[test]
    fn test_parse_history_resume() {
        let cli =
            Cli::try_parse_from(["echopaths", "history", "resume", "3f2a", "--mock"]).unwrap();
        match cli.command {
            Commands::History {
                action: HistoryAction::Resume { id, playback },
            } => {
                assert_eq!(id, "3f2a");
                assert!(playback.mock);
            }
            _ => panic!("Expected History Resume command"),
        }
    }

    #[test]
    fn test_parse_segments_duration_formats() {
        for (input, expected) in [("150", 150), ("25m", 1500), ("1h30m", 5400), ("90s", 90)] {
            let cli = Cli::try_parse_from(["echopaths", "segments", "--duration", input]).unwrap();
            match cli.command {
                Commands::Segments { duration } => assert_eq!(duration, expected, "{input}"),
                _ => panic!("Expected Segments command"),
            }
        }
        assert!(parse_duration_secs("soon").is_err());
    }

    #[test]
    fn test_parse_config_init_force() {
        let cli = Cli::try_parse_from(["echopaths", "config", "init", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Config {
                action: ConfigAction::Init { force: true }
            }
        ));
    }

    #[test]
    fn test_parse_completions() {
        let cli = Cli::try_parse_from(["echopaths", "completions", "bash"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Completions { shell: Shell::Bash }
        ));
    }
}
