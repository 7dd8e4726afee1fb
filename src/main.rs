use anyhow::{Context, Result, bail};
use clap::{CommandFactory, Parser};
use echopaths::app::{
    PlaybackOptions, delete_trip, list_trips, run_narrate_command, run_resume_command, show_trip,
};
use echopaths::cli::{Cli, Commands, ConfigAction, HistoryAction, PlaybackArgs};
use echopaths::config::Config;
use echopaths::route::format_duration;
use echopaths::segment::total_segments_for;
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    tracing::debug!(version = %echopaths::version_string(), "starting");

    match cli.command {
        Commands::Narrate { route, playback } => {
            let config = load_config(cli.config.as_deref())?;
            run_narrate_command(config, &cli.user, &route, options(playback, cli.quiet))
                .await
                .with_context(|| format!("Failed to narrate {}", route.display()))?;
        }
        Commands::History { action } => match action {
            HistoryAction::List => list_trips(&cli.user)?,
            HistoryAction::Show { id } => show_trip(&cli.user, &id)?,
            HistoryAction::Delete { id } => delete_trip(&cli.user, &id)?,
            HistoryAction::Resume { id, playback } => {
                let config = load_config(cli.config.as_deref())?;
                run_resume_command(config, &cli.user, &id, options(playback, cli.quiet)).await?;
            }
        },
        Commands::Segments { duration } => {
            let config = load_config(cli.config.as_deref())?;
            let total = total_segments_for(duration, config.story.segment_secs);
            println!(
                "{} ({}) → {} segment{} of ~{} words",
                duration_label(duration),
                format_duration(duration),
                total.green(),
                if total == 1 { "" } else { "s" },
                config.story.words_per_segment()
            );
        }
        Commands::Config { action } => {
            handle_config_command(action, cli.config.as_deref())?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut echopaths::cli::Cli::command(),
                "echopaths",
                &mut std::io::stdout(),
            );
        }
    }

    Ok(())
}

/// `-v` → debug, `-vv` → trace, `--quiet` → warn. `RUST_LOG` wins when set.
fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("echopaths={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn options(playback: PlaybackArgs, quiet: bool) -> PlaybackOptions {
    PlaybackOptions {
        out: playback.out,
        speed: playback.speed,
        mock: playback.mock,
        quiet,
    }
}

fn duration_label(secs: u32) -> String {
    humantime::format_duration(std::time::Duration::from_secs(secs.into())).to_string()
}

/// Load configuration from file or use defaults.
///
/// Priority order:
/// 1. Custom config path from CLI (--config), which must exist
/// 2. Default config path (~/.config/echopaths/config.toml)
/// 3. Built-in defaults, then environment variable overrides
fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => Config::load_or_default(&Config::default_path())?,
    };
    Ok(config.with_env_overrides())
}

fn config_path(custom_path: Option<&Path>) -> PathBuf {
    custom_path
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_path)
}

fn handle_config_command(action: ConfigAction, custom_path: Option<&Path>) -> Result<()> {
    let path = config_path(custom_path);

    match action {
        ConfigAction::Show => {
            let mut config = load_config(custom_path)?;
            if config.provider.api_key.is_some() {
                config.provider.api_key = Some("********".to_string());
            }
            print!("{}", toml::to_string_pretty(&config)?);
        }
        ConfigAction::Path => {
            println!("{}", path.display());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            Config::default().save(&path)?;
            println!("{}", format!("Wrote {}", path.display()).green());
        }
    }

    Ok(())
}
