//! Command runners: narrate a route or a saved trip with simulated playback.

use crate::config::Config;
use crate::error::{EchoError, Result};
use crate::history::{SavedTrip, TripHistory};
use crate::provider::Providers;
use crate::route::RouteDetails;
use crate::scheduler::BufferSnapshot;
use crate::segment::TimingTracker;
use crate::session::{Session, User};
use crate::story::StorySegment;
use owo_colors::OwoColorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Times in a row the player re-reports its position for a stalled segment
/// before giving up.
const MAX_STALLS: u32 = 3;

/// How a story is played back and where it is written.
#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    pub out: PathBuf,
    pub speed: f64,
    pub mock: bool,
    pub quiet: bool,
}

/// Plan, generate and play a route from a file.
pub async fn run_narrate_command(
    config: Config,
    user: &str,
    route_path: &Path,
    options: PlaybackOptions,
) -> Result<()> {
    let route = RouteDetails::load(route_path)?;
    let history = Arc::new(TripHistory::for_user(user));
    let mut session = Session::new(config.clone(), build_providers(&config, options.mock)?)
        .with_recorder(history);

    session.sign_in(User::new(user, user))?;
    session.start_planning()?;
    if !options.quiet {
        eprintln!("Planning {}...", route.summary());
    }
    generate_cancellable(&mut session, route, None).await?;
    play(&mut session, &options).await
}

/// Replay a saved trip with its recorded outline.
pub async fn run_resume_command(
    config: Config,
    user: &str,
    trip_id: &str,
    options: PlaybackOptions,
) -> Result<()> {
    let trip = TripHistory::for_user(user).get(trip_id)?;
    let mut session = Session::new(config.clone(), build_providers(&config, options.mock)?);

    session.sign_in(User::new(user, user))?;
    if !options.quiet {
        eprintln!("Resuming {}...", trip.route.summary());
    }
    generate_cancellable(&mut session, trip.route.clone(), Some(trip)).await?;
    play(&mut session, &options).await
}

fn build_providers(config: &Config, mock: bool) -> Result<Providers> {
    if mock {
        return Ok(Providers::mock());
    }
    #[cfg(feature = "gemini")]
    {
        let client = crate::provider::GeminiClient::from_config(&config.provider)?;
        Ok(Providers::shared(Arc::new(client)))
    }
    #[cfg(not(feature = "gemini"))]
    {
        let _unused = config;
        Err(EchoError::Other(
            "built without the gemini feature; use --mock".to_string(),
        ))
    }
}

/// Run the first-segment generation, aborting it on Ctrl-C.
async fn generate_cancellable(
    session: &mut Session,
    route: RouteDetails,
    trip: Option<SavedTrip>,
) -> Result<()> {
    let cancel = session.cancel_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });
    let result = match trip {
        Some(trip) => session.resume(&trip).await,
        None => session.generate(route, None).await,
    };
    watcher.abort();
    result
}

/// Play segments in order, reporting each to the scheduler.
async fn play(session: &mut Session, options: &PlaybackOptions) -> Result<()> {
    let mut snapshots = session.subscribe().ok_or(EchoError::SchedulerStopped)?;
    let total = snapshots.borrow().story.total_segments;
    fs::create_dir_all(&options.out)?;

    let mut index = 1;
    let mut stalls = 0;
    let mut interrupted = false;
    while index <= total {
        let snapshot = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            }
            snapshot = snapshots.wait_for(|s| ready_for(s, index)) => match snapshot {
                Ok(snapshot) => snapshot.clone(),
                Err(_) => return Err(EchoError::SchedulerStopped),
            },
        };

        if snapshot.is_gap(index) {
            warn!(index, "segment skipped after repeated failures");
            if !options.quiet {
                eprintln!("{}", format!("Segment {index} unavailable, skipping").yellow());
            }
            index += 1;
            continue;
        }

        let Some(segment) = snapshot.story.segment(index).cloned() else {
            // Stalled on a failed segment: re-report the current position so
            // the scheduler requests it again.
            stalls += 1;
            if stalls > MAX_STALLS {
                let message = snapshot
                    .last_failure
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| format!("segment {index} unavailable"));
                return Err(EchoError::Generation { message });
            }
            if !options.quiet {
                eprintln!("{}", format!("Segment {index} failed, retrying").yellow());
            }
            session.report_playback(index - 1)?;
            // The failure that stalled playback is stale once the retry runs.
            snapshots
                .wait_for(|s| s.in_flight == Some(index) || s.story.segment(index).is_some())
                .await
                .map_err(|_| EchoError::SchedulerStopped)?;
            continue;
        };
        stalls = 0;

        write_segment(&options.out, &segment)?;
        session.report_playback(index)?;
        if !options.quiet {
            println!(
                "{} {}",
                format!("▶ Segment {index}/{total}").green(),
                format!("({:.0}s)", segment.duration().as_secs_f64()).dimmed()
            );
            println!("{}\n", segment.text);
        }

        let playback = segment.duration().div_f64(options.speed);
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                interrupted = true;
                break;
            }
            _ = tokio::time::sleep(playback) => {}
        }
        index += 1;
    }

    if let Some((snapshot, timings)) = session.finish().await {
        print_summary(&snapshot, &timings, &options.out, interrupted, options.quiet);
    }
    Ok(())
}

/// Segment `index` can be played, was skipped, or failed and nothing runs.
fn ready_for(snapshot: &BufferSnapshot, index: u32) -> bool {
    snapshot.story.segment(index).is_some()
        || snapshot.is_gap(index)
        || (snapshot.in_flight.is_none()
            && snapshot
                .last_failure
                .as_ref()
                .is_some_and(|e| e.index() == index))
}

/// Write `segment-NNN.wav` and `segment-NNN.txt` into `dir`.
pub fn write_segment(dir: &Path, segment: &StorySegment) -> Result<()> {
    let stem = format!("segment-{:03}", segment.index);
    segment.audio.write_wav(&dir.join(format!("{stem}.wav")))?;
    fs::write(dir.join(format!("{stem}.txt")), &segment.text)?;
    debug!(index = segment.index, dir = %dir.display(), "wrote segment");
    Ok(())
}

fn print_summary(
    snapshot: &BufferSnapshot,
    timings: &TimingTracker,
    out: &Path,
    interrupted: bool,
    quiet: bool,
) {
    if quiet {
        return;
    }
    eprintln!();
    if interrupted {
        eprintln!("{}", "Stopped.".yellow());
    }
    eprintln!(
        "{} of {} segments generated, written to {}",
        snapshot.generated_count(),
        snapshot.story.total_segments,
        out.display()
    );
    if !snapshot.gaps.is_empty() {
        eprintln!("Skipped: {:?}", snapshot.gaps);
    }
    for line in timings.summary() {
        eprintln!("{line}");
    }
}

/// Print the trips of `user`, newest first.
pub fn list_trips(user: &str) -> Result<()> {
    let trips = TripHistory::for_user(user).list()?;
    if trips.is_empty() {
        println!("No saved trips.");
        return Ok(());
    }
    for trip in trips {
        println!(
            "{}  {}  {}",
            trip.short_id().cyan(),
            humantime::format_rfc3339_seconds(trip.created()).dimmed(),
            trip.route.summary()
        );
    }
    Ok(())
}

/// Print one trip's route and outline.
pub fn show_trip(user: &str, id: &str) -> Result<()> {
    let trip = TripHistory::for_user(user).get(id)?;
    println!("{} {}", "Trip:".dimmed(), trip.id);
    println!("{} {}", "Saved:".dimmed(), humantime::format_rfc3339_seconds(trip.created()));
    println!("{} {}", "Route:".dimmed(), trip.route.summary());
    if !trip.route.waypoints.is_empty() {
        println!("{} {}", "Stops:".dimmed(), trip.route.waypoints.join(", "));
    }
    println!("{} {}", "Style:".dimmed(), trip.route.style);
    println!("{}", "Outline:".dimmed());
    for (i, beat) in trip.outline.beats().iter().enumerate() {
        println!("  {:>3}. {}", i + 1, beat);
    }
    Ok(())
}

pub fn delete_trip(user: &str, id: &str) -> Result<()> {
    let trip = TripHistory::for_user(user).delete(id)?;
    println!("{}", format!("Deleted trip {}", trip.short_id()).green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentError;
    use crate::story::{AudioBuffer, Outline, StoryStore};

    fn snapshot_with(indices: &[u32], total: u32) -> BufferSnapshot {
        let first = StorySegment::new(1, "one", AudioBuffer::new(vec![0.0; 4], 24_000, 1));
        let mut store = StoryStore::new(total, Outline::filler(total), first);
        for &index in indices {
            let audio = AudioBuffer::new(vec![0.0; 4], 24_000, 1);
            store.merge(StorySegment::new(index, "more", audio));
        }
        BufferSnapshot {
            story: store.snapshot(),
            in_flight: None,
            playback: 0,
            gaps: Vec::new(),
            last_failure: None,
        }
    }

    #[test]
    fn ready_when_segment_buffered() {
        let snapshot = snapshot_with(&[2], 4);
        assert!(ready_for(&snapshot, 1));
        assert!(ready_for(&snapshot, 2));
        assert!(!ready_for(&snapshot, 3));
    }

    #[test]
    fn ready_when_segment_skipped_or_failed() {
        let mut snapshot = snapshot_with(&[], 4);
        snapshot.gaps = vec![2];
        assert!(ready_for(&snapshot, 2));

        snapshot.last_failure = Some(SegmentError::Generation {
            index: 3,
            message: "x".to_string(),
        });
        assert!(ready_for(&snapshot, 3));
        snapshot.in_flight = Some(3);
        assert!(!ready_for(&snapshot, 3));
    }

    #[test]
    fn writes_wav_and_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let audio = AudioBuffer::new(vec![0.25; 240], 24_000, 1);
        let segment = StorySegment::new(7, "The tide turns.", audio);
        write_segment(dir.path(), &segment).unwrap();

        let text = fs::read_to_string(dir.path().join("segment-007.txt")).unwrap();
        assert_eq!(text, "The tide turns.");
        let reader = hound::WavReader::open(dir.path().join("segment-007.wav")).unwrap();
        assert_eq!(reader.spec().sample_rate, 24_000);
        assert_eq!(reader.len(), 240);
    }

    #[tokio::test(start_paused = true)]
    async fn mock_narration_plays_every_segment() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut session = Session::new(Config::default(), Providers::mock());
        session.sign_in(User::new("t", "t")).unwrap();
        session.start_planning().unwrap();
        session
            .generate(RouteDetails::new("A", "B", 150), None)
            .await
            .unwrap();

        let options = PlaybackOptions {
            out: dir.path().to_path_buf(),
            speed: 10.0,
            mock: true,
            quiet: true,
        };
        play(&mut session, &options).await.unwrap();

        for index in 1..=3 {
            assert!(dir.path().join(format!("segment-{index:03}.wav")).exists());
        }
        assert!(!dir.path().join("segment-004.wav").exists());
    }
}
