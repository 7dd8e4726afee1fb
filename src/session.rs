//! Listening session: sign-in, planning, first segment and buffering.

use crate::config::Config;
use crate::error::{EchoError, Result};
use crate::history::SavedTrip;
use crate::provider::Providers;
use crate::route::RouteDetails;
use crate::scheduler::{
    BufferScheduler, BufferSnapshot, FailureReporter, LogReporter, SchedulerHandle,
    SchedulerSettings,
};
use crate::segment::{
    OutlinePlanner, SegmentJob, SegmentProducer, TimingTracker, total_segments_for,
};
use crate::story::{AudioStory, Outline, StoryStore};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Where the session is. Ordered: later states imply the earlier ones passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SessionState {
    AuthRequired,
    Dashboard,
    Planning,
    GeneratingInitialSegment,
    ReadyToPlay,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SessionState::AuthRequired => "signed out",
            SessionState::Dashboard => "on the dashboard",
            SessionState::Planning => "planning",
            SessionState::GeneratingInitialSegment => "generating the first segment",
            SessionState::ReadyToPlay => "ready to play",
        };
        f.write_str(text)
    }
}

/// The listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

impl User {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Persists a freshly planned trip.
pub trait TripRecorder: Send + Sync {
    fn record(&self, route: &RouteDetails, outline: &Outline) -> Result<()>;
}

/// One listener's narration session.
pub struct Session {
    config: Config,
    providers: Providers,
    recorder: Option<Arc<dyn TripRecorder>>,
    reporter: Arc<dyn FailureReporter>,
    state: SessionState,
    user: Option<User>,
    route: Option<Arc<RouteDetails>>,
    scheduler: Option<SchedulerHandle>,
    error: Option<String>,
    cancel: CancellationToken,
}

impl Session {
    pub fn new(config: Config, providers: Providers) -> Self {
        Self {
            config,
            providers,
            recorder: None,
            reporter: Arc::new(LogReporter),
            state: SessionState::AuthRequired,
            user: None,
            route: None,
            scheduler: None,
            error: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn TripRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn FailureReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn route(&self) -> Option<&Arc<RouteDetails>> {
        self.route.as_ref()
    }

    /// Message of the last failed generation attempt.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Token that aborts the first-segment generation in progress.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn sign_in(&mut self, user: User) -> Result<()> {
        self.expect_state("sign in", |state| state == SessionState::AuthRequired)?;
        info!(user = %user.id, "signed in");
        self.user = Some(user);
        self.state = SessionState::Dashboard;
        Ok(())
    }

    pub async fn sign_out(&mut self) -> Result<()> {
        self.expect_state("sign out", |state| state > SessionState::AuthRequired)?;
        self.clear().await;
        self.user = None;
        self.state = SessionState::AuthRequired;
        info!("signed out");
        Ok(())
    }

    pub fn start_planning(&mut self) -> Result<()> {
        self.expect_state("start planning", |state| state == SessionState::Dashboard)?;
        self.error = None;
        self.state = SessionState::Planning;
        Ok(())
    }

    /// Plan (unless `outline` is given), produce segment 1 and start buffering.
    ///
    /// Accepted while planning, or from the dashboard when replaying a saved
    /// outline. A failure returns the session to `Planning` with the message
    /// kept in [`Session::error`].
    pub async fn generate(&mut self, route: RouteDetails, outline: Option<Outline>) -> Result<()> {
        let resuming = outline.is_some();
        self.expect_state("generate a story", |state| {
            state == SessionState::Planning || (resuming && state == SessionState::Dashboard)
        })?;
        route.validate()?;

        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        let route = Arc::new(route);
        self.route = Some(Arc::clone(&route));
        self.error = None;
        self.state = SessionState::GeneratingInitialSegment;

        let total = total_segments_for(route.duration_secs, self.config.story.segment_secs);
        info!(route = %route.summary(), total, resuming, "generating story");

        let outline = match outline {
            Some(outline) => outline,
            None => {
                let planner = OutlinePlanner::new(
                    Arc::clone(&self.providers.outline),
                    self.config.timeouts.outline(),
                );
                let outline = planner.plan(&route, total).await;
                if let Some(recorder) = &self.recorder
                    && let Err(e) = recorder.record(&route, &outline)
                {
                    warn!(error = %e, "failed to save trip");
                }
                outline
            }
        };

        let producer = SegmentProducer::from_config(&self.config, &self.providers);
        let job = SegmentJob {
            route: Arc::clone(&route),
            index: 1,
            total_segments: total,
            beat: outline.beat_or_default(1).to_string(),
            context: String::new(),
        };

        let produced = match producer.produce(&job, &self.cancel.child_token()).await {
            Ok(produced) => produced,
            Err(error) => {
                warn!(%error, "initial segment failed");
                let message = error.to_string();
                self.route = None;
                self.error = Some(message.clone());
                self.state = SessionState::Planning;
                return Err(EchoError::Generation { message });
            }
        };

        let store = StoryStore::new(total, outline, produced.segment);
        self.scheduler = Some(BufferScheduler::spawn(
            store,
            route,
            producer,
            SchedulerSettings::from_config(&self.config),
            Arc::clone(&self.reporter),
        ));
        self.state = SessionState::ReadyToPlay;
        info!("ready to play");
        Ok(())
    }

    /// Replay a saved trip with its recorded outline.
    pub async fn resume(&mut self, trip: &SavedTrip) -> Result<()> {
        if self.state >= SessionState::Planning {
            self.reset().await?;
        }
        self.generate(trip.route.clone(), Some(trip.outline.clone())).await
    }

    /// Report the segment now playing; re-arms buffering.
    pub fn report_playback(&self, index: u32) -> Result<()> {
        match &self.scheduler {
            Some(scheduler) => scheduler.report_playback(index),
            None => Err(self.invalid("report playback")),
        }
    }

    pub fn subscribe(&self) -> Option<watch::Receiver<BufferSnapshot>> {
        self.scheduler.as_ref().map(SchedulerHandle::subscribe)
    }

    pub fn snapshot(&self) -> Option<BufferSnapshot> {
        self.scheduler.as_ref().map(SchedulerHandle::snapshot)
    }

    pub fn story(&self) -> Option<Arc<AudioStory>> {
        self.scheduler.as_ref().map(SchedulerHandle::story)
    }

    /// Back to the dashboard, dropping the route and story.
    pub async fn reset(&mut self) -> Result<()> {
        self.expect_state("reset", |state| state >= SessionState::Dashboard)?;
        self.clear().await;
        self.state = SessionState::Dashboard;
        Ok(())
    }

    /// Stop buffering and hand back production timings, keeping the story
    /// readable through the returned snapshot.
    pub async fn finish(&mut self) -> Option<(BufferSnapshot, TimingTracker)> {
        let scheduler = self.scheduler.take()?;
        let snapshot = scheduler.snapshot();
        Some((snapshot, scheduler.shutdown().await))
    }

    async fn clear(&mut self) {
        self.cancel.cancel();
        if let Some(scheduler) = self.scheduler.take() {
            scheduler.shutdown().await;
        }
        self.route = None;
        self.error = None;
    }

    fn expect_state(&self, action: &str, allowed: impl Fn(SessionState) -> bool) -> Result<()> {
        if allowed(self.state) {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &str) -> EchoError {
        EchoError::InvalidTransition {
            action: action.to_string(),
            state: self.state.to_string(),
        }
    }
}
