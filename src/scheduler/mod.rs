//! Background buffering of story segments ahead of playback.
//!
//! The scheduler is a single task that owns the [`StoryStore`], the playback
//! position and the single-flight [`ProductionSlot`]:
//!
//! ```text
//! report_playback ─► commands ─┐
//!                              ├─► BufferScheduler ─► watch<BufferSnapshot>
//! production task ─► results ──┘        │
//!        ▲                              │ try_acquire + spawn
//!        └──────────────────────────────┘
//! ```
//!
//! Every production reports back exactly once, even when it panics, and the
//! slot is released only when that report is handled.

pub mod policy;
pub mod reporter;
pub mod slot;
pub mod trigger;

pub use policy::{FailureAction, FailurePolicy, FailureTracker};
pub use reporter::{FailureReporter, LogReporter};
pub use slot::{ProductionSlot, ProductionTicket};
pub use trigger::next_request;

use crate::config::Config;
use crate::error::{EchoError, Result};
use crate::route::RouteDetails;
use crate::segment::{ProducedSegment, SegmentError, SegmentJob, SegmentProducer, TimingTracker};
use crate::story::{AudioStory, MergeOutcome, StoryStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Buffering knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    /// How many segments may be generated ahead of the playing one.
    pub lookahead: u32,
    /// Characters of prior story text handed to the next production.
    pub context_chars: usize,
    pub policy: FailurePolicy,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SchedulerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            lookahead: config.story.lookahead,
            context_chars: config.story.context_chars,
            policy: config.buffer.on_failure,
        }
    }
}

/// What the playback consumer sees.
#[derive(Debug, Clone)]
pub struct BufferSnapshot {
    pub story: Arc<AudioStory>,
    /// Index being produced right now.
    pub in_flight: Option<u32>,
    /// Last reported playback position.
    pub playback: u32,
    /// Indices given up on (only under the skip and retry policies).
    pub gaps: Vec<u32>,
    /// Most recent background failure, if any.
    pub last_failure: Option<SegmentError>,
}

impl BufferSnapshot {
    fn new(story: Arc<AudioStory>) -> Self {
        Self {
            story,
            in_flight: None,
            playback: 0,
            gaps: Vec::new(),
            last_failure: None,
        }
    }

    pub fn generated_count(&self) -> u32 {
        self.story.generated_count()
    }

    /// Generated plus given-up indices.
    pub fn settled_count(&self) -> u32 {
        self.generated_count() + self.gaps.len() as u32
    }

    /// Nothing is left to produce.
    pub fn is_settled(&self) -> bool {
        self.settled_count() >= self.story.total_segments
    }

    pub fn is_gap(&self, index: u32) -> bool {
        self.gaps.contains(&index)
    }
}

#[derive(Debug)]
enum Command {
    PlaybackAdvanced(u32),
    Shutdown,
}

/// A production's single report back to the scheduler.
struct Finished {
    ticket: ProductionTicket,
    result: std::result::Result<ProducedSegment, SegmentError>,
}

/// Handle to a running scheduler.
///
/// Dropping the handle cancels any in-flight production.
pub struct SchedulerHandle {
    commands: mpsc::UnboundedSender<Command>,
    snapshots: watch::Receiver<BufferSnapshot>,
    cancel: CancellationToken,
    task: Option<JoinHandle<TimingTracker>>,
}

impl SchedulerHandle {
    /// Tell the scheduler which segment is playing now.
    pub fn report_playback(&self, index: u32) -> Result<()> {
        self.commands
            .send(Command::PlaybackAdvanced(index))
            .map_err(|_| EchoError::SchedulerStopped)
    }

    pub fn subscribe(&self) -> watch::Receiver<BufferSnapshot> {
        self.snapshots.clone()
    }

    pub fn snapshot(&self) -> BufferSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn story(&self) -> Arc<AudioStory> {
        Arc::clone(&self.snapshots.borrow().story)
    }

    /// Stop the scheduler, cancelling any in-flight production.
    ///
    /// Returns the timings of every segment it produced.
    pub async fn shutdown(mut self) -> TimingTracker {
        if self.commands.send(Command::Shutdown).is_err() {
            debug!("buffer scheduler already stopped");
        }
        self.cancel.cancel();
        let Some(task) = self.task.take() else {
            return TimingTracker::default();
        };
        match task.await {
            Ok(timings) => timings,
            Err(e) => {
                warn!(error = %e, "buffer scheduler task failed");
                TimingTracker::default()
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// The actor. Construct with [`BufferScheduler::spawn`].
pub struct BufferScheduler {
    store: StoryStore,
    route: Arc<RouteDetails>,
    producer: SegmentProducer,
    settings: SchedulerSettings,
    reporter: Arc<dyn FailureReporter>,
    slot: ProductionSlot,
    failures: FailureTracker,
    gaps: BTreeSet<u32>,
    playback: u32,
    last_failure: Option<SegmentError>,
    timings: TimingTracker,
    snapshots: watch::Sender<BufferSnapshot>,
    results: mpsc::UnboundedSender<Finished>,
    cancel: CancellationToken,
}

impl BufferScheduler {
    /// Start buffering `store` on the current runtime.
    ///
    /// The trigger is evaluated once immediately, so segments are requested
    /// before the first playback report.
    pub fn spawn(
        store: StoryStore,
        route: Arc<RouteDetails>,
        producer: SegmentProducer,
        settings: SchedulerSettings,
        reporter: Arc<dyn FailureReporter>,
    ) -> SchedulerHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(BufferSnapshot::new(store.snapshot()));
        let cancel = CancellationToken::new();

        let scheduler = Self {
            failures: FailureTracker::new(settings.policy),
            store,
            route,
            producer,
            settings,
            reporter,
            slot: ProductionSlot::new(),
            gaps: BTreeSet::new(),
            playback: 0,
            last_failure: None,
            timings: TimingTracker::new(),
            snapshots: snapshot_tx,
            results: result_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(scheduler.run(command_rx, result_rx));

        SchedulerHandle {
            commands: command_tx,
            snapshots: snapshot_rx,
            cancel,
            task: Some(task),
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut results: mpsc::UnboundedReceiver<Finished>,
    ) -> TimingTracker {
        debug!(
            total = self.store.total_segments(),
            lookahead = self.settings.lookahead,
            policy = ?self.settings.policy,
            "buffer scheduler started"
        );
        self.evaluate();

        let cancel = self.cancel.clone();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(finished) = results.recv() => self.on_finished(finished),
                command = commands.recv() => match command {
                    Some(Command::PlaybackAdvanced(index)) => {
                        debug!(index, "playback advanced");
                        self.playback = index;
                        self.evaluate();
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }
        }

        // Child tokens of in-flight productions.
        self.cancel.cancel();
        debug!(generated = self.store.generated_count(), "buffer scheduler stopped");
        self.timings
    }

    fn settled(&self) -> u32 {
        self.store.generated_count() + self.gaps.len() as u32
    }

    /// Request the next segment if playback is close enough to the buffer's end.
    fn evaluate(&mut self) {
        let next = next_request(
            self.settled(),
            self.playback,
            self.settings.lookahead,
            self.store.total_segments(),
            self.slot.in_flight(),
        );
        if let Some(index) = next
            && let Some(ticket) = self.slot.try_acquire(index)
        {
            self.dispatch(ticket);
        }
        self.publish();
    }

    fn dispatch(&self, ticket: ProductionTicket) {
        let index = ticket.index();
        let job = SegmentJob {
            route: Arc::clone(&self.route),
            index,
            total_segments: self.store.total_segments(),
            beat: self.store.beat_for(index).to_string(),
            context: self.store.trailing_text(self.settings.context_chars),
        };
        info!(index, total = job.total_segments, "requesting segment");

        let producer = self.producer.clone();
        let cancel = self.cancel.child_token();
        let results = self.results.clone();
        tokio::spawn(async move {
            // The inner task isolates panics so the ticket always comes back.
            let production = tokio::spawn(async move { producer.produce(&job, &cancel).await });
            let result = match production.await {
                Ok(result) => result,
                Err(e) => Err(SegmentError::Aborted {
                    index,
                    message: e.to_string(),
                }),
            };
            if results.send(Finished { ticket, result }).is_err() {
                debug!(index, "scheduler gone, dropping production result");
            }
        });
    }

    fn on_finished(&mut self, finished: Finished) {
        let index = self.slot.release(finished.ticket);

        match finished.result {
            Ok(produced) => {
                self.failures.on_success(index);
                self.timings.record(produced.timing);
                match self.store.merge(produced.segment) {
                    MergeOutcome::Inserted => info!(
                        index,
                        generated = self.store.generated_count(),
                        "segment buffered"
                    ),
                    MergeOutcome::Duplicate => debug!(index, "segment already buffered"),
                }
                self.evaluate();
            }
            Err(error) if error.is_cancelled() => {
                debug!(index, "production cancelled");
                self.publish();
            }
            Err(error) => {
                let action = self.failures.on_failure(index);
                self.reporter.report(&error, action);
                self.last_failure = Some(error);
                match action {
                    FailureAction::Stall => self.publish(),
                    FailureAction::RetryNow => self.evaluate(),
                    FailureAction::Skip => {
                        self.gaps.insert(index);
                        self.evaluate();
                    }
                }
            }
        }
    }

    fn publish(&self) {
        self.snapshots.send_replace(BufferSnapshot {
            story: self.store.snapshot(),
            in_flight: self.slot.in_flight(),
            playback: self.playback,
            gaps: self.gaps.iter().copied().collect(),
            last_failure: self.last_failure.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result as EchoResult;
    use crate::provider::{
        MockNarrativeProvider, MockOutlineProvider, MockSpeechProvider, NarrativeProvider,
        Providers, SegmentRequest,
    };
    use crate::segment::Stage;
    use crate::story::{AudioBuffer, Outline, StorySegment};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct CollectingReporter {
        reports: Mutex<Vec<(SegmentError, FailureAction)>>,
    }

    impl CollectingReporter {
        fn reports(&self) -> Vec<(SegmentError, FailureAction)> {
            self.reports.lock().unwrap().clone()
        }
    }

    impl FailureReporter for CollectingReporter {
        fn report(&self, error: &SegmentError, action: FailureAction) {
            self.reports.lock().unwrap().push((error.clone(), action));
        }
    }

    struct PanickingNarrative {
        index: u32,
    }

    #[async_trait]
    impl NarrativeProvider for PanickingNarrative {
        async fn narrate(&self, request: &SegmentRequest) -> EchoResult<String> {
            if request.index == self.index {
                panic!("narrative provider crashed");
            }
            Ok(format!("segment {}", request.index))
        }
    }

    struct Harness {
        handle: SchedulerHandle,
        reporter: Arc<CollectingReporter>,
    }

    fn start(
        total: u32,
        narrative: Arc<dyn NarrativeProvider>,
        speech: Arc<MockSpeechProvider>,
        policy: FailurePolicy,
    ) -> Harness {
        let providers = Providers::new(Arc::new(MockOutlineProvider::default()), narrative, speech);
        let producer = SegmentProducer::from_config(&Config::default(), &providers);
        let first = StorySegment::new(1, "Segment 1", AudioBuffer::new(vec![0.0; 10], 24_000, 1));
        let store = StoryStore::new(total, Outline::filler(total), first);
        let route = Arc::new(RouteDetails::new("Gate", "Tower", total * 60));
        let settings = SchedulerSettings {
            policy,
            ..SchedulerSettings::default()
        };
        let reporter = Arc::new(CollectingReporter::default());
        let handle = BufferScheduler::spawn(store, route, producer, settings, reporter.clone());
        Harness { handle, reporter }
    }

    async fn wait_until(
        handle: &SchedulerHandle,
        condition: impl FnMut(&BufferSnapshot) -> bool,
    ) -> BufferSnapshot {
        let mut rx = handle.subscribe();
        let snapshot = rx.wait_for(condition).await.unwrap().clone();
        snapshot
    }

    fn idle_with(generated: u32) -> impl FnMut(&BufferSnapshot) -> bool {
        move |s: &BufferSnapshot| s.generated_count() == generated && s.in_flight.is_none()
    }

    #[tokio::test(start_paused = true)]
    async fn buffers_lookahead_then_waits_for_playback() {
        let narrative = Arc::new(MockNarrativeProvider::new());
        let h = start(6, narrative.clone(), Arc::new(MockSpeechProvider::new()), FailurePolicy::Stall);

        let snapshot = wait_until(&h.handle, idle_with(3)).await;
        assert_eq!(snapshot.story.indices(), vec![1, 2, 3]);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.handle.snapshot().generated_count(), 3);
        assert_eq!(narrative.requested_indices(), vec![2, 3]);

        h.handle.report_playback(1).unwrap();
        wait_until(&h.handle, idle_with(4)).await;
        h.handle.report_playback(3).unwrap();
        let snapshot = wait_until(&h.handle, idle_with(6)).await;
        assert!(snapshot.story.is_complete());
        assert!(snapshot.is_settled());
        assert_eq!(narrative.requested_indices(), vec![2, 3, 4, 5, 6]);
        assert_eq!(narrative.max_concurrent(), 1);

        let timings = h.handle.shutdown().await;
        assert_eq!(timings.stats().unwrap().count, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn passes_trailing_story_text_as_context() {
        let narrative = Arc::new(MockNarrativeProvider::new());
        let h = start(3, narrative.clone(), Arc::new(MockSpeechProvider::new()), FailurePolicy::Stall);

        wait_until(&h.handle, idle_with(3)).await;
        let requests = narrative.requests();
        assert_eq!(requests[0].context, "Segment 1");
        assert_eq!(
            requests[1].context,
            "Segment 1 Segment 2 of 3: Continue the immersive journey through the landscape."
        );
        assert_eq!(requests[1].total_segments, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_timeout_waits_for_next_playback_report() {
        let narrative = Arc::new(
            MockNarrativeProvider::new().with_delay_for(4, Duration::from_secs(61)),
        );
        let h = start(6, narrative.clone(), Arc::new(MockSpeechProvider::new()), FailurePolicy::Stall);
        wait_until(&h.handle, idle_with(3)).await;

        h.handle.report_playback(1).unwrap();
        let snapshot = wait_until(&h.handle, |s| s.last_failure.is_some() && s.in_flight.is_none()).await;
        assert_eq!(snapshot.generated_count(), 3);
        assert!(matches!(
            snapshot.last_failure,
            Some(SegmentError::TimedOut { stage: Stage::Text, index: 4, .. })
        ));
        assert_eq!(h.reporter.reports()[0].1, FailureAction::Stall);

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(h.handle.snapshot().generated_count(), 3);
        assert_eq!(narrative.requested_indices(), vec![2, 3, 4]);

        h.handle.report_playback(2).unwrap();
        wait_until(&h.handle, |s| s.in_flight == Some(4)).await;
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(narrative.requested_indices(), vec![2, 3, 4, 4]);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_retries_same_index() {
        let narrative = Arc::new(MockNarrativeProvider::new().with_failures_for(3, 1));
        let h = start(
            3,
            narrative.clone(),
            Arc::new(MockSpeechProvider::new()),
            FailurePolicy::Retry { max_attempts: 2 },
        );

        let snapshot = wait_until(&h.handle, idle_with(3)).await;
        assert!(snapshot.gaps.is_empty());
        assert_eq!(narrative.requested_indices(), vec![2, 3, 3]);
        assert_eq!(h.reporter.reports()[0].1, FailureAction::RetryNow);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_policy_gives_up_after_max_attempts() {
        let narrative = Arc::new(MockNarrativeProvider::new().with_failure_for(2));
        let h = start(
            3,
            narrative.clone(),
            Arc::new(MockSpeechProvider::new()),
            FailurePolicy::Retry { max_attempts: 2 },
        );

        let snapshot = wait_until(&h.handle, |s| s.is_settled() && s.in_flight.is_none()).await;
        assert_eq!(snapshot.gaps, vec![2]);
        assert_eq!(snapshot.story.indices(), vec![1, 3]);
        assert_eq!(narrative.requested_indices(), vec![2, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_policy_moves_past_failed_index() {
        let narrative = Arc::new(MockNarrativeProvider::new().with_failure_for(2));
        let h = start(4, narrative.clone(), Arc::new(MockSpeechProvider::new()), FailurePolicy::Skip);

        let snapshot = wait_until(&h.handle, |s| s.settled_count() == 3 && s.in_flight.is_none()).await;
        assert!(snapshot.is_gap(2));
        assert_eq!(snapshot.story.indices(), vec![1, 3]);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(narrative.requested_indices(), vec![2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_production_releases_slot() {
        let h = start(
            3,
            Arc::new(PanickingNarrative { index: 2 }),
            Arc::new(MockSpeechProvider::new()),
            FailurePolicy::Skip,
        );

        let snapshot = wait_until(&h.handle, |s| s.is_settled() && s.in_flight.is_none()).await;
        assert_eq!(snapshot.gaps, vec![2]);
        assert_eq!(snapshot.story.indices(), vec![1, 3]);
        assert!(matches!(
            h.reporter.reports()[0].0,
            SegmentError::Aborted { index: 2, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_in_flight_production() {
        let narrative = Arc::new(MockNarrativeProvider::new().with_delay(Duration::from_secs(30)));
        let speech = Arc::new(MockSpeechProvider::new());
        let h = start(3, narrative.clone(), speech.clone(), FailurePolicy::Stall);

        wait_until(&h.handle, |s| s.in_flight == Some(2)).await;
        let timings = h.handle.shutdown().await;
        assert!(timings.stats().is_none());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(speech.calls(), 0);
        assert!(h.reporter.reports().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn last_snapshot_survives_shutdown() {
        let h = start(
            1,
            Arc::new(MockNarrativeProvider::new()),
            Arc::new(MockSpeechProvider::new()),
            FailurePolicy::Stall,
        );
        let rx = h.handle.subscribe();
        h.handle.shutdown().await;
        assert!(rx.borrow().is_settled());
    }

    #[tokio::test]
    async fn single_segment_story_requests_nothing() {
        let narrative = Arc::new(MockNarrativeProvider::new());
        let h = start(
            1,
            narrative.clone(),
            Arc::new(MockSpeechProvider::new()),
            FailurePolicy::Stall,
        );
        h.handle.report_playback(1).unwrap();
        tokio::task::yield_now().await;
        assert!(h.handle.snapshot().is_settled());
        assert!(narrative.requested_indices().is_empty());
        h.handle.shutdown().await;
    }
}
