//! Text-then-speech production of one segment.

use crate::config::Config;
use crate::provider::Providers;
use crate::route::RouteDetails;
use crate::segment::audio::SegmentAudioSynthesizer;
use crate::segment::error::{SegmentError, Stage};
use crate::segment::text::SegmentTextGenerator;
use crate::segment::timing::SegmentTiming;
use crate::story::StorySegment;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Everything needed to produce one segment, captured when it is scheduled.
#[derive(Debug, Clone)]
pub struct SegmentJob {
    pub route: Arc<RouteDetails>,
    pub index: u32,
    pub total_segments: u32,
    pub beat: String,
    /// Story text so far (the text stage bounds it further).
    pub context: String,
}

/// A finished segment and how long it took.
#[derive(Debug, Clone)]
pub struct ProducedSegment {
    pub segment: StorySegment,
    pub timing: SegmentTiming,
}

/// Produces segments with a deadline on each stage.
///
/// A stage that misses its deadline or is cancelled has its provider future
/// dropped, which abandons the underlying request.
#[derive(Clone)]
pub struct SegmentProducer {
    text: SegmentTextGenerator,
    audio: SegmentAudioSynthesizer,
    text_timeout: Duration,
    audio_timeout: Duration,
}

impl SegmentProducer {
    pub fn new(
        text: SegmentTextGenerator,
        audio: SegmentAudioSynthesizer,
        text_timeout: Duration,
        audio_timeout: Duration,
    ) -> Self {
        Self {
            text,
            audio,
            text_timeout,
            audio_timeout,
        }
    }

    pub fn from_config(config: &Config, providers: &Providers) -> Self {
        Self::new(
            SegmentTextGenerator::new(
                Arc::clone(&providers.narrative),
                config.story.words_per_segment(),
                config.story.context_chars,
            ),
            SegmentAudioSynthesizer::new(Arc::clone(&providers.speech), &config.provider.voice),
            config.timeouts.text(),
            config.timeouts.audio(),
        )
    }

    /// Produce the segment described by `job`.
    ///
    /// Speech is only requested once text succeeded; either failure, timeout
    /// or cancellation yields no segment.
    pub async fn produce(
        &self,
        job: &SegmentJob,
        cancel: &CancellationToken,
    ) -> Result<ProducedSegment, SegmentError> {
        let index = job.index;

        let started = Instant::now();
        let text = bounded(
            Stage::Text,
            index,
            self.text_timeout,
            cancel,
            self.text.generate_text(
                &job.route,
                index,
                job.total_segments,
                &job.beat,
                &job.context,
            ),
        )
        .await?;
        let text_elapsed = started.elapsed();
        debug!(index, chars = text.len(), ?text_elapsed, "segment text ready");

        let started = Instant::now();
        let audio = bounded(
            Stage::Audio,
            index,
            self.audio_timeout,
            cancel,
            self.audio.synthesize(index, &text),
        )
        .await?;
        let audio_elapsed = started.elapsed();
        debug!(
            index,
            audio_secs = audio.duration().as_secs_f32(),
            ?audio_elapsed,
            "segment audio ready"
        );

        let timing = SegmentTiming {
            index,
            text: text_elapsed,
            audio: audio_elapsed,
            audio_duration: audio.duration(),
        };
        Ok(ProducedSegment {
            segment: StorySegment::new(index, text, audio),
            timing,
        })
    }
}

/// Run one stage under its deadline, abandoning it on cancellation.
async fn bounded<T, F>(
    stage: Stage,
    index: u32,
    limit: Duration,
    cancel: &CancellationToken,
    work: F,
) -> Result<T, SegmentError>
where
    F: Future<Output = Result<T, SegmentError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SegmentError::Cancelled { index }),
        outcome = tokio::time::timeout(limit, work) => match outcome {
            Ok(result) => result,
            Err(_) => Err(SegmentError::TimedOut { stage, index, after: limit }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MockNarrativeProvider, MockOutlineProvider, MockSpeechProvider};

    fn producer(narrative: MockNarrativeProvider, speech: MockSpeechProvider) -> SegmentProducer {
        let providers = Providers::new(
            Arc::new(MockOutlineProvider::default()),
            Arc::new(narrative),
            Arc::new(speech),
        );
        SegmentProducer::from_config(&Config::default(), &providers)
    }

    fn job(index: u32) -> SegmentJob {
        SegmentJob {
            route: Arc::new(RouteDetails::new("Quay", "Abbey", 600)),
            index,
            total_segments: 10,
            beat: "the bells ring".to_string(),
            context: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn produces_text_and_audio() {
        let producer = producer(
            MockNarrativeProvider::new().with_delay(Duration::from_secs(2)),
            MockSpeechProvider::new().with_delay(Duration::from_secs(5)),
        );

        let produced = producer
            .produce(&job(3), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(produced.segment.index, 3);
        assert_eq!(produced.segment.text, "Segment 3 of 10: the bells ring");
        assert_eq!(produced.segment.duration(), Duration::from_secs(1));
        assert_eq!(produced.timing.text, Duration::from_secs(2));
        assert_eq!(produced.timing.audio, Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn text_stage_times_out_after_sixty_seconds() {
        let speech = Arc::new(MockSpeechProvider::new());
        let providers = Providers::new(
            Arc::new(MockOutlineProvider::default()),
            Arc::new(MockNarrativeProvider::new().with_delay(Duration::from_secs(61))),
            speech.clone(),
        );
        let producer = SegmentProducer::from_config(&Config::default(), &providers);

        let started = Instant::now();
        let error = producer
            .produce(&job(4), &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            error,
            SegmentError::TimedOut {
                stage: Stage::Text,
                index: 4,
                after: Duration::from_secs(60),
            }
        );
        assert_eq!(started.elapsed(), Duration::from_secs(60));
        assert_eq!(speech.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn audio_stage_times_out_after_hundred_seconds() {
        let producer = producer(
            MockNarrativeProvider::new(),
            MockSpeechProvider::new().with_delay(Duration::from_secs(101)),
        );

        let error = producer
            .produce(&job(2), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            error,
            SegmentError::TimedOut {
                stage: Stage::Audio,
                index: 2,
                ..
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_the_stage() {
        let producer = producer(
            MockNarrativeProvider::new().with_delay(Duration::from_secs(30)),
            MockSpeechProvider::new(),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let error = producer.produce(&job(1), &cancel).await.unwrap_err();
        assert_eq!(error, SegmentError::Cancelled { index: 1 });
        assert_eq!(started.elapsed(), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn already_cancelled_token_wins() {
        let producer = producer(MockNarrativeProvider::new(), MockSpeechProvider::new());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(producer.produce(&job(1), &cancel).await.unwrap_err().is_cancelled());
    }
}
