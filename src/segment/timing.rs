//! Production timing for generated segments.

use std::time::Duration;

/// How long one segment took to produce.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTiming {
    pub index: u32,
    /// Time spent waiting for narrative text.
    pub text: Duration,
    /// Time spent waiting for speech.
    pub audio: Duration,
    /// Playback length of the produced audio.
    pub audio_duration: Duration,
}

impl SegmentTiming {
    /// Total production time.
    pub fn total(&self) -> Duration {
        self.text + self.audio
    }

    /// Production time per second of audio.
    /// < 1.0 means segments are produced faster than they play.
    pub fn realtime_factor(&self) -> f64 {
        if self.audio_duration.is_zero() {
            return 0.0;
        }
        self.total().as_secs_f64() / self.audio_duration.as_secs_f64()
    }
}

/// Aggregated production statistics.
#[derive(Debug, Clone)]
pub struct TimingStats {
    pub count: usize,
    pub text_avg: Duration,
    pub audio_avg: Duration,
    pub total_min: Duration,
    pub total_max: Duration,
    pub realtime_factor_avg: f64,
}

/// Collects per-segment timings.
#[derive(Debug, Default)]
pub struct TimingTracker {
    measurements: Vec<SegmentTiming>,
}

impl TimingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, timing: SegmentTiming) {
        self.measurements.push(timing);
    }

    pub fn stats(&self) -> Option<TimingStats> {
        let totals: Vec<Duration> = self.measurements.iter().map(|t| t.total()).collect();
        let &total_min = totals.iter().min()?;
        let &total_max = totals.iter().max()?;

        let texts: Vec<Duration> = self.measurements.iter().map(|t| t.text).collect();
        let audios: Vec<Duration> = self.measurements.iter().map(|t| t.audio).collect();
        let factor_sum: f64 = self.measurements.iter().map(|t| t.realtime_factor()).sum();

        Some(TimingStats {
            count: self.measurements.len(),
            text_avg: avg_duration(&texts),
            audio_avg: avg_duration(&audios),
            total_min,
            total_max,
            realtime_factor_avg: factor_sum / self.measurements.len() as f64,
        })
    }

    /// Human-readable summary lines, empty when nothing was recorded.
    pub fn summary(&self) -> Vec<String> {
        let Some(stats) = self.stats() else {
            return Vec::new();
        };
        vec![
            format!(
                "Produced {} segment{}",
                stats.count,
                if stats.count == 1 { "" } else { "s" }
            ),
            format!("  Avg text:   {}", format_duration(stats.text_avg)),
            format!("  Avg speech: {}", format_duration(stats.audio_avg)),
            format!(
                "  Fastest: {} | Slowest: {}  ({:.2}x real-time)",
                format_duration(stats.total_min),
                format_duration(stats.total_max),
                stats.realtime_factor_avg
            ),
        ]
    }
}

fn avg_duration(durations: &[Duration]) -> Duration {
    if durations.is_empty() {
        return Duration::ZERO;
    }
    durations.iter().sum::<Duration>() / durations.len() as u32
}

fn format_duration(d: Duration) -> String {
    let ms = d.as_millis();
    if ms < 1000 {
        format!("{}ms", ms)
    } else {
        format!("{:.1}s", d.as_secs_f64())
    }
}
