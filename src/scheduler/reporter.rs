//! Reporting of background production failures.

use crate::scheduler::policy::FailureAction;
use crate::segment::SegmentError;
use tracing::warn;

/// Receives every background failure together with the decision taken.
pub trait FailureReporter: Send + Sync {
    fn report(&self, error: &SegmentError, action: FailureAction);
}

/// Logs failures as warnings.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl FailureReporter for LogReporter {
    fn report(&self, error: &SegmentError, action: FailureAction) {
        let next = match action {
            FailureAction::Stall => "waiting for playback to advance",
            FailureAction::RetryNow => "retrying",
            FailureAction::Skip => "skipping segment",
        };
        warn!(index = error.index(), %error, "background segment failed, {next}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_reporter() {
        let error = SegmentError::Generation {
            index: 4,
            message: "quota".to_string(),
        };
        // Just ensure it doesn't panic
        LogReporter.report(&error, FailureAction::Stall);
        LogReporter.report(&error, FailureAction::Skip);
    }
}
