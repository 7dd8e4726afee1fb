//! What to do when a background segment fails.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Configured reaction to a failed background production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Wait for the next playback report, then request the same index again.
    #[default]
    Stall,
    /// Retry immediately, up to `max_attempts` attempts in total, then skip.
    Retry { max_attempts: u32 },
    /// Give up on the index and move on.
    Skip,
}

/// Decision for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureAction {
    Stall,
    RetryNow,
    Skip,
}

/// Applies a [`FailurePolicy`], counting attempts per index.
#[derive(Debug, Default)]
pub struct FailureTracker {
    policy: FailurePolicy,
    attempts: HashMap<u32, u32>,
}

impl FailureTracker {
    pub fn new(policy: FailurePolicy) -> Self {
        Self {
            policy,
            attempts: HashMap::new(),
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Record a failure of `index` and decide what happens next.
    pub fn on_failure(&mut self, index: u32) -> FailureAction {
        match self.policy {
            FailurePolicy::Stall => FailureAction::Stall,
            FailurePolicy::Skip => FailureAction::Skip,
            FailurePolicy::Retry { max_attempts } => {
                let attempts = self.attempts.entry(index).or_insert(0);
                *attempts += 1;
                if *attempts >= max_attempts {
                    self.attempts.remove(&index);
                    FailureAction::Skip
                } else {
                    FailureAction::RetryNow
                }
            }
        }
    }

    pub fn on_success(&mut self, index: u32) {
        self.attempts.remove(&index);
    }

    /// Failed attempts recorded so far for `index`.
    pub fn attempts(&self, index: u32) -> u32 {
        self.attempts.get(&index).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stall_never_gives_up() {
        let mut tracker = FailureTracker::new(FailurePolicy::Stall);
        for _ in 0..10 {
            assert_eq!(tracker.on_failure(4), FailureAction::Stall);
        }
        assert_eq!(tracker.attempts(4), 0);
    }

    #[test]
    fn retry_skips_after_max_attempts() {
        let mut tracker = FailureTracker::new(FailurePolicy::Retry { max_attempts: 3 });
        assert_eq!(tracker.on_failure(2), FailureAction::RetryNow);
        assert_eq!(tracker.on_failure(2), FailureAction::RetryNow);
        assert_eq!(tracker.attempts(2), 2);
        assert_eq!(tracker.on_failure(2), FailureAction::Skip);
        assert_eq!(tracker.attempts(2), 0);
    }

    #[test]
    fn success_resets_attempts() {
        let mut tracker = FailureTracker::new(FailurePolicy::Retry { max_attempts: 2 });
        assert_eq!(tracker.on_failure(5), FailureAction::RetryNow);
        tracker.on_success(5);
        assert_eq!(tracker.on_failure(5), FailureAction::RetryNow);
    }

    #[test]
    fn single_attempt_retry_skips_immediately() {
        let mut tracker = FailureTracker::new(FailurePolicy::Retry { max_attempts: 1 });
        assert_eq!(tracker.on_failure(1), FailureAction::Skip);
    }

    #[test]
    fn skip_policy_skips() {
        let mut tracker = FailureTracker::new(FailurePolicy::Skip);
        assert_eq!(tracker.policy(), FailurePolicy::Skip);
        assert_eq!(tracker.on_failure(3), FailureAction::Skip);
    }
}
