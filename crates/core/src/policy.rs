use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use crate::config::duration_ms;
use crate::FailureKind;

/// Delay before the next attempt, as a function of the attempt just failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Backoff {
    Fixed {
        #[serde(with = "duration_ms")]
        delay: Duration,
    },
    Linear {
        #[serde(with = "duration_ms")]
        step: Duration,
    },
    Exponential {
        #[serde(with = "duration_ms")]
        base: Duration,
        #[serde(with = "duration_ms")]
        max: Duration,
    },
}

impl Backoff {
    /// `attempt` is 1-based: the delay after the first failure is `delay(1)`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match self {
            Self::Fixed { delay } => *delay,
            Self::Linear { step } => step.saturating_mul(attempt),
            Self::Exponential { base, max } => {
                let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
                base.saturating_mul(factor).min(*max)
            }
        }
    }
}

/// Bounded retry over named transient failure classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retryable: BTreeSet<FailureKind>,
    pub backoff: Backoff,
    /// Per-attempt bound for the element to become ready before operating
    #[serde(with = "duration_ms")]
    pub locate_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retryable: FailureKind::TRANSIENT.into_iter().collect(),
            backoff: Backoff::Fixed {
                delay: Duration::from_millis(1500),
            },
            locate_timeout: Duration::from_secs(45),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_locate_timeout(mut self, timeout: Duration) -> Self {
        self.locate_timeout = timeout;
        self
    }

    pub fn with_retryable(mut self, kinds: impl IntoIterator<Item = FailureKind>) -> Self {
        self.retryable = kinds.into_iter().collect();
        self
    }

    pub fn retries(&self, kind: FailureKind) -> bool {
        self.retryable.contains(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_matches_legacy_helper() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.backoff.delay(1), Duration::from_millis(1500));
        assert!(policy.retries(FailureKind::ClickIntercepted));
        assert!(!policy.retries(FailureKind::Script));
    }

    #[test]
    fn new_clamps_to_one_attempt() {
        assert_eq!(RetryPolicy::new(0).max_attempts, 1);
    }

    #[test]
    fn exponential_backoff_is_capped() {
        let backoff = Backoff::Exponential {
            base: Duration::from_millis(100),
            max: Duration::from_millis(500),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(500));
        assert_eq!(backoff.delay(40), Duration::from_millis(500));
    }

    #[test]
    fn linear_backoff_grows_per_attempt() {
        let backoff = Backoff::Linear {
            step: Duration::from_millis(250),
        };
        assert_eq!(backoff.delay(2), Duration::from_millis(500));
    }
}
