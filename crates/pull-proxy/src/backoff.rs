//! Retry budget and reconnect delay policy.
//!
//! Delays grow linearly from `reconnect_delay_min` by `reconnect_delay_step`
//! per consecutive failure and are capped at `reconnect_delay_max`
//! (2s, 5s, 8s, ..., 60s with the defaults). The failure count resets after
//! every successful connection.

use crate::config::ProxyConfig;
use std::time::Duration;

/// Retry budget and delay parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after consecutive failures; negative is unlimited.
    pub retry_count: i32,
    pub min: Duration,
    pub max: Duration,
    pub step: Duration,
}

impl RetryPolicy {
    /// Delay before retry `k` (1-based).
    #[must_use]
    pub fn delay_for(&self, k: u32) -> Duration {
        let grown = self
            .step
            .saturating_mul(k.saturating_sub(1))
            .saturating_add(self.min);
        grown.min(self.max)
    }

    /// Whether another retry is allowed after `failures` consecutive failures.
    #[must_use]
    pub fn allows_retry(&self, failures: u32) -> bool {
        match u32::try_from(self.retry_count) {
            Ok(budget) => failures <= budget,
            Err(_) => true,
        }
    }
}

impl From<&ProxyConfig> for RetryPolicy {
    fn from(config: &ProxyConfig) -> Self {
        Self {
            retry_count: config.retry_count,
            min: config.reconnect_delay_min,
            max: config.reconnect_delay_max,
            step: config.reconnect_delay_step,
        }
    }
}

/// Outcome of recording a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Schedule retry number `attempt` after `delay`.
    Retry { attempt: u32, delay: Duration },
    /// Budget exhausted after `failures` consecutive failures.
    GiveUp { failures: u32 },
}

/// Consecutive-failure counter driving a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
}

impl Backoff {
    #[must_use]
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
        }
    }

    /// Count one more failure and decide what happens next.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);
        if self.policy.allows_retry(self.failures) {
            RetryDecision::Retry {
                attempt: self.failures,
                delay: self.policy.delay_for(self.failures),
            }
        } else {
            RetryDecision::GiveUp {
                failures: self.failures,
            }
        }
    }

    /// Forget all failures (after a success or a fresh `play()`).
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn policy(retry_count: i32) -> RetryPolicy {
        RetryPolicy::from(&ProxyConfig {
            retry_count,
            ..ProxyConfig::default()
        })
    }

    #[test]
    fn test_delay_sequence_with_defaults() {
        let p = policy(-1);
        let delays: Vec<u64> = (1..=6).map(|k| p.delay_for(k).as_secs()).collect();
        assert_eq!(delays, vec![2, 5, 8, 11, 14, 17]);
    }

    #[test]
    fn test_delay_capped_at_max() {
        let p = policy(-1);
        // 2 + 19*3 = 59, 2 + 20*3 = 62 -> capped
        assert_eq!(p.delay_for(20), Duration::from_secs(59));
        assert_eq!(p.delay_for(21), Duration::from_secs(60));
        assert_eq!(p.delay_for(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_zero_step_keeps_min() {
        let p = RetryPolicy {
            retry_count: -1,
            min: Duration::from_secs(4),
            max: Duration::from_secs(60),
            step: Duration::ZERO,
        };
        assert_eq!(p.delay_for(1), Duration::from_secs(4));
        assert_eq!(p.delay_for(50), Duration::from_secs(4));
    }

    #[test]
    fn test_budget_of_two_allows_two_retries() {
        let mut backoff = Backoff::new(policy(2));

        assert_eq!(
            backoff.record_failure(),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(2)
            }
        );
        assert_eq!(
            backoff.record_failure(),
            RetryDecision::Retry {
                attempt: 2,
                delay: Duration::from_secs(5)
            }
        );
        assert_eq!(
            backoff.record_failure(),
            RetryDecision::GiveUp { failures: 3 }
        );
    }

    #[test]
    fn test_zero_budget_never_retries() {
        let mut backoff = Backoff::new(policy(0));
        assert_eq!(
            backoff.record_failure(),
            RetryDecision::GiveUp { failures: 1 }
        );
    }

    #[test]
    fn test_unlimited_budget() {
        let mut backoff = Backoff::new(policy(-1));
        for _ in 0..1000 {
            assert!(matches!(
                backoff.record_failure(),
                RetryDecision::Retry { .. }
            ));
        }
        assert_eq!(backoff.failures(), 1000);
    }

    #[test]
    fn test_reset_restarts_delay_sequence() {
        let mut backoff = Backoff::new(policy(-1));
        backoff.record_failure();
        backoff.record_failure();
        backoff.reset();

        assert_eq!(backoff.failures(), 0);
        assert_eq!(
            backoff.record_failure(),
            RetryDecision::Retry {
                attempt: 1,
                delay: Duration::from_secs(2)
            }
        );
    }
}
