//! Retry policy — bounded exponential backoff as an explicit value object.
//!
//! Passed to the dispatcher and generator rather than baked into control
//! flow, so tests can inject zero-delay policies and assert attempt counts.

use std::time::Duration;

/// Bounded exponential backoff policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (1 = no retries).
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub multiplier: u32,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// A zero-delay policy for tests — same attempt semantics, no waiting.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base_delay: Duration::ZERO,
            multiplier: 1,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay to wait before retry number `retry` (1-based).
    ///
    /// Returns `None` once the attempt budget is exhausted.
    pub fn delay_before_retry(&self, retry: u32) -> Option<Duration> {
        if retry == 0 || retry >= self.max_attempts {
            return None;
        }
        let factor = self.multiplier.saturating_pow(retry - 1);
        let delay = self.base_delay.saturating_mul(factor);
        Some(delay.min(self.max_delay))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_exponentially() {
        let policy = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_millis(100),
            multiplier: 2,
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(
            policy.delay_before_retry(1),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            policy.delay_before_retry(2),
            Some(Duration::from_millis(200))
        );
        assert_eq!(
            policy.delay_before_retry(3),
            Some(Duration::from_millis(400))
        );
        assert_eq!(policy.delay_before_retry(4), None);
    }

    #[test]
    fn delay_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: Duration::from_secs(10),
            multiplier: 10,
            max_delay: Duration::from_secs(30),
        };
        assert_eq!(policy.delay_before_retry(3), Some(Duration::from_secs(30)));
    }

    #[test]
    fn none_policy_never_retries() {
        let policy = RetryPolicy::none();
        assert_eq!(policy.delay_before_retry(1), None);
    }

    #[test]
    fn immediate_policy_has_zero_delays() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.delay_before_retry(1), Some(Duration::ZERO));
        assert_eq!(policy.delay_before_retry(2), Some(Duration::ZERO));
        assert_eq!(policy.delay_before_retry(3), None);
    }
}
