//! Retry Policy
//!
//! Bounded linear backoff for failed renewals.

use std::time::Duration;

/// Retry decision for failed renewals.
///
/// Stateless: the caller counts attempts. Attempt `n` (1-based, counting
/// failures so far) waits `base_delay * n` before the next try.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Delay unit multiplied by the attempt number.
    pub base_delay: Duration,
    /// Maximum number of retries after the first failure.
    pub max_retries: u32,
    /// Jitter factor (0.0-1.0). Zero keeps delays deterministic.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        DEFAULT_RETRY_POLICY
    }
}

/// Default retry policy: 1s, 2s, 3s and then give up.
pub const DEFAULT_RETRY_POLICY: RetryPolicy = RetryPolicy {
    base_delay: Duration::from_secs(1),
    max_retries: 3,
    jitter: 0.0,
};

impl RetryPolicy {
    /// Create new retry policy without jitter.
    pub fn new(base_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_retries,
            jitter: 0.0,
        }
    }

    /// Set jitter factor, clamped to 0.0-1.0.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Whether another attempt is allowed after `attempt` failures.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt <= self.max_retries
    }

    /// Delay before the retry that follows failure number `attempt`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.saturating_mul(attempt);

        if self.jitter <= 0.0 {
            return delay;
        }

        let millis = delay.as_millis() as f64;
        let jitter_range = millis * self.jitter;
        let jitter = (rand::random::<f64>() - 0.5) * 2.0 * jitter_range;
        Duration::from_millis((millis + jitter).max(0.0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_linear_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.next_delay(1), Duration::from_secs(1));
        assert_eq!(policy.next_delay(2), Duration::from_secs(2));
        assert_eq!(policy.next_delay(3), Duration::from_secs(3));
    }

    #[test]
    fn test_should_retry_bound() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1));
        assert!(policy.should_retry(3));
        assert!(!policy.should_retry(4));

        let never = RetryPolicy::new(Duration::from_secs(1), 0);
        assert!(!never.should_retry(1));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::new(Duration::from_secs(10), 3).with_jitter(0.1);
        for _ in 0..50 {
            let delay = policy.next_delay(1);
            assert!(delay >= Duration::from_secs(9));
            assert!(delay <= Duration::from_secs(11));
        }
    }
}
