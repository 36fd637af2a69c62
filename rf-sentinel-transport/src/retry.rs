//! Reconnect backoff for C1, in the shape of a retry-policy builder.
//!
//! Unlike a request-level retry policy, the SDR transport retries forever
//! (§4.1: "the daemon is considered a recoverable peer") — `RetryConfig`
//! here only controls the delay curve, not a retry budget.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    initial_delay: Duration,
    max_delay: Duration,
    jitter: bool,
}

impl RetryConfig {
    /// Defaults per §4.1: initial 2s, capped at 60s, exponential with
    /// jitter enabled.
    pub fn new() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before attempt `attempt` (1-indexed): exponential backoff
    /// capped at `max_delay`, jittered by ±10% to avoid a thundering herd
    /// against a restarting daemon.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let base = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(self.max_delay);
        if !self.jitter {
            return base;
        }
        let base_nanos = base.as_nanos() as i64;
        if base_nanos == 0 {
            return Duration::ZERO;
        }
        let spread = base_nanos / 10;
        let delta = fastrand::i64(-spread..=spread);
        Duration::from_nanos((base_nanos + delta).max(0) as u64)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_without_jitter() {
        let config = RetryConfig::new().with_jitter(false);
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(8));
    }

    #[test]
    fn caps_at_max_delay() {
        let config = RetryConfig::new().with_jitter(false);
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(60));
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let config = RetryConfig::new().with_jitter(true);
        let base = Duration::from_secs(8);
        let lower = base.mul_f64(0.9);
        let upper = base.mul_f64(1.1);
        for _ in 0..200 {
            let delay = config.delay_for_attempt(3);
            assert!(delay >= lower && delay <= upper, "{delay:?} out of bounds");
        }
    }
}
