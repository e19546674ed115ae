//! Retry schedule for upstream calls.

use std::time::Duration;

use rand::Rng;

/// Retry and timeout policy for one adapter call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts in total, including the first
    pub max_attempts: u32,
    /// Base delay after the n-th failed attempt; the last entry repeats
    pub backoff: Vec<Duration>,
    /// Up to this fraction of the base delay is added at random
    pub jitter: f64,
    /// Timeout for a single attempt
    pub attempt_timeout: Duration,
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    pub fn with_backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Base delay after `attempt` (1-based) failed.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let index = (attempt.max(1) - 1) as usize;
        self.backoff
            .get(index)
            .or(self.backoff.last())
            .copied()
            .unwrap_or(Duration::ZERO)
    }

    /// Delay after `attempt` failed, with jitter applied.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0);
        if jitter == 0.0 || base.is_zero() {
            return base;
        }
        let extra = rand::thread_rng().gen_range(0.0..=jitter);
        base + base.mul_f64(extra)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ],
            jitter: 0.5,
            attempt_timeout: Duration::from_millis(1200),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_delays_double_then_repeat() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.base_delay(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay(2), Duration::from_millis(200));
        assert_eq!(policy.base_delay(3), Duration::from_millis(400));
        assert_eq!(policy.base_delay(7), Duration::from_millis(400));
    }

    #[test]
    fn no_jitter_is_exact() {
        let policy = RetryPolicy::default().with_jitter(0.0);
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
    }

    #[test]
    fn empty_backoff_means_no_delay() {
        let policy = RetryPolicy::default().with_backoff(Vec::new());
        assert_eq!(policy.delay_after(1), Duration::ZERO);
    }
}
