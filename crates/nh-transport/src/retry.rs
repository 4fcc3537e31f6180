use std::time::Duration;

use rand::Rng;

/// Pure function from attempt count to next-attempt delay, or give up
/// (spec §4.6). `interval`/`should_retry` never touch I/O or shared state.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_interval: Duration, multiplier: f64, max_jitter: Duration) -> Self {
        Self {
            max_retries,
            initial_interval,
            multiplier,
            max_jitter,
        }
    }

    /// `{3, 30s, 2.0, 5s}` (spec §4.6).
    pub fn default_policy() -> Self {
        Self::new(3, Duration::from_secs(30), 2.0, Duration::from_secs(5))
    }

    /// `{5, 10s, 1.5, 2s}`.
    pub fn aggressive() -> Self {
        Self::new(5, Duration::from_secs(10), 1.5, Duration::from_secs(2))
    }

    /// `{0, 0, 0, 0}` — at most one attempt per target.
    pub fn no_retry() -> Self {
        Self::new(0, Duration::ZERO, 0.0, Duration::ZERO)
    }

    /// `{n, interval, 1.0, 0}`.
    pub fn linear(max_retries: u32, interval: Duration) -> Self {
        Self::new(max_retries, interval, 1.0, Duration::ZERO)
    }

    pub fn should_retry(&self, attempts: u32) -> bool {
        attempts < self.max_retries
    }

    /// `initial × multiplier^attempts + uniform(0, max_jitter)`. A
    /// `multiplier` of `1.0` degenerates to the linear variant.
    pub fn interval(&self, attempts: u32) -> Duration {
        let base = self.initial_interval.as_secs_f64() * self.multiplier.powi(attempts as i32);
        let jitter = if self.max_jitter.is_zero() {
            0.0
        } else {
            rand::rng().random_range(0.0..=self.max_jitter.as_secs_f64())
        };
        Duration::from_secs_f64((base + jitter).max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_with_no_jitter_is_exact() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), 2.0, Duration::ZERO);
        assert_eq!(policy.interval(0), Duration::from_millis(100));
        assert_eq!(policy.interval(1), Duration::from_millis(200));
        assert_eq!(policy.interval(2), Duration::from_millis(400));
    }

    #[test]
    fn should_retry_respects_max() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), 2.0, Duration::ZERO);
        assert!(policy.should_retry(0));
        assert!(policy.should_retry(2));
        assert!(!policy.should_retry(3));
    }

    #[test]
    fn no_retry_never_retries() {
        let policy = RetryPolicy::no_retry();
        assert!(!policy.should_retry(0));
    }

    #[test]
    fn linear_ignores_attempt_count() {
        let policy = RetryPolicy::linear(4, Duration::from_secs(1));
        assert_eq!(policy.interval(0), policy.interval(3));
    }
}
