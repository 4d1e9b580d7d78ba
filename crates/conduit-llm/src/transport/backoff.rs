use std::time::Duration;

use conduit_config::RetryConfig;
use rand::Rng;

/// Upper bound (exclusive) of the random jitter factor
pub const MAX_JITTER: f64 = 0.3;

/// Exponential backoff with proportional jitter
///
/// The delay before retry `n` (0-indexed) is
/// `min(base * 2^n * (1 + jitter), max)` with `jitter` drawn uniformly
/// from `[0, MAX_JITTER)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl BackoffPolicy {
    pub const fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self { base_delay, max_delay }
    }

    pub const fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.base_delay(), config.max_delay())
    }

    /// Delay before retry `attempt` with a freshly drawn jitter
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = rand::rng().random_range(0.0..MAX_JITTER);
        self.delay_with_jitter(attempt, jitter)
    }

    /// Delay before retry `attempt` for a given jitter factor
    ///
    /// `jitter` is clamped to `[0, MAX_JITTER]`.
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        // 2^30 already exceeds any sensible cap; clamping keeps the float finite
        let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
        let factor = 2f64.powi(exponent) * (1.0 + jitter.clamp(0.0, MAX_JITTER));
        let secs = (self.base_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());

        Duration::from_secs_f64(secs)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
