//! Exponential backoff with jitter

use rand::{thread_rng, Rng};
use std::time::Duration;

/// Computes wait intervals between retry attempts
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    base_delay: Duration,
    max_delay: Duration,
    jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl BackoffPolicy {
    /// Create a policy with ±20% jitter
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
            jitter: 0.2,
        }
    }

    /// Set the jitter as a fraction of the delay (clamped to 0.0..=1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = if jitter.is_finite() {
            jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn base_delay(&self) -> Duration {
        self.base_delay
    }

    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Delay before the retry that follows attempt number `attempt` (0-based).
    ///
    /// `min(max_delay, base_delay * 2^attempt)`, then jittered, never above `max_delay`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        if self.jitter == 0.0 || capped.is_zero() {
            return capped;
        }

        let factor = thread_rng().gen_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        capped.mul_f64(factor).min(self.max_delay)
    }

    /// Upper bound on the total backoff slept across `max_attempts` attempts
    pub fn total_budget(&self, max_attempts: u32) -> Duration {
        (0..max_attempts.saturating_sub(1))
            .map(|attempt| self.capped_delay(attempt))
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    fn capped_delay(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }
}
