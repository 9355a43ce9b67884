//! Bounded exponential backoff.

use rand::Rng;
use std::time::Duration;

/// Backoff policy for retryable collaborator calls.
#[derive(Clone, Copy, Debug)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay_ms: u64,
    /// Upper bound on any single delay.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (0-based): `base * 2^attempt`
    /// capped at `max_delay_ms`, with up to 10% jitter to avoid thundering
    /// herds.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.min(16))
            .min(self.max_delay_ms);
        let jitter = rand::rng().random_range(0..=exp / 10);
        Duration::from_millis(exp + jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_double_until_cap() {
        let cfg = RetryConfig {
            max_retries: 5,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
        };
        let d0 = cfg.delay_for_attempt(0).as_millis() as u64;
        let d1 = cfg.delay_for_attempt(1).as_millis() as u64;
        let d4 = cfg.delay_for_attempt(4).as_millis() as u64;
        assert!((500..=550).contains(&d0));
        assert!((1_000..=1_100).contains(&d1));
        // 500 * 2^4 = 8000, already at cap.
        assert!((8_000..=8_800).contains(&d4));
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let cfg = RetryConfig::default();
        let d = cfg.delay_for_attempt(u32::MAX);
        assert!(d.as_millis() as u64 <= cfg.max_delay_ms + cfg.max_delay_ms / 10);
    }
}
