//! Exponential backoff policy for retryable step failures.

use rand::Rng;
use std::time::Duration;
use vigil_core::ControllerConfig;

/// Bounded exponential backoff with jitter.
///
/// Delay for attempt `n` (1-based) is `base * 2^(n-1)` capped at `cap`,
/// plus up to 10% jitter so concurrent retries do not align.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, max_attempts: u32) -> Self {
        Self {
            base,
            cap,
            max_attempts,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Self {
        Self::new(
            config.backoff_base,
            config.backoff_cap,
            config.max_step_retries,
        )
    }

    /// Maximum attempts per step, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Whether another attempt is allowed after `attempt` (1-based) failed.
    pub fn allows_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Delay to wait before the attempt after `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(20);
        let raw = self
            .base
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.cap);

        let jitter_ms = raw.as_millis() as u64 / 10;
        if jitter_ms == 0 {
            return raw;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_ms);
        raw + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_cap() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(30), 5);

        let d1 = policy.delay(1);
        assert!(d1 >= Duration::from_secs(1));
        assert!(d1 <= Duration::from_millis(1100));

        let d3 = policy.delay(3);
        assert!(d3 >= Duration::from_secs(4));

        // Far past the cap, delay stays bounded by cap + jitter.
        let d10 = policy.delay(10);
        assert!(d10 <= Duration::from_secs(33));
    }

    #[test]
    fn retry_budget() {
        let policy = BackoffPolicy::new(Duration::from_secs(1), Duration::from_secs(30), 5);
        assert!(policy.allows_retry(1));
        assert!(policy.allows_retry(4));
        assert!(!policy.allows_retry(5));
    }
}
