// =============================================================================
// Retry Policy
// =============================================================================
//
// Exponential backoff as an explicit value the scheduler consumes, so the
// retry schedule is visible in one place and deterministic under a paused
// test clock. The delay for retry `k` (0-based) is
// `base_delay * multiplier^k`, capped at `max_delay`. No jitter: the
// per-symbol schedule stays reproducible.
// =============================================================================

use std::time::Duration;

use crate::config::MonitorConfig;

/// Backoff schedule for transient fetch failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt. Total attempts = `max_retries + 1`.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Multiplicative factor for each subsequent retry.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            multiplier: config.retry_multiplier,
            max_delay: Duration::from_secs(config.retry_max_delay_secs),
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total fetch attempts this policy allows per symbol per cycle.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let scaled = self.base_delay.as_secs_f64() * self.multiplier.powi(retry as i32);
        Duration::from_secs_f64(scaled.min(self.max_delay.as_secs_f64()))
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_exponentially_until_the_cap() {
        let policy = RetryPolicy {
            max_retries: 6,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        };

        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        // 32s would exceed the 30s cap.
        assert_eq!(policy.delay_for(5), Duration::from_secs(30));
        assert_eq!(policy.delay_for(6), Duration::from_secs(30));
    }

    #[test]
    fn attempts_count_the_initial_call() {
        assert_eq!(RetryPolicy::default().max_attempts(), 4);
        assert_eq!(RetryPolicy::none().max_attempts(), 1);
    }

    #[test]
    fn from_config_maps_the_retry_fields() {
        let mut config = MonitorConfig::default();
        config.max_retries = 2;
        config.retry_base_delay_ms = 250;
        config.retry_multiplier = 3.0;
        config.retry_max_delay_secs = 5;

        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(1), Duration::from_millis(750));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2250));
        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }
}
