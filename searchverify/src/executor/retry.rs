//! Bounded exponential backoff for transient request failures.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Jitter applied on top of the exponential delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JitterStrategy {
    /// Exact delays.
    #[default]
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    Equal,
}

/// Configuration for transient-failure retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum attempts per request (including the first).
    pub max_attempts: usize,
    /// Delay before the first retry in milliseconds; doubles per retry.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    pub max_delay_ms: u64,
    /// Jitter strategy.
    pub jitter_strategy: JitterStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter_strategy: JitterStrategy::None,
        }
    }
}

impl RetryConfig {
    /// Creates a new retry config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub const fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub const fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub const fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter_strategy = strategy;
        self
    }
}

/// Retry bookkeeping for one request.
#[derive(Debug, Default)]
pub struct RetryState {
    /// Failed attempts so far.
    pub attempt: usize,
}

/// Outcome of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// No more retries, give up.
    GiveUp,
}

impl RetryState {
    /// Creates a new retry state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failed attempt and decides whether to try again.
    pub fn record_failure(&mut self, config: &RetryConfig) -> RetryDecision {
        self.attempt += 1;
        if self.attempt >= config.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.delay(config))
    }

    /// Delay before the next attempt: `base * 2^(attempt - 1)`, capped.
    #[must_use]
    pub fn delay(&self, config: &RetryConfig) -> Duration {
        let exponent = u32::try_from(self.attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        let delay = config
            .base_delay_ms
            .saturating_mul(2u64.saturating_pow(exponent))
            .min(config.max_delay_ms);

        let jittered = match config.jitter_strategy {
            JitterStrategy::None => delay,
            JitterStrategy::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            JitterStrategy::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    half + rand::thread_rng().gen_range(0..=half)
                }
            }
        };

        Duration::from_millis(jittered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_builder() {
        let config = RetryConfig::new()
            .with_max_attempts(5)
            .with_base_delay_ms(200)
            .with_max_delay_ms(1_000)
            .with_jitter(JitterStrategy::Full);

        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.base_delay_ms, 200);
        assert_eq!(config.jitter_strategy, JitterStrategy::Full);
    }

    #[test]
    fn test_delays_double_from_base() {
        let config = RetryConfig::new().with_base_delay_ms(100).with_max_attempts(4);
        let mut state = RetryState::new();

        assert_eq!(state.record_failure(&config), RetryDecision::Retry(Duration::from_millis(100)));
        assert_eq!(state.record_failure(&config), RetryDecision::Retry(Duration::from_millis(200)));
        assert_eq!(state.record_failure(&config), RetryDecision::Retry(Duration::from_millis(400)));
        assert_eq!(state.record_failure(&config), RetryDecision::GiveUp);
    }

    #[test]
    fn test_three_attempts_means_two_retries() {
        let config = RetryConfig::default();
        let mut state = RetryState::new();

        assert!(matches!(state.record_failure(&config), RetryDecision::Retry(_)));
        assert!(matches!(state.record_failure(&config), RetryDecision::Retry(_)));
        assert_eq!(state.record_failure(&config), RetryDecision::GiveUp);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig::new().with_base_delay_ms(1_000).with_max_delay_ms(1_500);
        let state = RetryState { attempt: 10 };
        assert_eq!(state.delay(&config), Duration::from_millis(1_500));
    }

    #[test]
    fn test_full_jitter_stays_in_range() {
        let config = RetryConfig::new()
            .with_base_delay_ms(100)
            .with_jitter(JitterStrategy::Full);
        let state = RetryState { attempt: 1 };

        for _ in 0..50 {
            assert!(state.delay(&config) <= Duration::from_millis(100));
        }
    }
}
