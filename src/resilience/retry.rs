//! Retry Policy
//!
//! Exponential backoff with jitter, expressed as a budget consumed by one
//! logical call.

use std::time::Duration;

use crate::core::{backoff_delay, random_jitter};

/// Retry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retries after the first attempt.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        DEFAULT_RETRY_CONFIG
    }
}

/// Default retry configuration.
pub const DEFAULT_RETRY_CONFIG: RetryConfig = RetryConfig {
    max_attempts: 3,
    base_delay: Duration::from_millis(250),
    max_delay: Duration::from_secs(8),
};

impl RetryConfig {
    /// Start a fresh budget for one logical call.
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            attempt: 0,
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            last_delay: Duration::ZERO,
        }
    }
}

/// Retries left for one logical call.
///
/// Only moves forward; dropped when the call finishes.
#[derive(Debug, Clone)]
pub struct RetryBudget {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    /// Floor for the next delay; waits never shrink within one call.
    last_delay: Duration,
}

impl RetryBudget {
    /// Retries consumed so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn remaining(&self) -> u32 {
        self.max_attempts.saturating_sub(self.attempt)
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Consume one retry and return how long to wait before it.
    ///
    /// A server-supplied `retry_after` can lengthen the wait but never past
    /// `max_delay`, and no wait is shorter than the one before it. Returns
    /// `None` once the budget is spent.
    pub fn next_delay(&mut self, retry_after: Option<Duration>) -> Option<Duration> {
        if self.is_exhausted() {
            return None;
        }

        let computed = backoff_delay(
            self.attempt,
            self.base_delay,
            self.max_delay,
            random_jitter(self.base_delay),
        );
        self.attempt += 1;

        let delay = computed
            .max(retry_after.unwrap_or(Duration::ZERO))
            .max(self.last_delay)
            .min(self.max_delay);
        self.last_delay = delay;
        Some(delay)
    }
}

/// Cumulative retry statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryStats {
    /// Logical calls started.
    pub calls: u64,
    /// Attempts sent, including retries.
    pub total_attempts: u64,
    /// Backoff retries taken.
    pub retries: u64,
    /// Token re-acquisitions triggered by a 401.
    pub reauthentications: u64,
    /// Calls that ran out of budget.
    pub exhausted: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_config_default() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.base_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(8));
    }

    #[test]
    fn test_budget_is_bounded_and_non_decreasing() {
        let config = RetryConfig {
            max_attempts: 6,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1500),
        };
        let mut budget = config.budget();

        let mut delays = Vec::new();
        while let Some(delay) = budget.next_delay(None) {
            delays.push(delay);
        }

        assert_eq!(delays.len(), 6);
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= config.max_delay));
        assert!(budget.is_exhausted());
        assert_eq!(budget.next_delay(None), None);
    }

    #[test]
    fn test_retry_after_is_capped() {
        let mut budget = RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(2),
        }
        .budget();

        assert_eq!(budget.next_delay(Some(Duration::from_secs(1))), Some(Duration::from_secs(1)));
        assert_eq!(budget.next_delay(Some(Duration::from_secs(30))), Some(Duration::from_secs(2)));
        assert_eq!(budget.attempt(), 2);
    }

    #[test]
    fn test_retry_after_raises_later_delays_too() {
        let mut budget = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(8),
        }
        .budget();

        assert_eq!(budget.next_delay(Some(Duration::from_secs(5))), Some(Duration::from_secs(5)));
        assert_eq!(budget.next_delay(None), Some(Duration::from_secs(5)));
        let last = budget.next_delay(None).unwrap();
        assert!(last >= Duration::from_secs(5) && last <= Duration::from_secs(8));
    }

    #[test]
    fn test_zero_budget() {
        let mut budget = RetryConfig {
            max_attempts: 0,
            ..RetryConfig::default()
        }
        .budget();
        assert_eq!(budget.next_delay(None), None);
    }
}
