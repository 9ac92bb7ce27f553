//! Clock
//!
//! Monotonic time source and the backoff arithmetic built on it.

use parking_lot::Mutex;
use rand::Rng;
use std::time::{Duration, Instant};

/// Monotonic clock interface (for dependency injection).
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;
}

/// Clock backed by [`Instant::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for testing.
#[derive(Debug)]
pub struct MockClock {
    now: Mutex<Instant>,
}

impl MockClock {
    /// Create a clock frozen at the current instant.
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

/// Exponential backoff delay for retry number `attempt` (0-based).
///
/// `min(base * 2^attempt + jitter, max)`. `jitter` must lie in
/// `[0, base)`, which keeps successive delays non-decreasing.
pub fn backoff_delay(attempt: u32, base: Duration, max: Duration, jitter: Duration) -> Duration {
    let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
    base.checked_mul(factor)
        .and_then(|d| d.checked_add(jitter))
        .map_or(max, |d| d.min(max))
}

/// Uniform jitter in `[0, base)`.
pub fn random_jitter(base: Duration) -> Duration {
    let millis = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    if millis == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock_advances() {
        let clock = MockClock::new();
        let start = clock.now();
        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.now() - start, Duration::from_secs(90));
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let base = Duration::from_millis(250);
        let max = Duration::from_secs(2);

        assert_eq!(backoff_delay(0, base, max, Duration::ZERO), Duration::from_millis(250));
        assert_eq!(backoff_delay(1, base, max, Duration::ZERO), Duration::from_millis(500));
        assert_eq!(backoff_delay(2, base, max, Duration::from_millis(10)), Duration::from_millis(1010));
        assert_eq!(backoff_delay(5, base, max, Duration::ZERO), max);
        assert_eq!(backoff_delay(40, base, max, Duration::ZERO), max);
    }

    #[test]
    fn test_jittered_delays_never_decrease() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(1);

        for _ in 0..50 {
            let mut previous = Duration::ZERO;
            for attempt in 0..8 {
                let delay = backoff_delay(attempt, base, max, random_jitter(base));
                assert!(delay >= previous);
                assert!(delay <= max);
                previous = delay;
            }
        }
    }

    #[test]
    fn test_zero_base_has_no_jitter() {
        assert_eq!(random_jitter(Duration::ZERO), Duration::ZERO);
    }
}
