// Exponential backoff schedule
use std::time::Duration;

use crate::constants::{DEFAULT_BACKOFF_FACTOR, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};

/// Exponential backoff parameters.
///
/// The delay before retry `n` (zero-based) is `base * factor^n`, clamped
/// to the `base..=max` range. With the defaults (100ms base, factor 2.0,
/// 2s cap) the schedule is 100ms, 200ms, 400ms, 800ms, 1.6s, 2s, 2s, ...
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpBackoff {
    /// Delay before the first retry.
    pub base: Duration,
    /// Upper bound for every delay.
    pub max: Duration,
    /// Multiplier applied for each further retry.
    pub factor: f64,
}

impl Default for ExpBackoff {
    fn default() -> Self {
        Self {
            base: DEFAULT_BASE_DELAY,
            max: DEFAULT_MAX_DELAY,
            factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl ExpBackoff {
    /// Create a schedule with explicit parameters.
    pub fn new(base: Duration, factor: f64, max: Duration) -> Self {
        Self { base, max, factor }
    }

    /// Delay before the retry that follows the failed attempt `attempt`
    /// (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        // Nanosecond arithmetic so sub-millisecond bases keep their
        // resolution and the clamp holds.
        let scaled = self.base.as_nanos() as f64 * self.factor.powi(attempt as i32);
        if !scaled.is_finite() {
            return self.max;
        }

        let clamped = scaled.min(self.max.as_nanos() as f64).max(self.base.as_nanos() as f64);
        Duration::from_nanos(clamped as u64)
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the backoff schedule.
    use super::*;

    /// Validates `ExpBackoff::delay` behavior for the default parameters
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the first delays double from the base.
    /// - Confirms the cap bounds every later delay.
    #[test]
    fn test_default_schedule_doubles_until_cap() {
        let backoff = ExpBackoff::default();

        assert_eq!(backoff.delay(0), Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
        assert_eq!(backoff.delay(4), Duration::from_millis(1600));
        assert_eq!(backoff.delay(5), Duration::from_secs(2));
        assert_eq!(backoff.delay(6), Duration::from_secs(2));
        assert_eq!(backoff.delay(31), Duration::from_secs(2));
    }

    /// Validates `ExpBackoff::delay` behavior for custom parameters.
    ///
    /// Assertions:
    /// - Ensures a factor below one never drops the delay under the base.
    /// - Ensures overflow-sized exponents saturate at the cap.
    #[test]
    fn test_delay_stays_within_bounds() {
        let shrinking = ExpBackoff::new(Duration::from_millis(50), 0.5, Duration::from_secs(1));
        assert_eq!(shrinking.delay(0), Duration::from_millis(50));
        assert_eq!(shrinking.delay(3), Duration::from_millis(50));

        let explosive = ExpBackoff::new(Duration::from_millis(100), 10.0, Duration::from_secs(5));
        assert_eq!(explosive.delay(1000), Duration::from_secs(5));
    }

    /// Validates `ExpBackoff::delay` resolution for sub-millisecond
    /// bases.
    ///
    /// Assertions:
    /// - Confirms the first delay equals the base instead of truncating
    ///   to zero.
    /// - Confirms later delays scale from the base and stay clamped to
    ///   `[base, max]`.
    #[test]
    fn test_submillisecond_base_keeps_resolution() {
        let backoff = ExpBackoff::new(Duration::from_micros(500), 2.0, Duration::from_millis(4));

        assert_eq!(backoff.delay(0), Duration::from_micros(500));
        assert_eq!(backoff.delay(1), Duration::from_millis(1));
        assert_eq!(backoff.delay(2), Duration::from_millis(2));
        assert_eq!(backoff.delay(10), Duration::from_millis(4));
        assert!(backoff.delay(0) >= backoff.base, "delay fell below the base bound");
    }
}
