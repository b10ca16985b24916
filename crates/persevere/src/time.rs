//! Time abstraction for testability
//!
//! The budget's rate estimators consume wall-clock timestamps. Production
//! code uses [`SystemClock`]; tests drive a [`MockClock`] forward manually
//! so rate arithmetic can be checked without real delays.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Trait for time operations to enable testing
pub trait Clock: Send + Sync {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation
///
/// Uses the actual system clock for time operations. This is the default
/// clock for [`Budget`](crate::Budget).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Mock clock for deterministic testing
///
/// Allows tests to control time progression without actual delays. Clones
/// share the same elapsed time, so a test can keep one handle and hand
/// another to the component under test.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use persevere::{Clock, MockClock};
///
/// let clock = MockClock::new();
/// let start = clock.now();
///
/// clock.advance(Duration::from_secs(5));
///
/// let end = clock.now();
/// assert_eq!(end.duration_since(start), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
    base_system_time: SystemTime,
}

impl MockClock {
    /// Create a new mock clock
    ///
    /// The monotonic clock starts at the current instant; the wall clock
    /// starts at a fixed date, second-aligned, so timestamp arithmetic in
    /// tests is deterministic across runs. Both advance only when told
    /// to.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            base_system_time: UNIX_EPOCH + Duration::from_secs(1_700_000_000),
        }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed += duration;
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed = duration;
    }

    /// Get the current elapsed time
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        // Test utility: panic on poisoned mutex to fail tests early
        *self.elapsed.lock().expect("mutex poisoned")
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        // Test utility: panic on poisoned mutex to fail tests early
        self.start + *self.elapsed.lock().expect("mutex poisoned")
    }

    fn system_time(&self) -> SystemTime {
        // Test utility: panic on poisoned mutex to fail tests early
        self.base_system_time + *self.elapsed.lock().expect("mutex poisoned")
    }
}
