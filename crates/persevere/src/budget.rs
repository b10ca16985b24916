// Retry budget limiting the system-wide ratio of retries to initial calls
use std::sync::{Mutex, MutexGuard};

use crate::rate::MovingRate;
use crate::time::{Clock, SystemClock};

/// Admission-control budget shared by every retry loop talking to one
/// backend.
///
/// The budget tracks the rate of initial calls and the rate of retries
/// over a moving window (one minute by default). Limiting the fraction of
/// traffic that is retries keeps a struggling backend from being buried
/// under retry amplification. Declare one budget per backend and share it
/// across calls through an [`Arc`](std::sync::Arc):
///
/// ```
/// use std::sync::Arc;
/// use persevere::{Budget, RetryConfig};
///
/// let backend_budget = Arc::new(Budget::new(10.0, 0.1));
///
/// let config = RetryConfig::builder()
///     .budget(Arc::clone(&backend_budget))
///     .build()?;
/// # Ok::<(), persevere::RetryError>(())
/// ```
///
/// Two checks share the estimators but apply different policies:
///
/// - [`send_ok`](Budget::send_ok) is the client-side admission check. It
///   never refuses initial calls and compares the ratio of retried to
///   *initial* calls against the configured ratio.
/// - [`overload`](Budget::overload) is the server-side check. It counts
///   every incoming request and compares the retried fraction of *total*
///   calls against the configured ratio, because a server sees all
///   traffic whether or not client budgets admitted it.
///
/// Both run under one internal mutex; a check is a handful of arithmetic
/// operations, so the critical section stays short.
#[derive(Debug)]
pub struct Budget<C: Clock = SystemClock> {
    rate: f64,
    ratio: f64,
    state: Mutex<BudgetState>,
    clock: C,
}

#[derive(Debug)]
struct BudgetState {
    initial: MovingRate,
    retried: MovingRate,
}

impl Budget<SystemClock> {
    /// Create a budget ticking on the system clock.
    ///
    /// `rate` is the minimum rate of calls (per second) below which
    /// retries are never throttled. `ratio` is the maximum tolerated
    /// ratio of retries, in the `[0.0, 1.0]` range for typical use.
    pub fn new(rate: f64, ratio: f64) -> Self {
        Self::with_clock(rate, ratio, SystemClock)
    }
}

impl<C: Clock> Budget<C> {
    /// Create a budget with a custom clock source.
    pub fn with_clock(rate: f64, ratio: f64, clock: C) -> Self {
        Self {
            rate,
            ratio,
            state: Mutex::new(BudgetState {
                initial: MovingRate::new(),
                retried: MovingRate::new(),
            }),
            clock,
        }
    }

    /// Minimum calls-per-second rate below which retries pass freely.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Maximum tolerated ratio of retried calls.
    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    /// Client-side admission check: may this call be sent?
    ///
    /// Initial calls are always admitted and recorded. A retry is refused
    /// once the initial-call rate exceeds the configured rate *and* the
    /// ratio of retried to initial calls exceeds the configured ratio.
    /// Refused retries are not recorded, so an exhausted budget does not
    /// inflate its own retry rate and lock itself shut.
    pub fn send_ok(&self, is_retry: bool) -> bool {
        let mut state = self.lock_state();
        let now = self.clock.millis_since_epoch();

        if !is_retry {
            state.initial.add(now, 1);
            return true;
        }

        let initial_rate = state.initial.rate(now);
        let retried_rate = state.retried.rate(now);
        if initial_rate > self.rate && retried_rate / initial_rate > self.ratio {
            return false;
        }

        state.retried.add(now, 1);
        true
    }

    /// Server-side overload check: does the retried fraction of incoming
    /// traffic indicate overload?
    ///
    /// Every call is recorded, retry or not; the server needs ground
    /// truth about total load. Reports overload once the total call rate
    /// exceeds the configured rate *and* the retried fraction of total
    /// calls exceeds the configured ratio.
    pub fn overload(&self, is_retry: bool) -> bool {
        let mut state = self.lock_state();
        let now = self.clock.millis_since_epoch();

        if is_retry {
            state.retried.add(now, 1);
        } else {
            state.initial.add(now, 1);
        }

        let initial_rate = state.initial.rate(now);
        let retried_rate = state.retried.rate(now);
        let total_rate = initial_rate + retried_rate;

        total_rate > self.rate && retried_rate / total_rate > self.ratio
    }

    fn lock_state(&self) -> MutexGuard<'_, BudgetState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
