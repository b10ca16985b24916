// Moving-window rate estimator backing the retry budget
use crate::constants::{DEFAULT_BUCKET_COUNT, DEFAULT_BUCKET_LENGTH};

/// Events-per-second estimator over a sliding window of fixed-length
/// buckets.
///
/// The ring holds `bucket_count + 1` buckets. The newest bucket fills as
/// time passes and the oldest is weighted down by the same fraction, so
/// the effective window length stays constant while both edges move.
/// Before the ring fills, the divisor is the actually elapsed time, which
/// keeps early estimates honest instead of diluting them over the whole
/// window.
///
/// Timestamps are milliseconds since the Unix epoch. Updates must arrive
/// in order; anything older than the newest update is dropped.
#[derive(Debug)]
pub(crate) struct MovingRate {
    bucket_len_ms: u64,
    bucket_count: usize,
    counts: Vec<u64>,
    last_update_ms: Option<u64>,
}

impl MovingRate {
    pub(crate) fn new() -> Self {
        Self {
            bucket_len_ms: DEFAULT_BUCKET_LENGTH.as_millis() as u64,
            bucket_count: DEFAULT_BUCKET_COUNT,
            counts: Vec::new(),
            last_update_ms: None,
        }
    }

    /// Record `n` events at `at_ms`. Events older than the newest update
    /// are dropped so the window never moves backwards.
    pub(crate) fn add(&mut self, at_ms: u64, n: u64) {
        if self.last_update_ms.is_some_and(|last| at_ms < last) {
            return;
        }

        self.forward(at_ms);
        if let Some(newest) = self.counts.last_mut() {
            *newest += n;
        }
    }

    /// Estimated rate in events per second as of `at_ms`.
    ///
    /// Returns `NaN` for timestamps older than the newest update. With no
    /// events recorded the rate is 0.0 even before any time has elapsed.
    pub(crate) fn rate(&mut self, at_ms: u64) -> f64 {
        if self.last_update_ms.is_some_and(|last| at_ms < last) {
            return f64::NAN;
        }

        self.forward(at_ms);

        let count = self.count();
        if count == 0.0 {
            return 0.0;
        }
        count / self.window_secs()
    }

    fn round_down(&self, at_ms: u64) -> u64 {
        (at_ms / self.bucket_len_ms) * self.bucket_len_ms
    }

    /// Advance the ring so the newest bucket covers `at_ms`.
    fn forward(&mut self, at_ms: u64) {
        let Some(last) = self.last_update_ms else {
            self.counts = vec![0];
            self.last_update_ms = Some(at_ms);
            return;
        };
        self.last_update_ms = Some(at_ms);

        let rounded = self.round_down(at_ms);
        if rounded <= last {
            return;
        }

        // rounded > last guarantees at least one whole bucket boundary
        // was crossed.
        let crossed = (rounded - self.round_down(last)) / self.bucket_len_ms;
        self.shift(crossed);
    }

    fn shift(&mut self, n: u64) {
        // Anything older than the full ring is gone regardless of how
        // large the gap was, so cap the allocation.
        let n = n.min(self.bucket_count as u64 + 1) as usize;
        self.counts.resize(self.counts.len() + n, 0);

        // The ring keeps bucket_count + 1 entries; the oldest and newest
        // are evaluated partially so the window length stays constant.
        let excess = self.counts.len().saturating_sub(self.bucket_count + 1);
        if excess > 0 {
            self.counts.drain(..excess);
        }
    }

    fn count(&self) -> f64 {
        // History does not span the full window yet.
        if self.counts.len() <= self.bucket_count {
            return self.counts.iter().map(|&c| c as f64).sum();
        }

        let last = self.last_update_ms.unwrap_or(0);
        let oldest_fraction =
            1.0 - (last - self.round_down(last)) as f64 / self.bucket_len_ms as f64;

        let mut sum = oldest_fraction * self.counts[0] as f64;
        for &c in &self.counts[1..] {
            sum += c as f64;
        }
        sum
    }

    fn window_secs(&self) -> f64 {
        if self.counts.is_empty() {
            return 0.0;
        }

        // History does not span the full window yet.
        if self.counts.len() <= self.bucket_count {
            let last = self.last_update_ms.unwrap_or(0);
            let elapsed_ms =
                (self.counts.len() as u64 - 1) * self.bucket_len_ms + (last - self.round_down(last));
            return elapsed_ms as f64 / 1000.0;
        }

        (self.bucket_count as u64 * self.bucket_len_ms) as f64 / 1000.0
    }
}
