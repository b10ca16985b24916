// Jitter strategies for backoff delays
use std::time::Duration;

use rand::Rng;

/// Randomization applied to a backoff delay to spread out retries that
/// would otherwise arrive in lockstep.
///
/// The jittered delay is `ratio * random_between(0, delay) + (1 - ratio)
/// * delay`, where the ratio controls the weight of the random part.
/// [`Jitter::Full`] (ratio 1.0) draws from `[0, delay)` and is the
/// default; [`Jitter::Equal`] (ratio 0.5) draws from `[delay/2, delay)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Jitter {
    /// No randomization; the computed delay is used as-is.
    None,
    /// The whole delay is randomized: `[0, delay)`.
    Full,
    /// Half the delay is fixed, half randomized: `[delay/2, delay)`.
    Equal,
    /// Custom weight for the random part, in the `(0.0, 1.0]` range.
    Ratio(f64),
}

impl Default for Jitter {
    fn default() -> Self {
        Self::Full
    }
}

impl Jitter {
    /// Apply the jitter strategy to a computed delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ratio = match self {
            Self::None => return delay,
            Self::Full => 1.0,
            Self::Equal => 0.5,
            Self::Ratio(ratio) => *ratio,
        };

        // An empty sampling range panics, and no jitter can spread a zero
        // delay anyway.
        if delay.is_zero() {
            return delay;
        }

        let delay_ns = delay.as_nanos() as f64;
        let sampled = rand::thread_rng().gen_range(0.0..delay_ns);
        Duration::from_nanos((ratio * sampled + (1.0 - ratio) * delay_ns) as u64)
    }
}
