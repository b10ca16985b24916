// Defaults shared by the retry configuration and the budget estimators
use std::time::Duration;

/// Default number of attempts (initial call plus retries)
pub const DEFAULT_ATTEMPTS: u32 = 4;

/// Default base delay for exponential backoff
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(100);

/// Default maximum delay cap
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(2);

/// Default multiplicative backoff factor
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Length of one rate-estimator bucket
pub const DEFAULT_BUCKET_LENGTH: Duration = Duration::from_secs(1);

/// Number of complete buckets in the estimator window
pub const DEFAULT_BUCKET_COUNT: usize = 60;
