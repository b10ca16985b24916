//! Retry primitives with admission-controlled budgets.
//!
//! The crate wraps fallible async operations in a retry loop with
//! exponential backoff, jitter, per-attempt timeouts, and cooperative
//! cancellation. A shared [`Budget`] additionally limits the system-wide
//! fraction of calls that are retries, protecting backends from
//! retry-amplified overload.
//!
//! # Quick start
//!
//! ```
//! use persevere::{retry, Fault};
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio_test::block_on(async {
//! let cancel = CancellationToken::new();
//!
//! let value = retry(&cancel, |attempt| async move {
//!     if attempt.index() < 1 {
//!         return Err(Fault::transient(std::io::Error::other("flaky")));
//!     }
//!     Ok::<_, Fault>("ok")
//! })
//! .await
//! .expect("recovers on the second attempt");
//!
//! assert_eq!(value, "ok");
//! # });
//! ```
//!
//! Errors returned through `?` are transient by default; wrap an error
//! with [`abort`] to stop retrying immediately. Configure the loop with
//! [`RetryConfig::builder`] and share a [`Budget`] across every retry
//! loop that talks to one backend.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod backoff;
pub mod budget;
pub mod config;
pub mod constants;
pub mod error;
pub mod jitter;
mod rate;
pub mod retrier;
pub mod time;

// Re-export commonly used types and traits for convenience
// ------------------------
pub use backoff::ExpBackoff;
pub use budget::Budget;
pub use config::{RetryConfig, RetryConfigBuilder};
pub use error::{abort, AttemptTimedOut, BoxError, Fault, RetryError, RetryResult, Temporary};
pub use jitter::Jitter;
pub use retrier::{retry, retry_with_config, Attempt, Retrier, RetryOutcome};
pub use time::{Clock, MockClock, SystemClock};
