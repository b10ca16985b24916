// Error types and transient/permanent fault classification
use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Boxed error type carried by faults and terminal errors.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Capability trait for errors that know whether they are transient.
///
/// A condition either clears on its own (connection reset, timeout, lock
/// contention) or it does not (bad input, protocol violation). Errors that
/// carry this capability can be classified with [`Fault::classify`];
/// errors without it default to transient when converted via `?`.
pub trait Temporary {
    /// Report whether the condition is expected to clear on its own.
    fn is_temporary(&self) -> bool;
}

impl Temporary for std::io::Error {
    fn is_temporary(&self) -> bool {
        use std::io::ErrorKind;

        matches!(
            self.kind(),
            ErrorKind::Interrupted
                | ErrorKind::TimedOut
                | ErrorKind::WouldBlock
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::ConnectionRefused
                | ErrorKind::BrokenPipe
                | ErrorKind::NotConnected
        )
    }
}

/// An operation failure, classified as transient or permanent.
///
/// The retry engine keeps attempting after a [`Fault::Transient`] and
/// stops immediately on a [`Fault::Permanent`], surfacing the original
/// source error to the caller.
///
/// `Fault` intentionally does not implement [`std::error::Error`]: the
/// blanket `From` conversion turns any error into a transient fault, so
/// operations can use `?` freely and only spell out the permanent cases:
///
/// ```
/// use persevere::{abort, Fault};
///
/// fn parse(input: &str) -> Result<u32, Fault> {
///     if input.is_empty() {
///         // Never retried: the input will not improve on its own.
///         return Err(abort(std::io::Error::other("empty input")));
///     }
///     // A parse error converts into a transient fault via `?`.
///     Ok(input.trim().parse::<u32>()?)
/// }
///
/// assert!(parse("42").is_ok());
/// assert!(parse("").unwrap_err().is_permanent());
/// assert!(parse("x").unwrap_err().is_transient());
/// ```
#[derive(Debug)]
pub enum Fault {
    /// A failure expected to clear on its own; the engine retries.
    Transient {
        /// The underlying error.
        source: BoxError,
    },
    /// A failure that will not improve; the engine stops immediately.
    Permanent {
        /// The underlying error.
        source: BoxError,
    },
}

impl Fault {
    /// Wrap an error as a transient fault.
    pub fn transient<E: Into<BoxError>>(source: E) -> Self {
        Self::Transient { source: source.into() }
    }

    /// Wrap an error as a permanent fault.
    pub fn permanent<E: Into<BoxError>>(source: E) -> Self {
        Self::Permanent { source: source.into() }
    }

    /// Classify an error through its [`Temporary`] capability.
    pub fn classify<E>(source: E) -> Self
    where
        E: Temporary + std::error::Error + Send + Sync + 'static,
    {
        if source.is_temporary() {
            Self::transient(source)
        } else {
            Self::permanent(source)
        }
    }

    /// Whether the engine may retry after this fault.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Whether the engine must stop on this fault.
    pub fn is_permanent(&self) -> bool {
        matches!(self, Self::Permanent { .. })
    }

    /// Unwrap the fault back to the underlying error.
    pub fn into_source(self) -> BoxError {
        match self {
            Self::Transient { source } | Self::Permanent { source } => source,
        }
    }
}

// Displays as the underlying error so wrapping stays invisible to callers
// that only ever see the unwrapped source.
impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient { source } | Self::Permanent { source } => source.fmt(f),
        }
    }
}

// Any plain error is retryable by default; permanence must be explicit.
impl<E> From<E> for Fault
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(source: E) -> Self {
        Self::transient(source)
    }
}

/// Wrap an error so the engine treats it as permanent regardless of the
/// error's own classification.
///
/// The engine surfaces the wrapped error itself, not the wrapper, so
/// callers match on their original error type.
pub fn abort<E: Into<BoxError>>(source: E) -> Fault {
    Fault::permanent(source)
}

/// Error reported for an attempt that exceeded the per-attempt timeout.
///
/// Timeouts are transient: the engine keeps retrying until another limit
/// applies.
#[derive(Debug, Error)]
#[error("attempt timed out after {limit:?}")]
pub struct AttemptTimedOut {
    /// The configured per-attempt timeout that elapsed.
    pub limit: Duration,
}

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError {
    /// All attempts were used without a success.
    #[error("all {attempts} attempts failed: {source}")]
    AttemptsExhausted {
        /// Number of times the operation was invoked.
        attempts: u32,
        /// The most recent attempt's error.
        #[source]
        source: BoxError,
    },

    /// An attempt failed with an error marked permanent.
    #[error("operation failed: {source}")]
    Permanent {
        /// The original error, unwrapped from its classification.
        #[source]
        source: BoxError,
    },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The shared budget refused the retry; the attempt was never run.
    #[error("retry budget exhausted")]
    BudgetExhausted,

    /// The retry configuration failed validation.
    #[error("invalid retry configuration: {message}")]
    InvalidConfiguration {
        /// Human-readable description of the rejected setting.
        message: String,
    },
}

impl RetryError {
    /// Consume the error and return the underlying operation error, if
    /// this terminal state carries one.
    pub fn into_source(self) -> Option<BoxError> {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::Permanent { source } => Some(source),
            Self::Cancelled | Self::BudgetExhausted | Self::InvalidConfiguration { .. } => None,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T> = Result<T, RetryError>;
