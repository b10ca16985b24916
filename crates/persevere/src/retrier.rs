// Retry execution engine
use std::future::Future;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::RetryConfig;
use crate::error::{AttemptTimedOut, Fault, RetryError, RetryResult};

/// Handle to one execution of the operation, passed into the operation
/// closure.
///
/// Carries the zero-based attempt index so the operation can detect it is
/// being retried (for example to tag outgoing requests), and a derived
/// cancellation token that fires when the caller cancels or the
/// per-attempt timeout elapses.
#[derive(Debug, Clone)]
pub struct Attempt {
    index: u32,
    cancellation: CancellationToken,
}

impl Attempt {
    /// Zero-based index of this attempt; 0 on the first try.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Whether this attempt is a retry of an earlier failure.
    pub fn is_retry(&self) -> bool {
        self.index > 0
    }

    /// Token cancelled when the caller cancels or the per-attempt timeout
    /// fires.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Wait until this attempt is cancelled.
    pub async fn cancelled(&self) {
        self.cancellation.cancelled().await;
    }
}

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// The terminal result of the execution.
    pub result: RetryResult<T>,
    /// Number of times the operation was invoked.
    pub attempts: u32,
    /// Accumulated backoff delay across attempts.
    pub total_delay: Duration,
    /// Wall-clock time from the first attempt to completion.
    pub elapsed: Duration,
}

impl<T> RetryOutcome<T> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> RetryResult<T> {
        self.result
    }

    /// Average delay between attempts (excludes operation execution time).
    pub fn average_delay(&self) -> Duration {
        if self.attempts <= 1 {
            return Duration::ZERO;
        }
        self.total_delay / (self.attempts - 1)
    }
}

/// The retry execution engine.
///
/// Invokes an operation until it succeeds, fails permanently, runs out of
/// attempts, is refused by the shared budget, or the caller cancels. Each
/// attempt runs as its own task so the engine can reclaim control without
/// waiting for a stuck operation; see [`Retrier::run`] for the abandonment
/// contract.
#[derive(Debug, Clone)]
pub struct Retrier {
    config: RetryConfig,
}

impl Retrier {
    /// Create an engine with the given configuration.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create an engine with the default configuration.
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// The engine's configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Repeatedly invoke `operation` until it succeeds or a terminal
    /// condition applies.
    ///
    /// The operation receives an [`Attempt`] carrying the zero-based
    /// attempt index and a derived cancellation token. Errors convert into
    /// [`Fault`]s; plain errors returned via `?` are transient, and
    /// [`abort`](crate::abort) marks an error permanent so the engine
    /// stops and surfaces the original error.
    ///
    /// Cancellation is cooperative. When `cancel` fires while an attempt
    /// is in flight, the engine returns [`RetryError::Cancelled`]
    /// immediately and the attempt task is abandoned, not killed. It keeps
    /// running detached until it observes its own token, so operations
    /// must be safe to abandon mid-flight.
    #[instrument(skip(self, cancel, operation), fields(attempts = self.config.attempts))]
    pub async fn run<F, Fut, T>(&self, cancel: &CancellationToken, operation: F) -> RetryResult<T>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, Fault>> + Send + 'static,
        T: Send + 'static,
    {
        self.run_with_outcome(cancel, operation).await.into_result()
    }

    /// Like [`Retrier::run`], additionally reporting attempt and delay
    /// statistics.
    pub async fn run_with_outcome<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> RetryOutcome<T>
    where
        F: FnMut(Attempt) -> Fut,
        Fut: Future<Output = Result<T, Fault>> + Send + 'static,
        T: Send + 'static,
    {
        let start = Instant::now();
        let mut total_delay = Duration::ZERO;
        let mut attempts = 0;

        let mut i: u32 = 0;
        loop {
            if let Some(budget) = &self.config.budget {
                if !budget.send_ok(i > 0) {
                    warn!(attempt = i, "retry budget exhausted, giving up");
                    return finish(Err(RetryError::BudgetExhausted), attempts, total_delay, start);
                }
            }

            attempts = i + 1;
            debug!(attempt = i, "executing operation");

            let token = cancel.child_token();
            let attempt = Attempt { index: i, cancellation: token.clone() };
            let future = operation(attempt);
            let limit = self.config.attempt_timeout;

            let mut handle = tokio::spawn(async move {
                match limit {
                    Some(limit) => match tokio::time::timeout(limit, future).await {
                        Ok(result) => result,
                        Err(_) => {
                            token.cancel();
                            Err(Fault::transient(AttemptTimedOut { limit }))
                        }
                    },
                    None => future.await,
                }
            });

            let joined = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempt = i, "cancelled with attempt in flight, abandoning task");
                    return finish(Err(RetryError::Cancelled), attempts, total_delay, start);
                }
                joined = &mut handle => joined,
            };

            // A panicked operation is contained by the task boundary and
            // never retried.
            let result = match joined {
                Ok(result) => result,
                Err(join_error) => {
                    warn!(attempt = i, "operation task failed to complete");
                    Err(Fault::permanent(join_error))
                }
            };

            let fault = match result {
                Ok(value) => {
                    if i > 0 {
                        debug!(attempt = i, "operation succeeded after {i} retries");
                    }
                    return finish(Ok(value), attempts, total_delay, start);
                }
                Err(fault) => fault,
            };

            if fault.is_permanent() {
                let source = fault.into_source();
                debug!(attempt = i, error = %source, "permanent failure, not retrying");
                return finish(Err(RetryError::Permanent { source }), attempts, total_delay, start);
            }

            let source = fault.into_source();
            if self.config.attempts != 0 && i + 1 >= self.config.attempts {
                warn!(attempts = i + 1, error = %source, "all attempts failed");
                return finish(
                    Err(RetryError::AttemptsExhausted { attempts: i + 1, source }),
                    attempts,
                    total_delay,
                    start,
                );
            }

            let delay = self.config.jitter.apply(self.config.backoff.delay(i));
            debug!(attempt = i, ?delay, error = %source, "attempt failed, backing off");

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(attempt = i, "cancelled while backing off");
                    return finish(Err(RetryError::Cancelled), attempts, total_delay, start);
                }
                () = tokio::time::sleep(delay) => {}
            }
            total_delay += delay;

            i += 1;
        }
    }
}

fn finish<T>(
    result: RetryResult<T>,
    attempts: u32,
    total_delay: Duration,
    start: Instant,
) -> RetryOutcome<T> {
    RetryOutcome { result, attempts, total_delay, elapsed: start.elapsed() }
}

/// Retry `operation` with the default configuration.
pub async fn retry<F, Fut, T>(cancel: &CancellationToken, operation: F) -> RetryResult<T>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, Fault>> + Send + 'static,
    T: Send + 'static,
{
    Retrier::with_defaults().run(cancel, operation).await
}

/// Retry `operation` with an explicit configuration.
pub async fn retry_with_config<F, Fut, T>(
    cancel: &CancellationToken,
    config: RetryConfig,
    operation: F,
) -> RetryResult<T>
where
    F: FnMut(Attempt) -> Fut,
    Fut: Future<Output = Result<T, Fault>> + Send + 'static,
    T: Send + 'static,
{
    Retrier::new(config).run(cancel, operation).await
}
