// Server-side overload gate backed by the retry budget
use std::sync::Arc;

use persevere::{Budget, Clock, SystemClock};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use tracing::debug;

use crate::classify::temporary_status;
use crate::client::RETRY_ATTEMPT;

/// Server-side observer that upgrades temporary failures to an explicit
/// overload signal when the retry budget is exhausted.
///
/// A high ratio of retries among incoming requests indicates the cluster
/// as a whole is overloaded; answering those requests with a temporary
/// status would invite yet more retries. The gate is not a rate limiter —
/// it never declines a request itself. It only rewrites a response the
/// backend already failed: the status is upgraded to 429 Too Many
/// Requests when it was temporary, and the `Retry-After` hint is
/// stripped.
///
/// Requests are counted through the shared [`Budget`] whether or not they
/// are retries; the server needs ground truth about total load. A request
/// counts as a retry when it carries a non-empty [`RETRY_ATTEMPT`]
/// header, as set by [`RetryingClient`](crate::client::RetryingClient).
#[derive(Debug, Clone)]
pub struct OverloadGate<C: Clock = SystemClock> {
    budget: Arc<Budget<C>>,
}

impl<C: Clock> OverloadGate<C> {
    /// Create a gate over a shared budget.
    pub fn new(budget: Arc<Budget<C>>) -> Self {
        Self { budget }
    }

    /// Whether the request headers mark a retry.
    pub fn is_retry(headers: &HeaderMap) -> bool {
        headers.get(RETRY_ATTEMPT).is_some_and(|value| !value.is_empty())
    }

    /// Record the incoming request and report whether the system is in
    /// overload.
    ///
    /// Call once per request, before handling it; when this returns true,
    /// pass the eventual response through [`OverloadGate::rewrite`].
    pub fn observe(&self, headers: &HeaderMap) -> bool {
        let is_retry = Self::is_retry(headers);
        let overloaded = self.budget.overload(is_retry);
        if overloaded {
            debug!(is_retry, "retry budget exhausted, signalling overload");
        }
        overloaded
    }

    /// Rewrite a response produced while in overload.
    ///
    /// Strips the `Retry-After` hint and returns 429 in place of a
    /// temporary failure status; permanent statuses pass through.
    pub fn rewrite(status: StatusCode, headers: &mut HeaderMap) -> StatusCode {
        headers.remove(RETRY_AFTER);
        if temporary_status(status) {
            return StatusCode::TOO_MANY_REQUESTS;
        }
        status
    }
}
