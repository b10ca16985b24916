// HTTP status and transport-error classification
use persevere::Fault;
use reqwest::header::RETRY_AFTER;
use reqwest::{Response, StatusCode};
use thiserror::Error;

/// Error carrying a response status that was classified as retryable.
#[derive(Debug, Error)]
#[error("HTTP status {status}")]
pub struct StatusError {
    /// The status code the server answered with.
    pub status: StatusCode,
}

/// Whether a status code signals a temporary condition worth retrying.
///
/// 5xx responses are temporary with the exception of 501 Not Implemented,
/// which no amount of retrying will fix. 423 Locked is the one 4xx code
/// treated as temporary, since locks are expected to clear.
pub fn temporary_status(status: StatusCode) -> bool {
    (status.is_server_error() && status != StatusCode::NOT_IMPLEMENTED)
        || status == StatusCode::LOCKED
}

/// Whether a status code signals a permanent, client-side problem.
pub fn permanent_status(status: StatusCode) -> bool {
    (status.is_client_error() && status != StatusCode::LOCKED)
        || status == StatusCode::NOT_IMPLEMENTED
}

/// Classify a transport-level error from the HTTP client.
///
/// Timeouts, connection failures, and errors raised while sending the
/// request clear on their own and are transient. Everything else
/// (redirect loops, body decoding) is permanent.
pub fn classify_transport_error(err: reqwest::Error) -> Fault {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        Fault::transient(err)
    } else {
        Fault::permanent(err)
    }
}

/// Inspect a response for retryable conditions.
///
/// Temporary statuses become transient faults so the engine retries. A
/// permanent status carrying a `Retry-After` header is retried anyway,
/// because the server explicitly asked for it. Every other response,
/// including permanent error statuses, passes through unchanged; callers
/// keep the standard client semantic of inspecting the status themselves.
pub fn check_response(response: Response) -> Result<Response, Fault> {
    let status = response.status();

    if temporary_status(status) {
        return Err(Fault::transient(StatusError { status }));
    }
    if permanent_status(status) && response.headers().contains_key(RETRY_AFTER) {
        return Err(Fault::transient(StatusError { status }));
    }

    Ok(response)
}
