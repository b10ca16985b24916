//! HTTP adapter for the `persevere` retry engine.
//!
//! Client side, [`RetryingClient`] wraps a `reqwest` client so every
//! request runs through the retry engine: temporary statuses (5xx except
//! 501, plus 423 and anything carrying `Retry-After`) are retried with
//! backoff, request bodies are replayed per attempt, and retries carry
//! the `retry-attempt` header.
//!
//! Server side, [`OverloadGate`] feeds the same header into a shared
//! [`Budget`](persevere::Budget) and, when the system-wide retry ratio
//! indicates overload, upgrades temporary failure responses to 429 so
//! well-behaved clients stop retrying.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod classify;
pub mod client;
pub mod server;

pub use classify::{
    check_response, classify_transport_error, permanent_status, temporary_status, StatusError,
};
pub use client::{
    HttpClientError, ReplayError, RetryingClient, RetryingClientBuilder, RETRY_ATTEMPT,
};
pub use server::OverloadGate;
