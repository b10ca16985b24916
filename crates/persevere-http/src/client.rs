// Retrying HTTP client over reqwest
use std::time::Duration;

use persevere::{abort, Retrier, RetryConfig, RetryError, RetryResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client as ReqwestClient, IntoUrl, Method, RequestBuilder, Response};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::classify::{check_response, classify_transport_error};

/// Header marking a request as a retry.
///
/// Absent on the first attempt; on retries the value is the zero-based
/// attempt index ("1" for the first retry). There is no standard way of
/// indicating retries to an HTTP server yet; this header will follow one
/// once it emerges.
pub const RETRY_ATTEMPT: HeaderName = HeaderName::from_static("retry-attempt");

/// Error returned when the request body cannot be replayed for a retry.
#[derive(Debug, Error)]
#[error("request body cannot be cloned; buffer the body to enable retries")]
pub struct ReplayError;

/// Errors constructing a [`RetryingClient`].
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
    /// The retry configuration failed validation.
    #[error(transparent)]
    Retry(#[from] RetryError),
}

/// HTTP client that sends each request through the retry engine.
///
/// Per attempt, the request is cloned from its builder (a streaming body
/// that cannot be cloned fails permanently rather than being silently
/// sent once), tagged with the [`RETRY_ATTEMPT`] header on retries, and
/// classified via [`check_response`](crate::classify::check_response):
/// temporary statuses are retried, everything else — including permanent
/// error statuses — is returned to the caller unchanged.
#[derive(Debug, Clone)]
pub struct RetryingClient {
    client: ReqwestClient,
    retrier: Retrier,
}

impl RetryingClient {
    /// Start building a new retrying client.
    pub fn builder() -> RetryingClientBuilder {
        RetryingClientBuilder::default()
    }

    /// Convenience constructor with default configuration.
    pub fn new() -> Result<Self, HttpClientError> {
        Self::builder().build()
    }

    /// Create a request builder using the underlying reqwest client.
    pub fn request<U>(&self, method: Method, url: U) -> RequestBuilder
    where
        U: IntoUrl,
    {
        self.client.request(method, url)
    }

    /// Execute the request with retry semantics.
    ///
    /// Returns the final response on success or permanent-status
    /// pass-through; returns the engine's terminal error when attempts,
    /// budget, or cancellation cut the exchange short.
    pub async fn send(
        &self,
        cancel: &CancellationToken,
        builder: RequestBuilder,
    ) -> RetryResult<Response> {
        let client = self.client.clone();

        self.retrier
            .run(cancel, move |attempt| {
                let client = client.clone();
                let cloned = builder.try_clone();
                async move {
                    let builder = cloned.ok_or_else(|| abort(ReplayError))?;
                    let mut request = builder.build().map_err(|err| abort(err))?;

                    if attempt.is_retry() {
                        request.headers_mut().insert(RETRY_ATTEMPT, HeaderValue::from(attempt.index()));
                    }

                    let method = request.method().clone();
                    let url = request.url().clone();
                    debug!(attempt = attempt.index(), %method, %url, "sending HTTP request");

                    match client.execute(request).await {
                        Ok(response) => {
                            let status = response.status();
                            debug!(attempt = attempt.index(), %method, %url, %status, "received HTTP response");
                            check_response(response)
                        }
                        Err(err) => {
                            debug!(attempt = attempt.index(), %method, %url, error = %err, "HTTP request failed");
                            Err(classify_transport_error(err))
                        }
                    }
                }
            })
            .await
    }
}

/// Builder for [`RetryingClient`].
#[derive(Debug)]
pub struct RetryingClientBuilder {
    timeout: Duration,
    user_agent: Option<String>,
    default_headers: Option<HeaderMap>,
    retry: RetryConfig,
}

impl Default for RetryingClientBuilder {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            user_agent: None,
            default_headers: None,
            retry: RetryConfig::default(),
        }
    }
}

impl RetryingClientBuilder {
    /// Total timeout for each underlying HTTP exchange.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn default_headers(mut self, headers: HeaderMap) -> Self {
        self.default_headers = Some(headers);
        self
    }

    /// Replace the retry configuration (attempts, backoff, jitter,
    /// per-attempt timeout, budget).
    pub fn retry_config(mut self, config: RetryConfig) -> Self {
        self.retry = config;
        self
    }

    pub fn build(self) -> Result<RetryingClient, HttpClientError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout).no_proxy();

        if let Some(agent) = self.user_agent {
            builder = builder.user_agent(agent);
        }
        if let Some(headers) = self.default_headers {
            builder = builder.default_headers(headers);
        }

        self.retry.validate()?;

        Ok(RetryingClient { client: builder.build()?, retrier: Retrier::new(self.retry) })
    }
}
