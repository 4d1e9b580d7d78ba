use std::time::Duration;

use bytes::Bytes;
use conduit_config::Config;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Method, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::BackoffPolicy;
use crate::error::{BoxError, LlmError, TransportError};
use crate::protocol::openai::OpenAiErrorResponse;

/// HTTP statuses worth another attempt
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Longest error body excerpt carried into an error message
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Whether a response status warrants a retry
pub fn is_retryable_status(status: u16) -> bool {
    RETRYABLE_STATUSES.contains(&status)
}

/// Method, body and accept header of one logical request
///
/// The body is serialized once and reused by every attempt.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    method: Method,
    body: Option<Bytes>,
    accept: &'static str,
}

impl RequestSpec {
    /// A `GET` expecting a JSON response
    pub const fn get() -> Self {
        Self {
            method: Method::GET,
            body: None,
            accept: "application/json",
        }
    }

    /// A `POST` with a JSON body expecting a server-sent event stream
    ///
    /// # Errors
    ///
    /// Returns `LlmError::InvalidRequest` if the body fails to serialize.
    pub fn stream_json<T: Serialize>(body: &T) -> Result<Self, LlmError> {
        let body = serde_json::to_vec(body)
            .map_err(|e| LlmError::InvalidRequest(format!("failed to serialize request: {e}")))?;

        Ok(Self {
            method: Method::POST,
            body: Some(Bytes::from(body)),
            accept: "text/event-stream",
        })
    }

    pub const fn method(&self) -> &Method {
        &self.method
    }
}

/// Sends HTTP requests, retrying transient failures with backoff
///
/// Every attempt carries the configured credential, is bounded by the
/// per-attempt timeout (headers only, not the streamed body), and races the
/// caller's cancellation token. Backoff sleeps race the token as well.
#[derive(Debug, Clone)]
pub struct RetryingTransport {
    client: Client,
    policy: BackoffPolicy,
    max_retries: u32,
    attempt_timeout: Duration,
    credential: Option<SecretString>,
}

impl RetryingTransport {
    pub const fn new(
        client: Client,
        policy: BackoffPolicy,
        max_retries: u32,
        attempt_timeout: Duration,
        credential: Option<SecretString>,
    ) -> Self {
        Self {
            client,
            policy,
            max_retries,
            attempt_timeout,
            credential,
        }
    }

    /// Build from a configuration snapshot
    pub fn from_config(client: Client, config: &Config) -> Self {
        Self::new(
            client,
            BackoffPolicy::from_config(&config.retry),
            config.retry.max_retries,
            config.server.request_timeout(),
            config.server.credential().cloned(),
        )
    }

    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Send a request, retrying retryable failures
    ///
    /// Returns the first successful (2xx) response. The response body is left
    /// unread so callers can stream it.
    ///
    /// # Errors
    ///
    /// - `LlmError::Cancelled` if the token fires while sending or sleeping
    /// - `LlmError::Transport` for a non-retryable failure, or the last
    ///   failure once every attempt is spent
    pub async fn send(
        &self,
        url: &Url,
        spec: &RequestSpec,
        operation: &str,
        cancel: &CancellationToken,
    ) -> Result<Response, LlmError> {
        let max_attempts = self.max_attempts();
        let mut attempt = 0;

        loop {
            attempt += 1;

            let failure = match self.attempt(url, spec, cancel).await {
                Ok(response) => return Ok(response),
                Err(AttemptError::Cancelled) => return Err(LlmError::Cancelled),
                Err(AttemptError::Failed(failure)) => failure,
            };

            if !failure.retryable || attempt >= max_attempts {
                tracing::warn!(
                    operation,
                    attempt,
                    status = ?failure.status,
                    retryable = failure.retryable,
                    error = %failure.message,
                    "request failed"
                );
                return Err(failure.into_error(operation, attempt).into());
            }

            let delay = self.policy.delay(attempt - 1);
            tracing::info!(
                operation,
                attempt,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                status = ?failure.status,
                error = %failure.message,
                "retrying request"
            );

            tokio::select! {
                () = cancel.cancelled() => return Err(LlmError::Cancelled),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn attempt(
        &self,
        url: &Url,
        spec: &RequestSpec,
        cancel: &CancellationToken,
    ) -> Result<Response, AttemptError> {
        let request = self.build(url, spec);

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(AttemptError::Cancelled),
            outcome = tokio::time::timeout(self.attempt_timeout, request.send()) => outcome,
        };

        let response = match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(AttemptError::Failed(AttemptFailure::from_reqwest(e))),
            Err(_) => {
                return Err(AttemptError::Failed(AttemptFailure {
                    message: format!("no response within {}ms", self.attempt_timeout.as_millis()),
                    status: None,
                    retryable: true,
                    cause: None,
                }));
            }
        };

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = tokio::select! {
            () = cancel.cancelled() => return Err(AttemptError::Cancelled),
            body = tokio::time::timeout(self.attempt_timeout, response.text()) => {
                body.ok().and_then(Result::ok).unwrap_or_default()
            }
        };

        Err(AttemptError::Failed(AttemptFailure {
            message: error_message(status, &body),
            status: Some(status),
            retryable: is_retryable_status(status),
            cause: None,
        }))
    }

    fn build(&self, url: &Url, spec: &RequestSpec) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .request(spec.method.clone(), url.clone())
            .header(ACCEPT, spec.accept);

        if let Some(body) = &spec.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        if let Some(key) = &self.credential {
            let key = key.expose_secret();
            builder = builder.bearer_auth(key);

            if let Ok(mut value) = HeaderValue::from_str(key) {
                value.set_sensitive(true);
                builder = builder.header("x-api-key", value);
            }
        }

        builder
    }
}

enum AttemptError {
    Cancelled,
    Failed(AttemptFailure),
}

struct AttemptFailure {
    message: String,
    status: Option<u16>,
    retryable: bool,
    cause: Option<BoxError>,
}

impl AttemptFailure {
    fn from_reqwest(err: reqwest::Error) -> Self {
        // Malformed requests and undecodable responses fail the same way every time
        let retryable = !(err.is_builder() || err.is_redirect() || err.is_decode());

        Self {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
            retryable,
            cause: Some(Box::new(err)),
        }
    }

    fn into_error(self, operation: &str, attempts: u32) -> TransportError {
        TransportError {
            operation: operation.to_owned(),
            message: self.message,
            status: self.status,
            retryable: false,
            attempts,
            cause: self.cause,
        }
    }
}

/// Human-readable message from an error response body
///
/// Prefers the OpenAI-style `{"error": {"message": ...}}` envelope and falls
/// back to a bounded excerpt of the raw body.
fn error_message(status: u16, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<OpenAiErrorResponse>(body) {
        return envelope.error.message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("server returned status {status}");
    }

    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}
