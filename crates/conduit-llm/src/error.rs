use thiserror::Error;

/// Boxed underlying cause of a transport failure
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the completion engine
#[derive(Debug, Error)]
pub enum LlmError {
    /// The request could not be delivered, or the server refused it
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The connection broke while the response was streaming
    #[error("streaming error: {0}")]
    Streaming(String),

    /// The caller raised the cancellation signal
    #[error("request cancelled")]
    Cancelled,

    /// The caller built a request the engine cannot send
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A response body could not be decoded
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl LlmError {
    /// Whether the caller raised cancellation
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Terminal HTTP transport failure
///
/// Produced either by a non-retryable response or by exhausting every
/// attempt. `retryable` is always `false` once this error reaches a caller;
/// the flag exists so intermediate classification can be inspected in logs.
#[derive(Debug, Error)]
#[error("{operation} failed{} after {attempts} attempt(s): {message}", status_suffix(.status.as_ref()))]
pub struct TransportError {
    /// Operation label, e.g. `chat completion`
    pub operation: String,
    /// Human-readable failure description
    pub message: String,
    /// HTTP status of the last response, if one was received
    pub status: Option<u16>,
    /// Whether another attempt could succeed
    pub retryable: bool,
    /// Attempts made before giving up
    pub attempts: u32,
    /// Last underlying cause
    #[source]
    pub cause: Option<BoxError>,
}

fn status_suffix(status: Option<&u16>) -> String {
    status.map(|s| format!(" with status {s}")).unwrap_or_default()
}
