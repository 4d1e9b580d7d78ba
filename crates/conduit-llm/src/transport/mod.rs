//! HTTP transport with retry and exponential backoff

mod backoff;
mod retry;

pub use backoff::{BackoffPolicy, MAX_JITTER};
pub use retry::{RETRYABLE_STATUSES, RequestSpec, RetryingTransport, is_retryable_status};
