//! Dispatch error types.

use thiserror::Error;

/// Errors surfaced by [`crate::llm::ApiClient::send`] and response parsing.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The rolling-window ceiling was reached and the client is configured
    /// to fail fast. The caller may retry after the window resets.
    #[error("rate limit exceeded, retry in {retry_after_ms}ms")]
    RateLimitExceeded { retry_after_ms: u64 },

    /// A permanent upstream rejection. Retrying would not help.
    #[error("request rejected by upstream (status {status}): {message}")]
    RequestRejected { status: u16, message: String },

    /// Transient failures persisted through every allowed attempt.
    #[error("upstream unavailable after {attempts} attempts: {last_error}")]
    UpstreamUnavailable { attempts: u32, last_error: String },

    /// The upstream result lacked the expected fields.
    #[error("unexpected upstream response shape: {0}")]
    UpstreamFormat(String),
}

/// Errors produced by a single dispatch attempt, before retry
/// classification.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("http status {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Parsed `Retry-After` header, in seconds, when the server sent one.
        retry_after: Option<u64>,
    },
}

impl TransportError {
    /// Transient errors are worth retrying: timeouts, connection failures,
    /// 429 and server-side 5xx. Everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Timeout | TransportError::Connect(_) => true,
            TransportError::Status { status, .. } => *status == 429 || (500..=599).contains(status),
        }
    }

    /// Whether the upstream actually saw this attempt. Connection failures
    /// never reached the server, so they do not count as dispatched.
    pub fn was_dispatched(&self) -> bool {
        !matches!(self, TransportError::Connect(_))
    }

    pub fn retry_after(&self) -> Option<u64> {
        match self {
            TransportError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}
