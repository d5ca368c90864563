//! Error taxonomy shared by every backend.

use std::time::Duration;

/// Typed error hierarchy for model invocations.
/// Classifies errors as configuration (fatal), retryable transport, or operational.
#[derive(Clone, Debug, thiserror::Error)]
pub enum LlmError {
    // Configuration: surfaced by the pool, never retried
    /// The identifier names no known backend.
    #[error("unknown model: {0}")]
    UnknownModel(String),
    /// Missing or rejected credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// The backend refused the request as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    // Retryable transport
    /// HTTP 429, with the server's `Retry-After` when given.
    #[error("rate limited")]
    RateLimited { retry_after: Option<Duration> },
    /// A 5xx response.
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },
    /// Connection or transport failure.
    #[error("network error: {0}")]
    Network(String),

    // Operational
    /// A response body the backend client could not read.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    /// The call did not finish within its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
}

impl LlmError {
    /// Worth another attempt after a backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. } | Self::Server { .. } | Self::Network(_)
        )
    }

    /// Configuration errors that no retry will fix.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownModel(_) | Self::Authentication(_) | Self::InvalidRequest(_)
        )
    }

    /// The server's requested wait, if any.
    pub fn suggested_delay(&self) -> Option<Duration> {
        if let Self::RateLimited { retry_after } = self {
            *retry_after
        } else {
            None
        }
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::UnknownModel(_) => "unknown_model",
            Self::Authentication(_) => "authentication",
            Self::InvalidRequest(_) => "invalid_request",
            Self::RateLimited { .. } => "rate_limited",
            Self::Server { .. } => "server_error",
            Self::Network(_) => "network_error",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Timeout(_) => "timeout",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::Authentication(body),
            404 => Self::UnknownModel(body),
            400 | 422 => Self::InvalidRequest(body),
            429 => Self::RateLimited { retry_after: None },
            500..=599 => Self::Server { status, body },
            _ => Self::InvalidRequest(format!("unexpected status {status}: {body}")),
        }
    }
}
