//! Client-side error type and the mapping into [`ClerkError`].

use clerk_core::errors::ClerkError;
use thiserror::Error;

/// Failure talking to an HTTP collaborator.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The collaborator answered with a non-success status.
    #[error("api error (status {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Service-specific error code from the response body, if any.
        code: Option<u64>,
        /// Human-readable detail.
        message: String,
        /// Whether a retry is worthwhile (5xx, 429).
        retryable: bool,
    },

    /// The response body did not parse.
    #[error("bad response body: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload exceeds the upload limit; detected before any network call.
    #[error("payload too large: {size} bytes (limit {limit})")]
    Oversize {
        /// Offending payload size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl ClientError {
    /// Whether a retry with backoff may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::Api { retryable, .. } => *retryable,
            Self::Json(_) | Self::Oversize { .. } => false,
        }
    }

    /// Service-specific error code, if the collaborator supplied one.
    #[must_use]
    pub fn api_code(&self) -> Option<u64> {
        match self {
            Self::Api { code, .. } => *code,
            _ => None,
        }
    }

    /// Map into the shared error taxonomy, naming the collaborator.
    #[must_use]
    pub fn into_clerk(self, service: &'static str) -> ClerkError {
        match self {
            Self::Oversize { size, limit } => ClerkError::Oversize { size, limit },
            e if e.is_retryable() => ClerkError::TransientNetwork(e.to_string()),
            e => ClerkError::ExternalService {
                service,
                message: e.to_string(),
            },
        }
    }
}

/// Classify an HTTP status for retry purposes.
#[must_use]
pub fn status_is_retryable(status: u16) -> bool {
    status >= 500 || status == 429
}
