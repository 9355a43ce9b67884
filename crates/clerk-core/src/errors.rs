//! Error taxonomy for the orchestrator.
//!
//! The split matters operationally:
//!
//! - [`ClerkError::TransientNetwork`] is retried with backoff and only
//!   surfaces as [`ClerkError::ExternalService`] after retries are exhausted.
//! - [`ClerkError::Validation`] is never shown as an error — callers convert
//!   it into a targeted follow-up prompt naming the missing fields.
//! - [`ClerkError::Conflict`] (duplicate event, stale timer) is silently
//!   absorbed with no user-visible effect.
//! - [`ClerkError::Configuration`] is fatal at startup.

use thiserror::Error;

/// Top-level error type shared across clerk crates.
#[derive(Debug, Error)]
pub enum ClerkError {
    /// Timeout or connection failure talking to a collaborator. Retryable.
    #[error("transient network failure: {0}")]
    TransientNetwork(String),

    /// A collaborator failed after retries were exhausted (or the failure
    /// was non-retryable to begin with). Not retried further.
    #[error("{service} unavailable: {message}")]
    ExternalService {
        /// Short collaborator name for logs ("ai", "docs", "tickets").
        service: &'static str,
        /// Upstream failure detail.
        message: String,
    },

    /// Required fields are missing or invalid. Converted into a follow-up
    /// prompt, never surfaced raw.
    #[error("missing required fields: {}", missing.join(", "))]
    Validation {
        /// Canonical ids of the missing fields.
        missing: Vec<String>,
    },

    /// Session or confirmation no longer exists (TTL expiry or already
    /// consumed). Surfaced as "please restart".
    #[error("session expired or already used")]
    Expired,

    /// Duplicate event or stale timer. Absorbed silently.
    #[error("duplicate or superseded event")]
    Conflict,

    /// Missing or invalid startup configuration. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Upload exceeds the size limit; rejected before any network call.
    #[error("file too large: {size} bytes (limit {limit})")]
    Oversize {
        /// Offending payload size.
        size: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl ClerkError {
    /// Whether a retry with backoff is worthwhile.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransientNetwork(_))
    }
}
