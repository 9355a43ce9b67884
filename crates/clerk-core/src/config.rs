//! Process configuration from environment variables.

use crate::constants::MAX_UPLOAD_BYTES;
use crate::errors::ClerkError;

/// Runtime configuration, loaded once at startup.
#[derive(Clone, Debug)]
pub struct ClerkConfig {
    /// Chat-transport app id.
    pub app_id: String,
    /// Chat-transport app secret.
    pub app_secret: String,
    /// API key for the AI extraction service.
    pub ai_api_key: String,
    /// Base URL of the AI extraction service.
    pub ai_base_url: String,
    /// Base URL of the ticket backend.
    pub ticket_base_url: String,
    /// Base URL of the document store and text extractor.
    pub doc_base_url: String,
    /// Base URL of the HR portal, for link-only kinds.
    pub portal_base_url: String,
    /// Upload size limit in bytes.
    pub max_upload_bytes: usize,
}

impl ClerkConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ClerkError> {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Load via an arbitrary lookup, for tests.
    pub fn from_env_with(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClerkError> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ClerkError::Configuration(format!("{key} is not set")))
        };
        let defaulted =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            app_id: required("CLERK_APP_ID")?,
            app_secret: required("CLERK_APP_SECRET")?,
            ai_api_key: required("CLERK_AI_API_KEY")?,
            ai_base_url: defaulted("CLERK_AI_BASE_URL", "https://api.deepseek.com/v1"),
            ticket_base_url: defaulted("CLERK_TICKET_BASE_URL", "https://tickets.internal"),
            doc_base_url: defaulted("CLERK_DOC_BASE_URL", "https://docs.internal"),
            portal_base_url: defaulted("CLERK_PORTAL_BASE_URL", "https://portal.internal"),
            max_upload_bytes: lookup("CLERK_MAX_UPLOAD_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_UPLOAD_BYTES),
        })
    }
}
