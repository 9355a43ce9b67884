//! Document text extraction.

use crate::error::{ClientError, status_is_retryable};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use clerk_core::constants::{EXTRACT_TEXT_MAX, HTTP_TIMEOUT_SECS};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::instrument;

/// Turns document bytes into plain text for classification.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract text from `bytes`. A document with no extractable text
    /// yields an empty string, not an error.
    async fn extract_text(&self, filename: &str, bytes: &[u8]) -> Result<String, ClientError>;
}

/// Production extractor backed by an HTTP conversion service.
pub struct HttpTextExtractor {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTextExtractor {
    /// Create an extractor against `base_url` (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }
}

#[async_trait]
impl TextExtractor for HttpTextExtractor {
    #[instrument(skip(self, bytes), fields(filename, size = bytes.len()))]
    async fn extract_text(&self, filename: &str, bytes: &[u8]) -> Result<String, ClientError> {
        let body = json!({
            "filename": filename,
            "content_b64": BASE64.encode(bytes),
        });
        let resp = self
            .client
            .post(format!("{}/extract", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(ClientError::Api {
                status,
                code: None,
                message: format!("text extraction failed for {filename}"),
                retryable: status_is_retryable(status),
            });
        }

        let body: Value = resp.json().await?;
        let text = body["text"].as_str().unwrap_or("");
        Ok(truncate_text(text))
    }
}

/// Cap extracted text at the classification budget, respecting char
/// boundaries.
#[must_use]
pub fn truncate_text(text: &str) -> String {
    text.chars().take(EXTRACT_TEXT_MAX).collect()
}
