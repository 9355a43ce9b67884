//! Artifact download and upload.

use crate::error::{ClientError, status_is_retryable};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use clerk_core::constants::{HTTP_TIMEOUT_SECS, MAX_UPLOAD_BYTES};
use clerk_core::ids::ArtifactId;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::instrument;

/// Byte-level access to uploaded documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the raw bytes of an artifact.
    async fn download(&self, artifact: &ArtifactId) -> Result<Vec<u8>, ClientError>;

    /// Store bytes, returning the new artifact reference. Rejects payloads
    /// over the size limit before touching the network.
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<ArtifactId, ClientError>;
}

/// Production store backed by an HTTP artifact service.
pub struct HttpDocumentStore {
    client: reqwest::Client,
    base_url: String,
    max_upload_bytes: usize,
    timeout: Duration,
}

impl HttpDocumentStore {
    /// Create a store against `base_url` (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }

    /// Override the upload size limit.
    #[must_use]
    pub fn with_upload_limit(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    #[instrument(skip(self), fields(artifact = %artifact))]
    async fn download(&self, artifact: &ArtifactId) -> Result<Vec<u8>, ClientError> {
        let resp = self
            .client
            .get(format!("{}/artifacts/{}", self.base_url, artifact))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(ClientError::Api {
                status,
                code: None,
                message: format!("download failed for {artifact}"),
                retryable: status_is_retryable(status),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }

    #[instrument(skip(self, bytes), fields(name, size = bytes.len()))]
    async fn upload(&self, name: &str, bytes: &[u8]) -> Result<ArtifactId, ClientError> {
        if bytes.len() > self.max_upload_bytes {
            return Err(ClientError::Oversize {
                size: bytes.len(),
                limit: self.max_upload_bytes,
            });
        }

        let body = json!({
            "name": name,
            "content_b64": BASE64.encode(bytes),
        });
        let resp = self
            .client
            .post(format!("{}/artifacts", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            return Err(ClientError::Api {
                status,
                code: None,
                message: format!("upload failed for {name}"),
                retryable: status_is_retryable(status),
            });
        }

        let body: Value = resp.json().await?;
        let id = body["artifact_id"].as_str().unwrap_or_default();
        if id.is_empty() {
            return Err(ClientError::Api {
                status,
                code: None,
                message: "upload response missing artifact_id".into(),
                retryable: false,
            });
        }
        Ok(ArtifactId::new(id))
    }
}
