//! AI field extraction over a JSON-mode chat-completions endpoint.
//!
//! The model is always instructed to answer with a single JSON object; the
//! client strips markdown code fences before parsing because models wrap
//! JSON in fences despite the response-format setting.

use crate::error::{ClientError, status_is_retryable};
use async_trait::async_trait;
use clerk_core::constants::HTTP_TIMEOUT_SECS;
use clerk_core::retry::RetryConfig;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Something that turns a prompt into a JSON object.
#[async_trait]
pub trait FieldExtractor: Send + Sync {
    /// Run one extraction. `system` is an optional system prompt; `prompt`
    /// is the user message. The result is the parsed JSON object.
    async fn extract_json(
        &self,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<Value, ClientError>;
}

/// Production extractor backed by an OpenAI-compatible chat endpoint.
pub struct JsonExtractClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    retry: RetryConfig,
    timeout: Duration,
}

impl JsonExtractClient {
    /// Create a client against `base_url` (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override the per-request deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn request_once(&self, system: Option<&str>, prompt: &str) -> Result<Value, ClientError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "response_format": {"type": "json_object"},
            "temperature": 0.1,
        });

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(self.timeout)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            let message = body["error"]["message"]
                .as_str()
                .or_else(|| body["message"].as_str())
                .unwrap_or("no detail")
                .to_string();
            return Err(ClientError::Api {
                status,
                code: body["error"]["code"].as_u64().or_else(|| body["code"].as_u64()),
                message,
                retryable: status_is_retryable(status),
            });
        }

        let body: Value = resp.json().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("");
        let cleaned = strip_code_fences(content);
        Ok(serde_json::from_str(cleaned)?)
    }
}

#[async_trait]
impl FieldExtractor for JsonExtractClient {
    #[instrument(skip_all, fields(model = %self.model))]
    async fn extract_json(
        &self,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<Value, ClientError> {
        let mut attempt = 0;
        loop {
            match self.request_once(system, prompt).await {
                Ok(value) => {
                    debug!(attempt, "extraction succeeded");
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(attempt, delay_ms = delay.as_millis() as u64, error = %e, "retrying extraction");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Strip a surrounding markdown code fence (```json ... ``` or ``` ... ```).
#[must_use]
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
