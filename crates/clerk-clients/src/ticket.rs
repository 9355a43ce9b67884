//! Ticket backend: creating tickets and fetching form definitions.

use crate::error::{ClientError, status_is_retryable};
use async_trait::async_trait;
use clerk_core::constants::HTTP_TIMEOUT_SECS;
use clerk_core::ids::ArtifactId;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::instrument;

/// Backend error code meaning the definition is a free process: the ticket
/// has no approval nodes and must be filed through the portal instead.
pub const FREE_PROCESS_CODE: u64 = 1_390_013;

/// One field of an outgoing ticket form, in wire terms.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    /// Backend field id.
    pub id: String,
    /// Serialized value.
    pub value: Value,
}

/// A created ticket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TicketInstance {
    /// Backend instance id, shown in the success message.
    pub instance_id: String,
}

/// One field of a fetched form definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormFieldDef {
    /// Backend field id.
    pub id: String,
    /// Display label, used for canonical-id mapping.
    pub name: String,
    /// Widget kind ("input", "textarea", "date", ...).
    pub kind: String,
    /// Valid options for choice widgets.
    #[serde(default)]
    pub options: Vec<String>,
}

/// A fetched ticket form definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FormDefinition {
    /// Field definitions in form order.
    pub fields: Vec<FormFieldDef>,
    /// Number of approval nodes; zero marks a free process.
    pub approval_nodes: u32,
}

impl FormDefinition {
    /// Whether this definition is a free process (no approval chain).
    #[must_use]
    pub fn is_free_process(&self) -> bool {
        self.approval_nodes == 0
    }
}

/// The ticket backend.
#[async_trait]
pub trait TicketBackend: Send + Sync {
    /// Create a ticket of definition `code` with the given form fields and
    /// attached artifacts.
    async fn create_ticket(
        &self,
        code: &str,
        fields: &[FormField],
        artifacts: &[ArtifactId],
    ) -> Result<TicketInstance, ClientError>;

    /// Fetch the current form definition for `code`.
    async fn fetch_definition(&self, code: &str) -> Result<FormDefinition, ClientError>;
}

/// Production backend over HTTP.
pub struct HttpTicketBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTicketBackend {
    /// Create a backend against `base_url` (no trailing slash).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(HTTP_TIMEOUT_SECS),
        }
    }

    fn api_error(status: u16, body: &Value, context: &str) -> ClientError {
        ClientError::Api {
            status,
            code: body["code"].as_u64(),
            message: body["msg"]
                .as_str()
                .map_or_else(|| context.to_string(), ToString::to_string),
            retryable: status_is_retryable(status),
        }
    }
}

#[async_trait]
impl TicketBackend for HttpTicketBackend {
    #[instrument(skip(self, fields, artifacts), fields(code, field_count = fields.len()))]
    async fn create_ticket(
        &self,
        code: &str,
        fields: &[FormField],
        artifacts: &[ArtifactId],
    ) -> Result<TicketInstance, ClientError> {
        let body = json!({
            "definition_code": code,
            "form": fields,
            "attachments": artifacts,
        });
        let resp = self
            .client
            .post(format!("{}/tickets", self.base_url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body: Value = resp.json().await?;
        if !(200..300).contains(&status) || body["code"].as_u64().is_some_and(|c| c != 0) {
            return Err(Self::api_error(status, &body, "ticket creation failed"));
        }
        Ok(TicketInstance {
            instance_id: body["instance_id"].as_str().unwrap_or_default().to_string(),
        })
    }

    #[instrument(skip(self), fields(code))]
    async fn fetch_definition(&self, code: &str) -> Result<FormDefinition, ClientError> {
        let resp = self
            .client
            .get(format!("{}/definitions/{code}", self.base_url))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body: Value = resp.json().await.unwrap_or(Value::Null);
            return Err(Self::api_error(status, &body, "definition fetch failed"));
        }
        Ok(resp.json().await?)
    }
}
