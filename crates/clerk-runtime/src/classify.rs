//! AI intent classification and field extraction.
//!
//! Prompts always demand a single JSON object. An answer that is not valid
//! JSON of the expected shape is a [`ParseOutcome::Failed`], not an error:
//! the caller counts it against the clarification budget instead of showing
//! an error to the user.

use clerk_clients::ai::FieldExtractor;
use clerk_clients::error::ClientError;
use clerk_core::catalog::{TicketKind, TicketSpec};
use clerk_core::errors::ClerkError;
use clerk_core::fields::{FieldMap, FieldValue};
use clerk_store::window::{Role, Turn};
use serde_json::Value;
use std::fmt::Write as _;
use tracing::{instrument, warn};

/// A parsed classification.
#[derive(Clone, Debug, PartialEq)]
pub struct IntentResult {
    /// Classified kind, if the request maps to one.
    pub kind: Option<TicketKind>,
    /// Extracted fields keyed by canonical id.
    pub fields: FieldMap,
    /// Field ids the model could not infer.
    pub missing: Vec<String>,
    /// Model's question back to the user, when intent was ambiguous.
    pub unclear: Option<String>,
}

/// Outcome of one classification attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum ParseOutcome {
    /// The model answered in the expected shape.
    Parsed(IntentResult),
    /// The answer was unusable; retry or clarify.
    Failed {
        /// What went wrong, for logs.
        reason: String,
    },
}

fn system_prompt() -> String {
    let mut p = String::from(
        "You classify employee requests into approval ticket kinds and extract \
         form fields. Answer with a single JSON object:\n\
         {\"ticket_kind\": <kind or null>, \"fields\": {..}, \"missing\": [..], \"unclear\": <question or null>}\n\
         Kinds:\n",
    );
    for kind in TicketKind::all() {
        let spec = kind.spec();
        let _ = writeln!(p, "- {}: {}", kind.slug(), spec.hint);
        let ids: Vec<&str> = spec.fields.iter().map(|f| f.id).collect();
        let _ = writeln!(p, "  fields: {}", ids.join(", "));
    }
    p.push_str(
        "Infer aggressively from context; normalize dates to YYYY-MM-DD; list \
         only truly unknowable required fields in \"missing\"; set \"unclear\" \
         only when the kind itself is ambiguous.",
    );
    p
}

fn render_history(history: &[Turn]) -> String {
    history
        .iter()
        .map(|t| {
            let who = match t.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            format!("{who}: {}", t.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_field_map(value: &Value) -> FieldMap {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| {
                    let fv = serde_json::from_value::<FieldValue>(v.clone()).ok()?;
                    Some((k.clone(), fv))
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Classify one user message against the conversation window.
#[instrument(skip_all)]
pub async fn classify_intent(
    ai: &dyn FieldExtractor,
    history: &[Turn],
    text: &str,
) -> Result<ParseOutcome, ClerkError> {
    let prompt = if history.is_empty() {
        text.to_string()
    } else {
        format!("Conversation so far:\n{}\n\nLatest message: {text}", render_history(history))
    };

    let value = match ai.extract_json(Some(&system_prompt()), &prompt).await {
        Ok(value) => value,
        Err(ClientError::Json(e)) => {
            warn!(error = %e, "classifier answer was not valid JSON");
            return Ok(ParseOutcome::Failed { reason: e.to_string() });
        }
        Err(e) => return Err(e.into_clerk("ai")),
    };

    if !value.is_object() {
        return Ok(ParseOutcome::Failed {
            reason: "classifier answer was not an object".into(),
        });
    }

    let kind = value["ticket_kind"].as_str().and_then(TicketKind::from_slug);
    if value["ticket_kind"].as_str().is_some() && kind.is_none() {
        warn!(kind = ?value["ticket_kind"], "classifier invented a ticket kind");
    }

    Ok(ParseOutcome::Parsed(IntentResult {
        kind,
        fields: parse_field_map(&value["fields"]),
        missing: value["missing"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter_map(|v| v.as_str().map(ToString::to_string))
                    .collect()
            })
            .unwrap_or_default(),
        unclear: value["unclear"].as_str().map(ToString::to_string),
    }))
}

/// Extract fields of `spec` from one document's text. Unknown ids and empty
/// values are dropped; validation against sources happens in the merge.
#[instrument(skip_all, fields(kind = spec.kind.slug(), display_name))]
pub async fn extract_document_fields(
    ai: &dyn FieldExtractor,
    spec: &TicketSpec,
    display_name: &str,
    text: &str,
) -> Result<FieldMap, ClerkError> {
    let ids: Vec<&str> = spec.fields.iter().map(|f| f.id).collect();
    let system = format!(
        "Extract these fields from a document if present: {}. Answer with a \
         single JSON object mapping field id to value; omit fields not found. \
         Normalize dates to YYYY-MM-DD.",
        ids.join(", ")
    );
    let prompt = format!("Filename: {display_name}\n\n{text}");

    let value = match ai.extract_json(Some(&system), &prompt).await {
        Ok(value) => value,
        Err(ClientError::Json(e)) => {
            // A single unreadable document degrades to no inferred fields.
            warn!(error = %e, "document extraction answer was not valid JSON");
            return Ok(FieldMap::new());
        }
        Err(e) => return Err(e.into_clerk("ai")),
    };

    let mut fields = parse_field_map(&value);
    fields.retain(|id, v| spec.field(id).is_some() && !v.is_empty());
    Ok(fields)
}
