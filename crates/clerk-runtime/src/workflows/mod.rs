//! Workflow implementations and shared flow helpers.

pub mod generic;
pub mod invoice;
pub mod seal;

use crate::deps::RouterDeps;
use chrono::{DateTime, Utc};
use clerk_core::catalog::TicketKind;
use clerk_core::constants::CLARIFY_SILENT_RETRIES;
use clerk_core::events::OutboundMessage;
use clerk_core::fields::FieldMap;
use clerk_core::ids::{ArtifactId, UserId};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::{Arc, LazyLock};
use tracing::debug;

static CANCEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(cancel|stop|never mind|forget it)\s*[.!]?\s*$").unwrap());

static FINISH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(done|submit|confirm|that's all)\s*[.!]?\s*$").unwrap());

/// Whether `text` cancels the active workflow.
#[must_use]
pub fn is_cancel(text: &str) -> bool {
    CANCEL.is_match(text)
}

/// Whether `text` ends a file batch early.
#[must_use]
pub fn is_finish(text: &str) -> bool {
    FINISH.is_match(text)
}

/// Human-readable summary shown on the confirmation card.
#[must_use]
pub fn render_summary(kind: TicketKind, fields: &FieldMap) -> String {
    let spec = kind.spec();
    let mut out = format!("{} request:\n", spec.title);
    for field in spec.fields {
        if let Some(value) = fields.get(field.id) {
            let _ = writeln!(out, "  {}: {value}", field.label);
        }
    }
    out.push_str("Press confirm to file the ticket.");
    out
}

/// Prompt naming the required fields still missing.
#[must_use]
pub fn prompt_for_missing(kind: TicketKind, missing: &[String]) -> String {
    let spec = kind.spec();
    let labels: Vec<&str> = missing
        .iter()
        .filter_map(|id| spec.field(id).map(|f| f.label))
        .collect();
    format!("For the {} request I still need: {}.", spec.title, labels.join(", "))
}

/// Greeting listing what the assistant can file.
#[must_use]
pub fn greeting() -> String {
    let mut out = String::from("I can file approval tickets for you:\n");
    for kind in TicketKind::all() {
        let _ = writeln!(out, "  - {}: {}", kind.spec().title, kind.spec().hint);
    }
    out.push_str("What do you need?");
    out
}

/// Portal deep link for link-only kinds and free processes.
#[must_use]
pub fn portal_link(portal_base: &str, code: &str) -> String {
    format!("{portal_base}/new?definition={code}")
}

/// Count an unparseable clarifying reply against the user's session and
/// return the reply to send. Every flow shares the same budget: two silent
/// retries, then the reply carries a cancel hint.
pub(crate) fn clarification_failed(deps: &RouterDeps, user: &UserId, reason: &str) -> String {
    let retries = deps
        .store
        .update(user, Utc::now(), |s| {
            s.retries += 1;
            s.retries
        })
        .unwrap_or(1);
    debug!(user = %user, reason, retries, "clarification parse failure");

    if retries > CLARIFY_SILENT_RETRIES {
        "I still couldn't make sense of that. Could you rephrase? You can also say \"cancel\" to start over.".to_string()
    } else {
        "Sorry, I didn't catch that. Could you say it another way?".to_string()
    }
}

/// Bind finalized fields to a fresh token and send the confirmation card.
pub async fn send_confirmation(
    deps: &Arc<RouterDeps>,
    user: &UserId,
    kind: TicketKind,
    fields: FieldMap,
    artifacts: Vec<ArtifactId>,
    now: DateTime<Utc>,
) {
    let summary = render_summary(kind, &fields);
    let token = deps.store.issue_confirmation(user, kind, fields, artifacts, now);
    deps.notifier
        .send(user, OutboundMessage::Confirm { summary, token })
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use clerk_core::fields::FieldValue;

    #[test]
    fn cancel_matches_loosely() {
        assert!(is_cancel("cancel"));
        assert!(is_cancel("  Never mind. "));
        assert!(is_cancel("STOP!"));
        assert!(!is_cancel("don't cancel the contract"));
    }

    #[test]
    fn finish_matches_batch_enders() {
        assert!(is_finish("done"));
        assert!(is_finish("That's all"));
        assert!(!is_finish("I'm done uploading soon"));
    }

    #[test]
    fn summary_lists_fields_in_spec_order() {
        let fields: FieldMap = [
            ("reason".to_string(), FieldValue::Text("flu".into())),
            ("leave_type".to_string(), FieldValue::Text("sick".into())),
        ]
        .into_iter()
        .collect();
        let s = render_summary(TicketKind::Leave, &fields);
        let type_at = s.find("Leave type").unwrap();
        let reason_at = s.find("Reason").unwrap();
        assert!(type_at < reason_at);
    }

    #[test]
    fn missing_prompt_uses_labels() {
        let missing = vec!["start_date".to_string(), "days".to_string()];
        let p = prompt_for_missing(TicketKind::Leave, &missing);
        assert!(p.contains("Start date"));
        assert!(p.contains("Days"));
    }
}
