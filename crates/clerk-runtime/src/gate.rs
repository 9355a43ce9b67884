//! Confirmation gate: token redemption and ticket creation.
//!
//! Redemption is the only path to a ticket. The token is removed atomically
//! under the store lock before any network work, so a double press files
//! exactly one ticket and the loser sees "already submitted".

use crate::deps::RouterDeps;
use crate::workflows::{portal_link, send_confirmation};
use chrono::Utc;
use clerk_core::catalog::{TicketKind, admin_comment, canonical_field_id};
use clerk_core::errors::ClerkError;
use clerk_core::events::OutboundMessage;
use clerk_core::fields::FieldMap;
use clerk_core::ids::{ConfirmToken, UserId};
use clerk_clients::ticket::{FREE_PROCESS_CODE, FormDefinition, FormField};
use clerk_store::confirm::{PendingConfirmation, RedeemError};
use metrics::counter;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The gate.
#[derive(Clone)]
pub struct ConfirmGate {
    deps: Arc<RouterDeps>,
}

impl ConfirmGate {
    /// Gate over the shared collaborators.
    #[must_use]
    pub fn new(deps: Arc<RouterDeps>) -> Self {
        Self { deps }
    }

    /// Redeem `token` for `user` and, if it is live, file the ticket.
    #[instrument(skip_all, fields(user = %user))]
    pub async fn redeem(&self, user: &UserId, token: &ConfirmToken) -> Result<(), ClerkError> {
        let now = Utc::now();
        let pending = match self.deps.store.redeem_confirmation(token, user, now) {
            Ok(pending) => pending,
            Err(RedeemError::Consumed) => {
                info!(user = %user, "double confirmation press");
                self.say(user, "That request was already submitted. Start a new one if you need another ticket.").await;
                return Ok(());
            }
            Err(RedeemError::Expired) => {
                info!(user = %user, "stale confirmation press");
                self.say(user, "That confirmation expired. Please start the request over.").await;
                return Ok(());
            }
        };

        let spec = pending.kind.spec();
        if spec.link_only || self.deps.defs.is_free(spec.code) {
            self.open_portal(user, pending.kind).await;
            return Ok(());
        }

        let def = match self.deps.defs.get_or_fetch(self.deps.tickets.as_ref(), spec.code).await {
            Ok(def) => def,
            Err(e) => {
                warn!(user = %user, code = spec.code, error = %e, "definition fetch failed");
                self.say(user, "The ticket system is unavailable right now; please try again later.").await;
                return Ok(());
            }
        };

        let form = map_to_form(&def, &pending);
        match self
            .deps
            .tickets
            .create_ticket(spec.code, &form, &pending.artifacts)
            .await
        {
            Ok(instance) => {
                counter!("clerk_tickets_created").increment(1);
                let comment = admin_comment(pending.kind, &pending.fields);
                info!(user = %user, kind = pending.kind.slug(), instance = %instance.instance_id, "ticket filed");
                let _ = self.deps.store.delete(user);
                self.deps.store.clear_window(user);
                self.say(
                    user,
                    &format!(
                        "Done. {} ticket {} is filed. Note passed to the approver: {}",
                        spec.title, instance.instance_id, comment
                    ),
                )
                .await;
            }
            Err(e) => {
                counter!("clerk_tickets_failed").increment(1);
                // The cached definition may be stale; re-fetch next time.
                self.deps.defs.invalidate(spec.code);
                self.deps.store.clear_window(user);
                if e.api_code() == Some(FREE_PROCESS_CODE) {
                    self.deps.defs.mark_free(spec.code);
                    self.open_portal(user, pending.kind).await;
                } else {
                    warn!(user = %user, code = spec.code, error = %e, "ticket creation failed");
                    // The redeemed token is gone; hand out a fresh card so
                    // the retry does not land on "already submitted".
                    self.say(user, "Filing the ticket failed on the backend side. Here is a fresh confirmation; press confirm to retry in a few minutes.").await;
                    send_confirmation(
                        &self.deps,
                        user,
                        pending.kind,
                        pending.fields.clone(),
                        pending.artifacts.clone(),
                        now,
                    )
                    .await;
                }
            }
        }
        Ok(())
    }

    async fn open_portal(&self, user: &UserId, kind: TicketKind) {
        let spec = kind.spec();
        let _ = self.deps.store.delete(user);
        self.deps.store.clear_window(user);
        self.deps
            .notifier
            .send(
                user,
                OutboundMessage::OpenExternally {
                    text: format!("{} requests are filed in the portal directly.", spec.title),
                    url: portal_link(&self.deps.portal_base, spec.code),
                },
            )
            .await;
    }

    async fn say(&self, user: &UserId, text: &str) {
        self.deps
            .notifier
            .send(user, OutboundMessage::Notice { text: text.to_string() })
            .await;
    }
}

/// Map finalized fields onto the backend's form layout. Definition fields
/// are matched by canonical label alias first, then by wire id, then by the
/// canonical id itself; unmatched definition fields are left out.
#[must_use]
pub fn map_to_form(def: &FormDefinition, pending: &PendingConfirmation) -> Vec<FormField> {
    let spec = pending.kind.spec();
    let lookup = |fields: &FieldMap, def_id: &str, def_name: &str| {
        if let Some(id) = canonical_field_id(def_name) {
            if let Some(v) = fields.get(id) {
                return Some(v.clone());
            }
        }
        if let Some(field) = spec.fields.iter().find(|f| f.wire_id == Some(def_id)) {
            if let Some(v) = fields.get(field.id) {
                return Some(v.clone());
            }
        }
        fields.get(def_id).cloned()
    };

    def.fields
        .iter()
        .filter_map(|f| {
            let value = lookup(&pending.fields, &f.id, &f.name)?;
            Some(FormField {
                id: f.id.clone(),
                value: serde_json::to_value(&value).unwrap_or(serde_json::Value::Null),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clerk_clients::ticket::FormFieldDef;
    use clerk_core::fields::FieldValue;

    fn def_field(id: &str, name: &str) -> FormFieldDef {
        FormFieldDef {
            id: id.to_string(),
            name: name.to_string(),
            kind: "input".to_string(),
            options: vec![],
        }
    }

    fn pending(kind: TicketKind, fields: &[(&str, &str)]) -> PendingConfirmation {
        PendingConfirmation {
            token: ConfirmToken::generate(),
            user: "u1".into(),
            kind,
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), FieldValue::Text((*v).to_string())))
                .collect(),
            artifacts: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn maps_by_label_alias() {
        let def = FormDefinition {
            fields: vec![def_field("w1", "Total Amount"), def_field("w2", "Buyer Name")],
            approval_nodes: 1,
        };
        let p = pending(TicketKind::Invoice, &[("amount", "1200"), ("buyer_name", "Acme")]);
        let form = map_to_form(&def, &p);
        assert_eq!(form.len(), 2);
        assert_eq!(form[0].id, "w1");
        assert_eq!(form[0].value, serde_json::json!("1200"));
    }

    #[test]
    fn maps_by_wire_id_when_label_is_foreign() {
        let def = FormDefinition {
            fields: vec![def_field("total_amount", "合计")],
            approval_nodes: 1,
        };
        let p = pending(TicketKind::Invoice, &[("amount", "900")]);
        let form = map_to_form(&def, &p);
        assert_eq!(form.len(), 1);
        assert_eq!(form[0].id, "total_amount");
    }

    #[test]
    fn maps_by_matching_canonical_id() {
        let def = FormDefinition {
            fields: vec![def_field("leave_type", "请假类型")],
            approval_nodes: 1,
        };
        let p = pending(TicketKind::Leave, &[("leave_type", "annual")]);
        let form = map_to_form(&def, &p);
        assert_eq!(form.len(), 1);
    }

    #[test]
    fn unmatched_definition_fields_are_skipped() {
        let def = FormDefinition {
            fields: vec![def_field("w9", "Shoe Size")],
            approval_nodes: 1,
        };
        let p = pending(TicketKind::Leave, &[("leave_type", "annual")]);
        assert!(map_to_form(&def, &p).is_empty());
    }
}
