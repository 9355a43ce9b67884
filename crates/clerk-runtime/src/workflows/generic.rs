//! Generic single-turn flow: classify, collect, confirm.

use crate::classify::{IntentResult, ParseOutcome, classify_intent};
use crate::deps::RouterDeps;
use crate::merge::{merge_into, missing_fields};
use crate::workflows::{greeting, portal_link, prompt_for_missing, send_confirmation};
use crate::workflows::{invoice, seal};
use chrono::Utc;
use clerk_core::catalog::{FlowShape, TicketKind};
use clerk_core::errors::ClerkError;
use clerk_core::events::OutboundMessage;
use clerk_core::fields::{FieldSource, MergedFields};
use clerk_core::ids::UserId;
use clerk_store::session::{
    GenericPending, InvoiceCollection, SealBatch, Session, Workflow,
};
use std::sync::Arc;
use tracing::{debug, info};

/// Conversational entry point for text that no other workflow owns.
#[derive(Clone)]
pub struct GenericFlow {
    deps: Arc<RouterDeps>,
}

impl GenericFlow {
    /// Flow over the shared collaborators.
    #[must_use]
    pub fn new(deps: Arc<RouterDeps>) -> Self {
        Self { deps }
    }

    /// Handle a free-text message. `pending` is the user's current generic
    /// collection, if any.
    pub async fn on_text(
        &self,
        user: &UserId,
        text: &str,
        pending: Option<GenericPending>,
    ) -> Result<(), ClerkError> {
        let history = self.deps.store.history(user);
        let outcome = classify_intent(self.deps.ai.as_ref(), &history, text).await?;

        let result = match outcome {
            ParseOutcome::Parsed(result) => result,
            ParseOutcome::Failed { reason } => {
                return self.on_parse_failure(user, &reason).await;
            }
        };

        match result.kind {
            None => {
                let text = result
                    .unclear
                    .unwrap_or_else(greeting);
                self.say(user, text).await;
                Ok(())
            }
            Some(kind) => self.on_classified(user, kind, result, pending).await,
        }
    }

    async fn on_classified(
        &self,
        user: &UserId,
        kind: TicketKind,
        result: IntentResult,
        pending: Option<GenericPending>,
    ) -> Result<(), ClerkError> {
        let now = Utc::now();
        let spec = kind.spec();

        if spec.link_only {
            let _ = self.deps.store.delete(user);
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
            return Ok(());
        }

        // File-driven kinds classified from text alone: open the workflow
        // and ask for the documents.
        match spec.flow {
            FlowShape::SealMultiFile => {
                let mut batch = SealBatch::default();
                merge_into(&mut batch.conversation_fields, &result.fields, FieldSource::Conversation, spec);
                self.deps
                    .store
                    .insert(Session::new(user.clone(), Workflow::SealBatch(batch), now));
                self.say(user, seal::UPLOAD_PROMPT.to_string()).await;
                return Ok(());
            }
            FlowShape::InvoiceDualDoc => {
                let mut collection = InvoiceCollection::new();
                merge_into(&mut collection.fields, &result.fields, FieldSource::Conversation, spec);
                self.deps.store.insert(Session::new(
                    user.clone(),
                    Workflow::InvoiceCollection(collection),
                    now,
                ));
                self.say(user, invoice::UPLOAD_PROMPT.to_string()).await;
                return Ok(());
            }
            FlowShape::SingleTurn => {}
        }

        // Carry prior fields forward only when the kind is unchanged; a new
        // intent supersedes the old collection.
        let mut fields = match pending {
            Some(p) if p.kind == kind => p.fields,
            Some(p) => {
                info!(user = %user, old = p.kind.slug(), new = kind.slug(), "intent superseded");
                MergedFields::new()
            }
            None => MergedFields::new(),
        };
        merge_into(&mut fields, &result.fields, FieldSource::Conversation, spec);

        let missing = missing_fields(spec, &fields);
        if missing.is_empty() {
            debug!(user = %user, kind = kind.slug(), "collection complete");
            let final_fields = fields.finalize();
            self.deps.store.insert(Session::new(
                user.clone(),
                Workflow::GenericPending(GenericPending { kind, fields, missing }),
                now,
            ));
            send_confirmation(&self.deps, user, kind, final_fields, vec![], now).await;
        } else {
            let prompt = prompt_for_missing(kind, &missing);
            self.deps.store.insert(Session::new(
                user.clone(),
                Workflow::GenericPending(GenericPending { kind, fields, missing }),
                now,
            ));
            self.say(user, prompt).await;
        }
        Ok(())
    }

    async fn on_parse_failure(&self, user: &UserId, reason: &str) -> Result<(), ClerkError> {
        let text = super::clarification_failed(&self.deps, user, reason);
        self.say(user, text).await;
        Ok(())
    }

    async fn say(&self, user: &UserId, text: String) {
        self.deps
            .notifier
            .send(user, OutboundMessage::Notice { text })
            .await;
    }
}
