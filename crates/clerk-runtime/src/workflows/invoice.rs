//! Invoice flow: two document roles plus user-supplied fields.
//!
//! A settlement sheet and a contract must both arrive before the flow asks
//! for the fields only the user can supply (invoice type, line items).
//! Document role is decided by filename keywords first and content signals
//! second; a re-upload of the same role replaces the earlier file.

use crate::classify::{ParseOutcome, classify_intent, extract_document_fields};
use crate::deps::RouterDeps;
use crate::merge::{merge_into, missing_fields};
use crate::workflows::{prompt_for_missing, send_confirmation};
use chrono::Utc;
use clerk_core::catalog::TicketKind;
use clerk_core::errors::ClerkError;
use clerk_core::events::OutboundMessage;
use clerk_core::fields::{FieldMap, FieldSource};
use clerk_core::ids::{ArtifactId, UserId};
use clerk_clients::error::ClientError;
use clerk_store::session::{BatchedFile, InvoiceStage, Workflow};
use std::sync::Arc;
use tracing::{debug, warn};

/// Prompt sent when an invoice request is classified before any document.
pub const UPLOAD_PROMPT: &str =
    "To issue the invoice I need two documents: the settlement sheet and the contract. Please upload both.";

/// Which slot a document fills.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DocumentRole {
    /// Settlement sheet or statement.
    Settlement,
    /// Contract or agreement.
    Contract,
}

impl DocumentRole {
    fn label(self) -> &'static str {
        match self {
            Self::Settlement => "settlement sheet",
            Self::Contract => "contract",
        }
    }
}

/// Decide a document's role from its filename, falling back to the fields
/// inferred from its content.
#[must_use]
pub fn classify_role(display_name: &str, inferred: &FieldMap) -> DocumentRole {
    let name = display_name.to_ascii_lowercase();
    if name.contains("settlement") || name.contains("statement") {
        return DocumentRole::Settlement;
    }
    if name.contains("contract") || name.contains("agreement") {
        return DocumentRole::Contract;
    }
    if inferred.contains_key("settlement_no") || inferred.contains_key("amount") {
        return DocumentRole::Settlement;
    }
    if inferred.contains_key("contract_no")
        || inferred.contains_key("buyer_name")
        || inferred.contains_key("tax_id")
    {
        return DocumentRole::Contract;
    }
    DocumentRole::Settlement
}

/// The invoice workflow.
#[derive(Clone)]
pub struct InvoiceFlow {
    deps: Arc<RouterDeps>,
}

impl InvoiceFlow {
    /// Flow over the shared collaborators.
    #[must_use]
    pub fn new(deps: Arc<RouterDeps>) -> Self {
        Self { deps }
    }

    /// Ingest one uploaded file into the collection.
    pub async fn on_file(
        &self,
        user: &UserId,
        chat_artifact: &ArtifactId,
        display_name: &str,
    ) -> Result<(), ClerkError> {
        let bytes = self
            .deps
            .docs
            .download(chat_artifact)
            .await
            .map_err(|e| e.into_clerk("docs"))?;

        let stored = match self.deps.docs.upload(display_name, &bytes).await {
            Ok(stored) => stored,
            Err(ClientError::Oversize { size, limit }) => {
                warn!(user = %user, display_name, size, limit, "oversize file skipped");
                self.say(
                    user,
                    format!("{display_name} is too large to attach, so I skipped it."),
                )
                .await;
                return Ok(());
            }
            Err(e) => return Err(e.into_clerk("docs")),
        };

        self.attach_stored(
            user,
            BatchedFile {
                artifact: stored,
                display_name: display_name.to_string(),
            },
        )
        .await
    }

    /// Slot an already-stored file into the collection, extracting its
    /// fields first.
    pub async fn attach_stored(&self, user: &UserId, file: BatchedFile) -> Result<(), ClerkError> {
        let spec = TicketKind::Invoice.spec();

        // Inference outside the lock; best-effort.
        let inferred = match self.infer_file_fields(&file).await {
            Ok(inferred) => inferred,
            Err(e) => {
                warn!(user = %user, file = %file.display_name, error = %e, "invoice document inference failed");
                FieldMap::new()
            }
        };
        let role = classify_role(&file.display_name, &inferred);
        debug!(user = %user, file = %file.display_name, ?role, "invoice document classified");

        let now = Utc::now();
        let snapshot = self.deps.store.update(user, now, |s| {
            let Workflow::InvoiceCollection(collection) = &mut s.workflow else {
                return None;
            };
            match role {
                DocumentRole::Settlement => collection.settlement = Some(file.clone()),
                DocumentRole::Contract => collection.contract = Some(file.clone()),
            }
            merge_into(&mut collection.fields, &inferred, FieldSource::Document, spec);
            if collection.documents_complete() {
                collection.stage = InvoiceStage::AwaitingUserFields;
            }
            s.generation += 1;
            Some(collection.clone())
        });

        let Some(Some(collection)) = snapshot else {
            // Collection gone (swept or superseded); nothing owns the file.
            self.say(
                user,
                "I wasn't collecting invoice documents any more; please start the request again."
                    .to_string(),
            )
            .await;
            return Ok(());
        };

        if collection.documents_complete() {
            let user_missing: Vec<String> = spec
                .fields
                .iter()
                .filter(|f| f.user_supplied && f.required && collection.fields.get(f.id).is_none())
                .map(|f| f.id.to_string())
                .collect();
            if user_missing.is_empty() {
                self.try_complete(user).await;
            } else {
                self.say(
                    user,
                    format!(
                        "Both documents received. {}",
                        prompt_for_missing(TicketKind::Invoice, &user_missing)
                    ),
                )
                .await;
            }
        } else {
            let waiting = match role {
                DocumentRole::Settlement => DocumentRole::Contract,
                DocumentRole::Contract => DocumentRole::Settlement,
            };
            self.say(
                user,
                format!(
                    "Got {} as the {}. Still waiting for the {}.",
                    file.display_name,
                    role.label(),
                    waiting.label()
                ),
            )
            .await;
        }
        Ok(())
    }

    /// Handle text while the collection is open.
    pub async fn on_text(&self, user: &UserId, text: &str) -> Result<(), ClerkError> {
        let now = Utc::now();
        let Some(session) = self.deps.store.get(user, now) else {
            return Ok(());
        };
        let Workflow::InvoiceCollection(collection) = session.workflow else {
            return Ok(());
        };

        if collection.stage == InvoiceStage::AwaitingDocuments {
            // Field talk before both documents are in is remembered via the
            // conversation window but does not advance the flow.
            self.say(
                user,
                "Noted. I still need the documents before I can fill in the rest.".to_string(),
            )
            .await;
            return Ok(());
        }

        let spec = TicketKind::Invoice.spec();
        let history = self.deps.store.history(user);
        let result = match classify_intent(self.deps.ai.as_ref(), &history, text).await? {
            ParseOutcome::Parsed(result) => result,
            ParseOutcome::Failed { reason } => {
                let reply = super::clarification_failed(&self.deps, user, &reason);
                self.say(user, reply).await;
                return Ok(());
            }
        };
        let _ = self.deps.store.update(user, now, |s| {
            if let Workflow::InvoiceCollection(collection) = &mut s.workflow {
                merge_into(&mut collection.fields, &result.fields, FieldSource::Conversation, spec);
            }
        });
        self.try_complete(user).await;
        Ok(())
    }

    /// If every required field is in, issue the confirmation; otherwise
    /// prompt for what is left.
    async fn try_complete(&self, user: &UserId) {
        let now = Utc::now();
        let Some(session) = self.deps.store.get(user, now) else {
            return;
        };
        let Workflow::InvoiceCollection(collection) = session.workflow else {
            return;
        };
        let spec = TicketKind::Invoice.spec();

        let missing = missing_fields(spec, &collection.fields);
        if missing.is_empty() {
            let artifacts: Vec<ArtifactId> = [&collection.settlement, &collection.contract]
                .into_iter()
                .flatten()
                .map(|f| f.artifact.clone())
                .collect();
            send_confirmation(
                &self.deps,
                user,
                TicketKind::Invoice,
                collection.fields.finalize(),
                artifacts,
                now,
            )
            .await;
        } else {
            self.say(user, prompt_for_missing(TicketKind::Invoice, &missing)).await;
        }
    }

    async fn infer_file_fields(&self, file: &BatchedFile) -> Result<FieldMap, ClerkError> {
        let bytes = self
            .deps
            .docs
            .download(&file.artifact)
            .await
            .map_err(|e| e.into_clerk("docs"))?;
        let text = self
            .deps
            .text
            .extract_text(&file.display_name, &bytes)
            .await
            .map_err(|e| e.into_clerk("text"))?;
        extract_document_fields(
            self.deps.ai.as_ref(),
            TicketKind::Invoice.spec(),
            &file.display_name,
            &text,
        )
        .await
    }

    async fn say(&self, user: &UserId, text: String) {
        self.deps
            .notifier
            .send(user, OutboundMessage::Notice { text })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clerk_core::fields::FieldValue;

    fn map(pairs: &[(&str, &str)]) -> FieldMap {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), FieldValue::Text((*v).to_string())))
            .collect()
    }

    #[test]
    fn filename_keywords_win() {
        assert_eq!(
            classify_role("Q3-settlement.xlsx", &FieldMap::new()),
            DocumentRole::Settlement
        );
        assert_eq!(
            classify_role("sales_contract.pdf", &FieldMap::new()),
            DocumentRole::Contract
        );
        assert_eq!(
            classify_role("framework-agreement.docx", &FieldMap::new()),
            DocumentRole::Contract
        );
    }

    #[test]
    fn content_signals_break_filename_ties() {
        assert_eq!(
            classify_role("scan001.pdf", &map(&[("buyer_name", "Acme"), ("tax_id", "91")])),
            DocumentRole::Contract
        );
        assert_eq!(
            classify_role("scan002.pdf", &map(&[("amount", "1200")])),
            DocumentRole::Settlement
        );
    }

    #[test]
    fn unknowable_documents_default_to_settlement() {
        assert_eq!(
            classify_role("scan003.pdf", &FieldMap::new()),
            DocumentRole::Settlement
        );
    }
}
