//! Seal flow: debounced file batching, per-file selections, aggregation.
//!
//! Files arrive one webhook each even when shared together, so the batch is
//! closed by a debounce timer: two seconds after the first file, extended to
//! eight after each later one. The timer carries only the user id and the
//! generation it saw; if the session advanced by the time it fires, it does
//! nothing.

use crate::classify::{ParseOutcome, classify_intent, extract_document_fields};
use crate::deps::RouterDeps;
use crate::merge::{aggregate_field, merge_into};
use crate::workflows::{prompt_for_missing, send_confirmation};
use chrono::Utc;
use clerk_core::catalog::{TicketKind, TicketSpec, admin_comment};
use clerk_core::constants::{BATCH_DEBOUNCE_MS, FIRST_FILE_DEBOUNCE_MS};
use clerk_core::errors::ClerkError;
use clerk_core::events::{Button, ButtonGroup, OutboundMessage};
use clerk_core::fields::{FieldSource, FieldValue, MergedFields};
use clerk_core::ids::{ArtifactId, UserId};
use clerk_clients::error::ClientError;
use clerk_store::session::{
    BatchedFile, SealBatch, SealChoices, SealFileState, Session, Workflow,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Prompt sent when a seal request is classified before any file arrived.
pub const UPLOAD_PROMPT: &str =
    "Please upload the document(s) that need the seal. Send them all; I'll batch them up.";

/// Whether every file has every explicit field answered by a button press.
fn selections_complete(spec: &TicketSpec, choices: &SealChoices) -> bool {
    choices.files.iter().all(|f| {
        spec.explicit_fields().all(|ef| {
            f.fields
                .get(ef.id)
                .is_some_and(|v| v.source == FieldSource::Selection)
        })
    })
}

/// The seal workflow.
#[derive(Clone)]
pub struct SealFlow {
    deps: Arc<RouterDeps>,
}

impl SealFlow {
    /// Flow over the shared collaborators.
    #[must_use]
    pub fn new(deps: Arc<RouterDeps>) -> Self {
        Self { deps }
    }

    /// Ingest one uploaded file into the user's batch, starting a batch if
    /// none is active.
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
        .await;
        Ok(())
    }

    /// Append an already-stored file to the batch and rearm the debounce
    /// timer.
    pub async fn attach_stored(&self, user: &UserId, file: BatchedFile) {
        let now = Utc::now();
        let committed = self.deps.store.update(user, now, |s| {
            if let Workflow::SealBatch(batch) = &mut s.workflow {
                batch.files.push(file.clone());
                s.generation += 1;
                Some((s.generation, batch.files.len()))
            } else {
                None
            }
        });

        let (generation, count) = match committed.flatten() {
            Some(out) => out,
            None => {
                // No live batch (swept, or different workflow replaced it);
                // open a fresh one.
                let mut session = Session::new(
                    user.clone(),
                    Workflow::SealBatch(SealBatch {
                        files: vec![file],
                        conversation_fields: MergedFields::new(),
                    }),
                    now,
                );
                session.generation = 1;
                self.deps.store.insert(session);
                (1, 1)
            }
        };

        let delay = if count == 1 {
            Duration::from_millis(FIRST_FILE_DEBOUNCE_MS)
        } else {
            Duration::from_millis(BATCH_DEBOUNCE_MS)
        };
        debug!(user = %user, count, generation, delay_ms = delay.as_millis() as u64, "batch debounce armed");

        let flow = self.clone();
        let timer_user = user.clone();
        self.deps.store.set_timer(
            user,
            clerk_core::timer::schedule(delay, move || async move {
                flow.process_batch(&timer_user, generation).await;
            }),
        );
    }

    /// Close the batch seen at `generation`: extract per-file fields and move
    /// to the selection phase. Fires from the debounce timer or a finish
    /// command; a stale generation means the batch changed and the call is a
    /// no-op.
    pub async fn process_batch(&self, user: &UserId, generation: u64) {
        let now = Utc::now();
        let Some(session) = self.deps.store.get(user, now) else {
            return;
        };
        if session.generation != generation {
            debug!(user = %user, seen = generation, current = session.generation, "stale batch timer");
            return;
        }
        let Workflow::SealBatch(batch) = session.workflow else {
            return;
        };
        if batch.files.is_empty() {
            return;
        }

        // Per-file inference happens outside the lock.
        let spec = TicketKind::SealUsage.spec();
        let mut files = Vec::with_capacity(batch.files.len());
        for file in &batch.files {
            let mut fields = MergedFields::new();
            fields.set(
                "document_name",
                FieldValue::Text(file.display_name.clone()),
                FieldSource::Document,
            );
            match self.infer_file_fields(file).await {
                Ok(inferred) => merge_into(&mut fields, &inferred, FieldSource::Document, spec),
                Err(e) => {
                    // Inference is best-effort; the user still gets buttons.
                    warn!(user = %user, file = %file.display_name, error = %e, "file inference failed");
                }
            }
            files.push(SealFileState { file: file.clone(), fields });
        }

        // Commit only if the batch is still the one we snapshotted.
        let committed = self.deps.store.update(user, now, |s| {
            if s.generation != generation {
                return false;
            }
            if !matches!(s.workflow, Workflow::SealBatch(_)) {
                return false;
            }
            s.workflow = Workflow::SealChoices(SealChoices {
                files: files.clone(),
                shared: batch.conversation_fields.clone(),
            });
            s.generation += 1;
            true
        });
        if committed != Some(true) {
            debug!(user = %user, "batch advanced during inference; discarding");
            return;
        }

        self.send_choice_matrix(user, &files).await;
    }

    async fn infer_file_fields(
        &self,
        file: &BatchedFile,
    ) -> Result<clerk_core::fields::FieldMap, ClerkError> {
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
            TicketKind::SealUsage.spec(),
            &file.display_name,
            &text,
        )
        .await
    }

    async fn send_choice_matrix(&self, user: &UserId, files: &[SealFileState]) {
        let spec = TicketKind::SealUsage.spec();
        let mut groups = Vec::new();
        for (row, state) in files.iter().enumerate() {
            for field in spec.explicit_fields() {
                groups.push(ButtonGroup {
                    field: field.id.to_string(),
                    label: format!("{} — {}", state.file.display_name, field.label),
                    row: Some(row),
                    buttons: field
                        .options
                        .iter()
                        .map(|value| Button {
                            action: "choose".to_string(),
                            field: field.id.to_string(),
                            value: (*value).to_string(),
                            row: Some(row),
                        })
                        .collect(),
                });
            }
        }
        self.deps
            .notifier
            .send(
                user,
                OutboundMessage::Options {
                    prompt: format!(
                        "Received {} file(s). For each one, choose:",
                        files.len()
                    ),
                    groups,
                },
            )
            .await;
    }

    /// Record one button press from the selection matrix. When every file
    /// has every required selection, finalize and send the confirmation.
    pub async fn on_choice(
        &self,
        user: &UserId,
        field_id: &str,
        value: &str,
        row: usize,
    ) -> Result<(), ClerkError> {
        let now = Utc::now();
        let spec = TicketKind::SealUsage.spec();
        let Some(field) = spec.field(field_id).filter(|f| f.must_be_explicit) else {
            warn!(user = %user, field_id, "choice for a non-selectable field");
            return Ok(());
        };
        if !field.accepts(&FieldValue::Text(value.to_string())) {
            warn!(user = %user, field_id, value, "choice outside the option set");
            return Ok(());
        }

        let complete = self.deps.store.update(user, now, |s| {
            let Workflow::SealChoices(choices) = &mut s.workflow else {
                return None;
            };
            let state = choices.files.get_mut(row)?;
            state
                .fields
                .set(field_id, FieldValue::Text(value.to_string()), FieldSource::Selection);

            selections_complete(spec, choices).then(|| choices.clone())
        });

        if let Some(Some(choices)) = complete {
            self.finalize(user, &choices).await;
        }
        Ok(())
    }

    /// End the batch now (finish command). Bumps the generation so the
    /// pending debounce timer goes stale, then processes immediately.
    pub async fn finish_now(&self, user: &UserId) {
        let now = Utc::now();
        if let Some(generation) = self.deps.store.bump_generation(user, now) {
            self.deps.store.clear_timer(user);
            self.process_batch(user, generation).await;
        }
    }

    /// Stash conversational context (an admin note, document details) given
    /// while the batch is open.
    pub async fn on_text(&self, user: &UserId, text: &str) -> Result<(), ClerkError> {
        let now = Utc::now();
        let history = self.deps.store.history(user);
        let spec = TicketKind::SealUsage.spec();
        let result = match classify_intent(self.deps.ai.as_ref(), &history, text).await? {
            ParseOutcome::Parsed(result) => result,
            ParseOutcome::Failed { reason } => {
                let reply = super::clarification_failed(&self.deps, user, &reason);
                self.say(user, reply).await;
                return Ok(());
            }
        };

        let ready = self.deps.store.update(user, now, |s| match &mut s.workflow {
            Workflow::SealBatch(batch) => {
                merge_into(
                    &mut batch.conversation_fields,
                    &result.fields,
                    FieldSource::Conversation,
                    spec,
                );
                None
            }
            Workflow::SealChoices(choices) => {
                merge_into(&mut choices.shared, &result.fields, FieldSource::Conversation, spec);
                selections_complete(spec, choices).then(|| choices.clone())
            }
            _ => None,
        });

        // Selections were already complete, so this text may have supplied a
        // field the earlier finalize attempt found missing.
        if let Some(Some(choices)) = ready {
            self.finalize(user, &choices).await;
            return Ok(());
        }

        self.say(
            user,
            "Noted. Send more files, press the buttons above, or say \"done\" when finished."
                .to_string(),
        )
        .await;
        Ok(())
    }

    async fn finalize(&self, user: &UserId, choices: &SealChoices) {
        let now = Utc::now();
        let spec = TicketKind::SealUsage.spec();

        let mut fields = clerk_core::fields::FieldMap::new();
        for field in spec.fields {
            let per_file: Vec<(&str, &FieldValue)> = choices
                .files
                .iter()
                .filter_map(|f| {
                    f.fields
                        .get(field.id)
                        .map(|v| (f.file.display_name.as_str(), &v.value))
                })
                .collect();
            if let Some(value) = aggregate_field(&per_file) {
                let _ = fields.insert(field.id.to_string(), value);
            } else if let Some(shared) = choices.shared.get(field.id) {
                let _ = fields.insert(field.id.to_string(), shared.value.clone());
            }
        }

        // Inference is best-effort, so a required field may still be absent
        // even with every button pressed. Ask rather than confirm a form with
        // holes in it.
        let missing: Vec<String> = spec
            .required_fields()
            .filter(|f| !fields.get(f.id).is_some_and(|v| !v.is_empty()))
            .map(|f| f.id.to_string())
            .collect();
        if !missing.is_empty() {
            debug!(user = %user, ?missing, "seal batch incomplete after selections");
            self.say(user, prompt_for_missing(TicketKind::SealUsage, &missing)).await;
            return;
        }

        let comment = admin_comment(TicketKind::SealUsage, &fields);
        info!(user = %user, files = choices.files.len(), comment, "seal batch finalized");

        let artifacts: Vec<ArtifactId> = choices
            .files
            .iter()
            .map(|f| f.file.artifact.clone())
            .collect();
        send_confirmation(&self.deps, user, TicketKind::SealUsage, fields, artifacts, now).await;
    }

    async fn say(&self, user: &UserId, text: String) {
        self.deps
            .notifier
            .send(user, OutboundMessage::Notice { text })
            .await;
    }
}
