//! Inbound event routing.
//!
//! Order of checks for every event: dedup, rate gate, then dispatch to the
//! workflow that owns the user's session. Exemptions from the rate gate are
//! decided here: file uploads always pass (multi-file shares arrive in a
//! burst), and batch finish commands pass while a seal batch is open.
//!
//! The router never propagates errors to the transport; every failure path
//! ends in a user-facing notice and a log line.

use crate::deps::RouterDeps;
use crate::gate::ConfirmGate;
use crate::workflows::generic::GenericFlow;
use crate::workflows::invoice::InvoiceFlow;
use crate::workflows::seal::SealFlow;
use crate::workflows::{is_cancel, is_finish};
use chrono::Utc;
use clerk_core::catalog::TicketKind;
use clerk_core::constants::FILE_INTENT_PROMPT_MS;
use clerk_core::errors::ClerkError;
use clerk_core::events::{Button, ButtonGroup, InboundEvent, OutboundMessage};
use clerk_core::ids::{ArtifactId, ConfirmToken, UserId};
use clerk_store::session::{FileIntentUnclear, Session, Workflow};
use clerk_store::store::SessionStore;
use clerk_store::window::Role;
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// The event router.
#[derive(Clone)]
pub struct EventRouter {
    deps: Arc<RouterDeps>,
    generic: GenericFlow,
    seal: SealFlow,
    invoice: InvoiceFlow,
    gate: ConfirmGate,
}

impl EventRouter {
    /// Build the router and its workflows over one collaborator bundle.
    #[must_use]
    pub fn new(deps: Arc<RouterDeps>) -> Self {
        Self {
            generic: GenericFlow::new(deps.clone()),
            seal: SealFlow::new(deps.clone()),
            invoice: InvoiceFlow::new(deps.clone()),
            gate: ConfirmGate::new(deps.clone()),
            deps,
        }
    }

    /// The shared store, for embedding code that owns the router.
    #[must_use]
    pub fn store(&self) -> &SessionStore {
        &self.deps.store
    }

    /// Handle one inbound event end to end.
    #[instrument(skip_all, fields(event_id = %event.event_id(), user = %event.user()))]
    pub async fn handle(&self, event: InboundEvent) {
        let now = Utc::now();
        if !self.deps.store.observe_event(event.event_id(), now) {
            return;
        }

        let user = event.user().clone();
        let exempt = self.rate_exempt(&event, &user);
        if !self.deps.store.allow(&user, now, exempt) {
            self.say(&user, "You're sending messages too quickly; give me a second.").await;
            return;
        }

        counter!("clerk_events_handled").increment(1);
        let result = match event {
            InboundEvent::Text { text, .. } => {
                self.deps.store.push_turn(&user, Role::User, &text, now);
                self.on_text(&user, &text).await
            }
            InboundEvent::File { artifact, display_name, .. } => {
                self.on_file(&user, &artifact, &display_name).await
            }
            InboundEvent::Button { action, payload, .. } => {
                self.on_button(&user, &action, &payload).await
            }
        };

        if let Err(e) = result {
            error!(user = %user, error = %e, "event handling failed");
            counter!("clerk_events_failed").increment(1);
            self.say(
                &user,
                "Something went wrong talking to a backing service. Please try again in a moment.",
            )
            .await;
        }
    }

    /// File uploads and button presses are always exempt (multi-file shares
    /// and selection matrices arrive in bursts by design); finish commands
    /// are exempt while a seal batch is open so the closing "done" is never
    /// throttled.
    fn rate_exempt(&self, event: &InboundEvent, user: &UserId) -> bool {
        match event {
            InboundEvent::File { .. } | InboundEvent::Button { .. } => true,
            InboundEvent::Text { text, .. } if is_finish(text) => self
                .deps
                .store
                .get(user, Utc::now())
                .is_some_and(|s| matches!(s.workflow, Workflow::SealBatch(_))),
            _ => false,
        }
    }

    // ── Text ─────────────────────────────────────────────────────────────

    async fn on_text(&self, user: &UserId, text: &str) -> Result<(), ClerkError> {
        let now = Utc::now();
        let session = self.deps.store.get(user, now);

        if is_cancel(text) && session.is_some() {
            let _ = self.deps.store.delete(user);
            self.say(user, "Cancelled. Nothing was filed.").await;
            return Ok(());
        }

        match session.map(|s| s.workflow) {
            Some(Workflow::SealBatch(_)) => {
                if is_finish(text) {
                    self.seal.finish_now(user).await;
                    Ok(())
                } else {
                    self.seal.on_text(user, text).await
                }
            }
            Some(Workflow::SealChoices(_)) => self.seal.on_text(user, text).await,
            Some(Workflow::InvoiceCollection(_)) => self.invoice.on_text(user, text).await,
            Some(Workflow::FileIntentUnclear(_)) => self.on_intent_text(user, text).await,
            Some(Workflow::GenericPending(pending)) => {
                self.generic.on_text(user, text, Some(pending)).await
            }
            None => self.generic.on_text(user, text, None).await,
        }
    }

    /// Text while unattributed files are stashed: route on an explicit
    /// mention, re-prompt otherwise.
    async fn on_intent_text(&self, user: &UserId, text: &str) -> Result<(), ClerkError> {
        let lower = text.to_ascii_lowercase();
        if lower.contains("seal") {
            return self.route_stashed_files(user, TicketKind::SealUsage).await;
        }
        if lower.contains("invoice") {
            return self.route_stashed_files(user, TicketKind::Invoice).await;
        }
        // An unrecognized answer gets the options card directly; the pending
        // timer then has nothing left to ask.
        let _ = self.deps.store.update(user, Utc::now(), |s| {
            if let Workflow::FileIntentUnclear(stash) = &mut s.workflow {
                stash.prompt_sent = true;
            }
        });
        self.send_destination_prompt(user).await;
        Ok(())
    }

    // ── Files ────────────────────────────────────────────────────────────

    async fn on_file(
        &self,
        user: &UserId,
        artifact: &ArtifactId,
        display_name: &str,
    ) -> Result<(), ClerkError> {
        let now = Utc::now();
        match self.deps.store.get(user, now).map(|s| s.workflow) {
            Some(Workflow::SealBatch(_)) => self.seal.on_file(user, artifact, display_name).await,
            Some(Workflow::InvoiceCollection(_)) => {
                self.invoice.on_file(user, artifact, display_name).await
            }
            Some(Workflow::FileIntentUnclear(_)) => {
                self.stash_file(user, artifact, display_name).await
            }
            Some(Workflow::SealChoices(_)) => {
                // The selection matrix is already out; a new batch would
                // orphan it.
                self.say(
                    user,
                    "Finish the choices above (or say \"cancel\") before sending more files.",
                )
                .await;
                Ok(())
            }
            Some(Workflow::GenericPending(pending)) => {
                info!(user = %user, kind = pending.kind.slug(), "file during a text collection");
                self.say(
                    user,
                    "Let's finish the current request first; say \"cancel\" to drop it and start over with the files.",
                )
                .await;
                Ok(())
            }
            None => self.stash_file(user, artifact, display_name).await,
        }
    }

    /// Hold an unattributed file. The first file of a stash arms a
    /// three-minute timer; if no clarifying text or button arrives before it
    /// fires, the user is asked once where the files should go.
    async fn stash_file(
        &self,
        user: &UserId,
        chat_artifact: &ArtifactId,
        display_name: &str,
    ) -> Result<(), ClerkError> {
        let now = Utc::now();
        let bytes = self
            .deps
            .docs
            .download(chat_artifact)
            .await
            .map_err(|e| e.into_clerk("docs"))?;
        let stored = self
            .deps
            .docs
            .upload(display_name, &bytes)
            .await
            .map_err(|e| e.into_clerk("docs"))?;
        let file = clerk_store::session::BatchedFile {
            artifact: stored,
            display_name: display_name.to_string(),
        };

        let appended = self.deps.store.update(user, now, |s| {
            if let Workflow::FileIntentUnclear(stash) = &mut s.workflow {
                stash.files.push(file.clone());
                true
            } else {
                false
            }
        });
        if appended != Some(true) {
            let session = Session::new(
                user.clone(),
                Workflow::FileIntentUnclear(FileIntentUnclear {
                    files: vec![file],
                    prompt_sent: false,
                }),
                now,
            );
            let generation = session.generation;
            self.deps.store.insert(session);

            let router = self.clone();
            let timer_user = user.clone();
            self.deps.store.set_timer(
                user,
                clerk_core::timer::schedule(
                    Duration::from_millis(FILE_INTENT_PROMPT_MS),
                    move || async move {
                        router.prompt_for_destination(&timer_user, generation).await;
                    },
                ),
            );
        }
        Ok(())
    }

    /// Timer body for a stash that got no clarifying text.
    async fn prompt_for_destination(&self, user: &UserId, generation: u64) {
        if self.deps.store.mark_stash_prompted(user, generation, Utc::now()) {
            self.send_destination_prompt(user).await;
        }
    }

    async fn send_destination_prompt(&self, user: &UserId) {
        let buttons = [TicketKind::SealUsage, TicketKind::Invoice]
            .into_iter()
            .map(|kind| Button {
                action: "route".to_string(),
                field: "destination".to_string(),
                value: kind.slug().to_string(),
                row: None,
            })
            .collect();
        self.deps
            .notifier
            .send(
                user,
                OutboundMessage::Options {
                    prompt: "What are these files for? If I don't hear back in a few minutes I'll discard them.".to_string(),
                    groups: vec![ButtonGroup {
                        field: "destination".to_string(),
                        label: "Destination".to_string(),
                        row: None,
                        buttons,
                    }],
                },
            )
            .await;
    }

    /// Move stashed files into the chosen workflow.
    async fn route_stashed_files(
        &self,
        user: &UserId,
        kind: TicketKind,
    ) -> Result<(), ClerkError> {
        let now = Utc::now();
        let files = self.deps.store.update(user, now, |s| {
            if let Workflow::FileIntentUnclear(stash) = &mut s.workflow {
                Some(std::mem::take(&mut stash.files))
            } else {
                None
            }
        });
        let Some(Some(files)) = files else {
            self.say(user, "Those files are gone; please send them again.").await;
            return Ok(());
        };
        info!(user = %user, kind = kind.slug(), count = files.len(), "routing stashed files");

        match kind {
            TicketKind::SealUsage => {
                self.deps.store.insert(Session::new(
                    user.clone(),
                    Workflow::SealBatch(clerk_store::session::SealBatch::default()),
                    now,
                ));
                for file in files {
                    self.seal.attach_stored(user, file).await;
                }
            }
            TicketKind::Invoice => {
                self.deps.store.insert(Session::new(
                    user.clone(),
                    Workflow::InvoiceCollection(clerk_store::session::InvoiceCollection::new()),
                    now,
                ));
                for file in files {
                    self.invoice.attach_stored(user, file).await?;
                }
            }
            _ => {
                self.say(user, "Files only make sense for seal or invoice requests.").await;
            }
        }
        Ok(())
    }

    // ── Buttons ──────────────────────────────────────────────────────────

    async fn on_button(
        &self,
        user: &UserId,
        action: &str,
        payload: &Value,
    ) -> Result<(), ClerkError> {
        match action {
            "confirm" => {
                let Some(token) = payload["token"].as_str() else {
                    warn!(user = %user, "confirm press without a token");
                    self.say(user, "That button looks broken; please start over.").await;
                    return Ok(());
                };
                self.gate.redeem(user, &ConfirmToken::new(token)).await
            }
            "choose" => {
                let field = payload["field"].as_str();
                let value = payload["value"].as_str();
                let row = payload["row"].as_u64();
                match (field, value, row) {
                    (Some(field), Some(value), Some(row)) => {
                        self.seal.on_choice(user, field, value, row as usize).await
                    }
                    _ => {
                        warn!(user = %user, %payload, "malformed choose payload");
                        self.say(user, "That button looks broken; use the newest card.").await;
                        Ok(())
                    }
                }
            }
            "route" => {
                match payload["value"].as_str().and_then(TicketKind::from_slug) {
                    Some(kind) => self.route_stashed_files(user, kind).await,
                    None => {
                        warn!(user = %user, %payload, "malformed route payload");
                        self.say(user, "That button looks broken; tell me in words instead.").await;
                        Ok(())
                    }
                }
            }
            other => {
                warn!(user = %user, action = other, "unknown button action");
                self.say(user, "I didn't understand that action.").await;
                Ok(())
            }
        }
    }

    async fn say(&self, user: &UserId, text: &str) {
        self.deps
            .notifier
            .send(user, OutboundMessage::Notice { text: text.to_string() })
            .await;
    }
}
