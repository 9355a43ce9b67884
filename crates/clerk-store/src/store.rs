//! The process-wide session store.
//!
//! One `parking_lot::Mutex` guards everything: sessions, timers, pending
//! confirmations, conversation windows, the dedup ledger, and the rate gate.
//! Every public method takes the lock, mutates, and returns; none of them
//! await or perform I/O. Callers that need network work snapshot state,
//! drop the lock, do the work, and commit through a second call that
//! re-validates the session's generation counter.
//!
//! Timestamps are always passed in by the caller so behavior is
//! deterministic under test.

use crate::confirm::{PendingConfirmation, RedeemError};
use crate::dedup::DedupLedger;
use crate::ratelimit::RateGate;
use crate::session::{Session, Workflow};
use crate::window::{ConversationWindow, Role, Turn};
use chrono::{DateTime, Utc};
use clerk_core::catalog::TicketKind;
use clerk_core::constants::{CONFIRM_TTL_SECS, CONSUMED_TTL_SECS, WINDOW_TTL_SECS};
use clerk_core::fields::FieldMap;
use clerk_core::ids::{ArtifactId, ConfirmToken, EventId, UserId};
use clerk_core::timer::TimerHandle;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, info};

/// A session removed by the TTL sweep. The caller notifies the user
/// outside the lock.
#[derive(Clone, Debug, PartialEq)]
pub struct ExpiryNotice {
    /// The session's owner.
    pub user: UserId,
    /// Workflow name at expiry, for logs and message wording.
    pub workflow: &'static str,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<UserId, Session>,
    timers: HashMap<UserId, TimerHandle>,
    confirmations: HashMap<ConfirmToken, PendingConfirmation>,
    consumed: HashMap<ConfirmToken, DateTime<Utc>>,
    windows: HashMap<UserId, ConversationWindow>,
    dedup: DedupLedger,
    rate: RateGate,
}

impl Inner {
    fn cancel_timer(&mut self, user: &UserId) {
        if let Some(handle) = self.timers.remove(user) {
            handle.cancel();
        }
    }

    fn remove_session(&mut self, user: &UserId) -> Option<Session> {
        self.cancel_timer(user);
        let removed = self.sessions.remove(user);
        gauge!("clerk_sessions_active").set(self.sessions.len() as f64);
        removed
    }
}

/// All mutable orchestrator state.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<Inner>,
}

impl SessionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with an explicit rate-gate interval, for tests that drive many
    /// events through one wall-clock instant.
    #[must_use]
    pub fn with_min_interval(min_interval_ms: i64) -> Self {
        Self {
            inner: Mutex::new(Inner {
                rate: RateGate::new(min_interval_ms),
                ..Inner::default()
            }),
        }
    }

    // ── Dedup and rate limiting ──────────────────────────────────────────

    /// Record an inbound event id. Returns `false` on a redelivery.
    pub fn observe_event(&self, event_id: &EventId, now: DateTime<Utc>) -> bool {
        let fresh = self.inner.lock().dedup.observe(event_id, now);
        if !fresh {
            counter!("clerk_events_deduped").increment(1);
            debug!(event_id = %event_id, "dropping redelivered event");
        }
        fresh
    }

    /// Whether `user` passes the rate gate. Exempt events always pass.
    pub fn allow(&self, user: &UserId, now: DateTime<Utc>, exempt: bool) -> bool {
        let allowed = self.inner.lock().rate.allow(user, now, exempt);
        if !allowed {
            counter!("clerk_events_rate_limited").increment(1);
        }
        allowed
    }

    // ── Sessions ─────────────────────────────────────────────────────────

    /// Snapshot the user's session. A session past its TTL is removed and
    /// reported as absent.
    pub fn get(&self, user: &UserId, now: DateTime<Utc>) -> Option<Session> {
        let mut inner = self.inner.lock();
        if inner.sessions.get(user).is_some_and(|s| s.is_expired(now)) {
            let _ = inner.remove_session(user);
            return None;
        }
        inner.sessions.get(user).cloned()
    }

    /// Install a session, replacing any existing one and cancelling its
    /// timer.
    pub fn insert(&self, session: Session) {
        let mut inner = self.inner.lock();
        inner.cancel_timer(&session.user);
        debug!(user = %session.user, workflow = session.workflow.kind_name(), "session installed");
        let _ = inner.sessions.insert(session.user.clone(), session);
        gauge!("clerk_sessions_active").set(inner.sessions.len() as f64);
    }

    /// Mutate the user's live session in place, touching its activity
    /// timestamp. Returns `None` if the session is absent or expired.
    pub fn update<R>(
        &self,
        user: &UserId,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let mut inner = self.inner.lock();
        if inner.sessions.get(user).is_some_and(|s| s.is_expired(now)) {
            let _ = inner.remove_session(user);
            return None;
        }
        let session = inner.sessions.get_mut(user)?;
        let out = f(session);
        session.last_activity = now;
        Some(out)
    }

    /// Bump the session's generation counter, invalidating timers scheduled
    /// against the previous value. Returns the new generation.
    pub fn bump_generation(&self, user: &UserId, now: DateTime<Utc>) -> Option<u64> {
        self.update(user, now, |s| {
            s.generation += 1;
            s.generation
        })
    }

    /// Remove the user's session and cancel its timer.
    pub fn delete(&self, user: &UserId) -> Option<Session> {
        self.inner.lock().remove_session(user)
    }

    /// Mark an unattributed-file stash as prompted, restarting its idle
    /// clock. The destination-prompt timer runs the same length as the
    /// stash TTL, so at fire time the session can sit exactly on the expiry
    /// boundary; this path skips the expiry check so the prompt wins the
    /// tie. Returns `false` when the stash is gone, already prompted, or a
    /// later generation.
    pub fn mark_stash_prompted(
        &self,
        user: &UserId,
        generation: u64,
        now: DateTime<Utc>,
    ) -> bool {
        let mut inner = self.inner.lock();
        let Some(session) = inner.sessions.get_mut(user) else {
            return false;
        };
        if session.generation != generation {
            return false;
        }
        let Workflow::FileIntentUnclear(stash) = &mut session.workflow else {
            return false;
        };
        if stash.prompt_sent {
            return false;
        }
        stash.prompt_sent = true;
        session.last_activity = now;
        true
    }

    // ── Timers ───────────────────────────────────────────────────────────

    /// Attach a timer to the user's session, cancelling any previous one.
    pub fn set_timer(&self, user: &UserId, handle: TimerHandle) {
        let mut inner = self.inner.lock();
        inner.cancel_timer(user);
        let _ = inner.timers.insert(user.clone(), handle);
    }

    /// Cancel and drop the user's timer, if any.
    pub fn clear_timer(&self, user: &UserId) {
        self.inner.lock().cancel_timer(user);
    }

    // ── Conversation windows ─────────────────────────────────────────────

    /// Append a turn to the user's window.
    pub fn push_turn(&self, user: &UserId, role: Role, text: &str, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        inner
            .windows
            .entry(user.clone())
            .or_insert_with(|| ConversationWindow::new(now))
            .push(role, text, now);
    }

    /// Snapshot the user's turns, oldest first.
    #[must_use]
    pub fn history(&self, user: &UserId) -> Vec<Turn> {
        self.inner
            .lock()
            .windows
            .get(user)
            .map(ConversationWindow::turns)
            .unwrap_or_default()
    }

    /// Drop the user's window. Called after a ticket attempt so the next
    /// request starts from a clean context.
    pub fn clear_window(&self, user: &UserId) {
        let _ = self.inner.lock().windows.remove(user);
    }

    // ── Confirmations ────────────────────────────────────────────────────

    /// Bind a finalized field set to a fresh single-use token. Any earlier
    /// pending token for the same user is evicted: a superseded card must
    /// not stay redeemable next to the one that replaced it, or one
    /// collection could file two tickets.
    pub fn issue_confirmation(
        &self,
        user: &UserId,
        kind: TicketKind,
        fields: FieldMap,
        artifacts: Vec<ArtifactId>,
        now: DateTime<Utc>,
    ) -> ConfirmToken {
        let token = ConfirmToken::generate();
        let pending = PendingConfirmation {
            token: token.clone(),
            user: user.clone(),
            kind,
            fields,
            artifacts,
            created_at: now,
        };
        let mut inner = self.inner.lock();
        inner.confirmations.retain(|_, p| p.user != *user);
        let _ = inner.confirmations.insert(token.clone(), pending);
        token
    }

    /// Redeem a token exactly once. The remove-then-check is atomic under
    /// the store lock, so two racing presses see one `Ok` and one
    /// [`RedeemError::Consumed`].
    pub fn redeem_confirmation(
        &self,
        token: &ConfirmToken,
        user: &UserId,
        now: DateTime<Utc>,
    ) -> Result<PendingConfirmation, RedeemError> {
        let mut inner = self.inner.lock();
        match inner.confirmations.remove(token) {
            Some(pending) if pending.user != *user => {
                // Not the owner; put it back untouched.
                let _ = inner.confirmations.insert(token.clone(), pending);
                Err(RedeemError::Expired)
            }
            Some(pending) => {
                if (now - pending.created_at).num_seconds() >= CONFIRM_TTL_SECS {
                    return Err(RedeemError::Expired);
                }
                let _ = inner.consumed.insert(token.clone(), now);
                Ok(pending)
            }
            None if inner.consumed.contains_key(token) => Err(RedeemError::Consumed),
            None => Err(RedeemError::Expired),
        }
    }

    // ── Sweep ────────────────────────────────────────────────────────────

    /// Remove everything past its TTL. Returns one notice per expired
    /// session; the caller sends them outside the lock.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<ExpiryNotice> {
        let mut inner = self.inner.lock();

        let expired: Vec<UserId> = inner
            .sessions
            .values()
            .filter(|s| s.is_expired(now))
            .map(|s| s.user.clone())
            .collect();
        let mut notices = Vec::with_capacity(expired.len());
        for user in expired {
            if let Some(session) = inner.remove_session(&user) {
                info!(user = %user, workflow = session.workflow.kind_name(), "session expired");
                counter!("clerk_sessions_expired").increment(1);
                notices.push(ExpiryNotice {
                    user,
                    workflow: session.workflow.kind_name(),
                });
            }
        }

        inner
            .confirmations
            .retain(|_, p| (now - p.created_at).num_seconds() < CONFIRM_TTL_SECS);
        inner
            .consumed
            .retain(|_, at| (now - *at).num_seconds() < CONSUMED_TTL_SECS);
        inner
            .windows
            .retain(|_, w| (now - w.last_activity).num_seconds() < WINDOW_TTL_SECS);
        inner.rate.prune(now, WINDOW_TTL_SECS);

        notices
    }
}
