//! Session state: one per user, one active workflow at a time.
//!
//! A session is plain cloneable data. Timers are owned by the store in a
//! side map so snapshots taken outside the lock stay cheap, and so a timer
//! can never keep a dead session alive.

use chrono::{DateTime, Utc};
use clerk_core::catalog::TicketKind;
use clerk_core::constants::{FILE_INTENT_TTL_SECS, SESSION_TTL_SECS};
use clerk_core::fields::MergedFields;
use clerk_core::ids::{ArtifactId, UserId};

/// A file received and re-uploaded to the document store.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchedFile {
    /// Stored artifact reference.
    pub artifact: ArtifactId,
    /// Original filename as the user sees it.
    pub display_name: String,
}

/// Conversational collection for a single-turn kind with fields still
/// missing.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericPending {
    /// The classified kind.
    pub kind: TicketKind,
    /// Fields captured so far, with provenance.
    pub fields: MergedFields,
    /// Required field ids still missing.
    pub missing: Vec<String>,
}

/// Seal flow, phase one: files arriving, debounce timer pending.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SealBatch {
    /// Files received so far, in arrival order.
    pub files: Vec<BatchedFile>,
    /// Fields inferred from conversation before or during the batch.
    pub conversation_fields: MergedFields,
}

/// Per-file state in the seal selection phase.
#[derive(Clone, Debug, PartialEq)]
pub struct SealFileState {
    /// The file.
    pub file: BatchedFile,
    /// Inferred and selected fields for this file.
    pub fields: MergedFields,
}

/// Seal flow, phase two: batch processed, awaiting per-file selections.
#[derive(Clone, Debug, PartialEq)]
pub struct SealChoices {
    /// One entry per batched file, indexed by button row.
    pub files: Vec<SealFileState>,
    /// Fields shared across the batch (admin note, conversation context).
    pub shared: MergedFields,
}

/// Invoice collection progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvoiceStage {
    /// At least one of the two document roles is still unfilled.
    AwaitingDocuments,
    /// Both documents in; waiting on the user-supplied fields.
    AwaitingUserFields,
}

/// Invoice flow: two document roles plus user-supplied fields.
#[derive(Clone, Debug, PartialEq)]
pub struct InvoiceCollection {
    /// Settlement sheet, once received.
    pub settlement: Option<BatchedFile>,
    /// Contract, once received.
    pub contract: Option<BatchedFile>,
    /// Fields from documents and conversation, with provenance.
    pub fields: MergedFields,
    /// Where the collection stands.
    pub stage: InvoiceStage,
}

impl InvoiceCollection {
    /// Fresh collection with nothing received.
    #[must_use]
    pub fn new() -> Self {
        Self {
            settlement: None,
            contract: None,
            fields: MergedFields::new(),
            stage: InvoiceStage::AwaitingDocuments,
        }
    }

    /// Whether both document roles are filled.
    #[must_use]
    pub fn documents_complete(&self) -> bool {
        self.settlement.is_some() && self.contract.is_some()
    }
}

impl Default for InvoiceCollection {
    fn default() -> Self {
        Self::new()
    }
}

/// Files received with no workflow to own them yet.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FileIntentUnclear {
    /// The unattributed files, in arrival order.
    pub files: Vec<BatchedFile>,
    /// Whether the destination question has already gone out. It is asked
    /// at most once per stash.
    pub prompt_sent: bool,
}

/// The active workflow of a session. Absence of a session means no
/// workflow at all.
#[derive(Clone, Debug, PartialEq)]
pub enum Workflow {
    /// Single-turn kind with fields still missing.
    GenericPending(GenericPending),
    /// Seal flow, batching phase.
    SealBatch(SealBatch),
    /// Seal flow, selection phase.
    SealChoices(SealChoices),
    /// Invoice flow.
    InvoiceCollection(InvoiceCollection),
    /// Unattributed files awaiting a destination.
    FileIntentUnclear(FileIntentUnclear),
}

impl Workflow {
    /// Stable name for logs and expiry notices.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::GenericPending(_) => "generic_pending",
            Self::SealBatch(_) => "seal_batch",
            Self::SealChoices(_) => "seal_choices",
            Self::InvoiceCollection(_) => "invoice_collection",
            Self::FileIntentUnclear(_) => "file_intent_unclear",
        }
    }

    /// Idle TTL for a session in this workflow.
    #[must_use]
    pub fn ttl_secs(&self) -> i64 {
        match self {
            Self::FileIntentUnclear(_) => FILE_INTENT_TTL_SECS,
            _ => SESSION_TTL_SECS,
        }
    }
}

/// One user's session.
#[derive(Clone, Debug, PartialEq)]
pub struct Session {
    /// Owner.
    pub user: UserId,
    /// Active workflow.
    pub workflow: Workflow,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last touch; drives idle expiry.
    pub last_activity: DateTime<Utc>,
    /// Consecutive unparseable clarification replies.
    pub retries: u32,
    /// Bumped whenever state advances; timers carry the value they saw and
    /// fire as no-ops when it moved on.
    pub generation: u64,
}

impl Session {
    /// New session starting in `workflow`.
    #[must_use]
    pub fn new(user: UserId, workflow: Workflow, now: DateTime<Utc>) -> Self {
        Self {
            user,
            workflow,
            created_at: now,
            last_activity: now,
            retries: 0,
            generation: 0,
        }
    }

    /// Whether the session idled past its TTL.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (now - self.last_activity).num_seconds() >= self.workflow.ttl_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-01-10T09:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn sessions_expire_after_thirty_idle_minutes() {
        let s = Session::new(
            "u1".into(),
            Workflow::SealBatch(SealBatch::default()),
            t0(),
        );
        assert!(!s.is_expired(t0() + chrono::Duration::minutes(29)));
        assert!(s.is_expired(t0() + chrono::Duration::minutes(30)));
    }

    #[test]
    fn unattributed_files_expire_after_three_minutes() {
        let s = Session::new(
            "u1".into(),
            Workflow::FileIntentUnclear(FileIntentUnclear::default()),
            t0(),
        );
        assert!(!s.is_expired(t0() + chrono::Duration::seconds(179)));
        assert!(s.is_expired(t0() + chrono::Duration::minutes(3)));
    }

    #[test]
    fn invoice_completion_needs_both_roles() {
        let mut inv = InvoiceCollection::new();
        assert!(!inv.documents_complete());
        inv.settlement = Some(BatchedFile {
            artifact: "a1".into(),
            display_name: "settlement.xlsx".into(),
        });
        assert!(!inv.documents_complete());
        inv.contract = Some(BatchedFile {
            artifact: "a2".into(),
            display_name: "contract.pdf".into(),
        });
        assert!(inv.documents_complete());
    }
}
