//! Pending confirmations: finalized field sets awaiting the user's press.

use chrono::{DateTime, Utc};
use clerk_core::catalog::TicketKind;
use clerk_core::fields::FieldMap;
use clerk_core::ids::{ArtifactId, ConfirmToken, UserId};

/// A finalized field set bound to a single-use token. Redeeming it is the
/// only path to ticket creation.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingConfirmation {
    /// The token the confirm button carries.
    pub token: ConfirmToken,
    /// Owner; redemption by anyone else is rejected.
    pub user: UserId,
    /// Ticket kind being filed.
    pub kind: TicketKind,
    /// Finalized fields, provenance already dropped.
    pub fields: FieldMap,
    /// Artifacts to attach.
    pub artifacts: Vec<ArtifactId>,
    /// Issue time; drives the fifteen-minute redemption window.
    pub created_at: DateTime<Utc>,
}

/// Why a redemption failed. Both render as "please restart" to the user but
/// are logged distinctly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedeemError {
    /// The token was already redeemed once.
    Consumed,
    /// The token aged out, never existed, or belongs to someone else.
    Expired,
}
