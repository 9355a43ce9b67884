//! # clerk-store
//!
//! In-memory state for the Clerk approval-ticket orchestrator.
//!
//! All mutable state lives behind one process-wide lock inside
//! [`store::SessionStore`]:
//!
//! - **Sessions**: [`session::Session`] and the [`session::Workflow`] union
//! - **Confirmations**: single-use tokens via [`confirm::PendingConfirmation`]
//! - **Dedup**: [`dedup::DedupLedger`] — count- and age-bounded event ids
//! - **Rate limiting**: [`ratelimit::RateGate`] — per-user minimum interval
//! - **Conversation windows**: [`window::ConversationWindow`] — capped turn
//!   history used as classification context
//!
//! The store never performs I/O while holding its lock. Callers snapshot
//! state, do their network work, and commit the result through a second
//! short lock acquisition that re-validates generation counters.
//!
//! ## Crate Position
//!
//! Depends on `clerk-core`. Depended on by `clerk-runtime`.

#![deny(unsafe_code)]

pub mod confirm;
pub mod dedup;
pub mod ratelimit;
pub mod session;
pub mod store;
pub mod window;
