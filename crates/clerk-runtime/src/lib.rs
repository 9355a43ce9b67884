//! # clerk-runtime
//!
//! The orchestration layer of the Clerk approval-ticket assistant.
//!
//! - **Router**: [`router::EventRouter`] — dedup, rate gate, and dispatch of
//!   inbound events to the owning workflow
//! - **Merge engine**: [`merge`] — source-precedence field merging
//! - **Classification**: [`classify`] — AI intent and field extraction
//! - **Workflows**: [`workflows`] — generic single-turn, seal multi-file,
//!   and invoice dual-document flows
//! - **Confirmation gate**: [`gate::ConfirmGate`] — single-use token
//!   redemption and ticket creation
//! - **Sweeper**: [`sweep::spawn_sweeper`] — periodic TTL enforcement
//! - **Notifier**: [`notify::Notifier`] — outbound message seam for the
//!   chat transport
//!
//! ## Crate Position
//!
//! Top of the stack. Depends on `clerk-core`, `clerk-clients`, and
//! `clerk-store`.

#![deny(unsafe_code)]

pub mod classify;
pub mod deps;
pub mod gate;
pub mod merge;
pub mod notify;
pub mod router;
pub mod sweep;
pub mod workflows;
