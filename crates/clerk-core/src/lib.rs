//! # clerk-core
//!
//! Foundation types, errors, and utilities for the Clerk approval-ticket
//! orchestrator.
//!
//! This crate provides the shared vocabulary that all other Clerk crates
//! depend on:
//!
//! - **Branded IDs**: [`ids::UserId`], [`ids::EventId`], [`ids::ArtifactId`],
//!   [`ids::ConfirmToken`] as newtypes
//! - **Fields**: [`fields::FieldValue`], [`fields::FieldMap`], and
//!   source-tracked [`fields::MergedFields`]
//! - **Catalog**: [`catalog::TicketKind`] and per-kind [`catalog::TicketSpec`]
//!   (field specs, option sets, reviewer-comment rules)
//! - **Events**: [`events::InboundEvent`] from the chat transport and
//!   [`events::OutboundMessage`] back to the user
//! - **Errors**: [`errors::ClerkError`] taxonomy via `thiserror`
//! - **Retry**: [`retry::RetryConfig`] and backoff calculation
//! - **Timers**: [`timer::schedule`] — cancellable delayed callbacks
//! - **Config**: [`config::ClerkConfig`] loaded from the environment
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other clerk crates.

#![deny(unsafe_code)]

pub mod catalog;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod fields;
pub mod ids;
pub mod logging;
pub mod retry;
pub mod timer;
