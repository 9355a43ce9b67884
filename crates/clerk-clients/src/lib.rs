//! # clerk-clients
//!
//! HTTP collaborators for the Clerk approval-ticket orchestrator.
//!
//! Each collaborator is a trait (so the runtime can be tested against fakes)
//! with one production implementation backed by `reqwest`:
//!
//! - **AI extraction**: [`ai::FieldExtractor`] / [`ai::JsonExtractClient`] —
//!   JSON-mode chat completions with bounded-backoff retry
//! - **Text extraction**: [`doc_text::TextExtractor`] /
//!   [`doc_text::HttpTextExtractor`] — document bytes to plain text
//! - **Document store**: [`doc_store::DocumentStore`] /
//!   [`doc_store::HttpDocumentStore`] — artifact download and upload
//! - **Ticket backend**: [`ticket::TicketBackend`] /
//!   [`ticket::HttpTicketBackend`] — ticket creation and form definitions
//! - **Definition cache**: [`defs::DefinitionCache`] — cached form
//!   definitions with failure-driven invalidation
//!
//! ## Crate Position
//!
//! Depends on `clerk-core`. Depended on by `clerk-runtime`.

#![deny(unsafe_code)]

pub mod ai;
pub mod defs;
pub mod doc_store;
pub mod doc_text;
pub mod error;
pub mod ticket;
