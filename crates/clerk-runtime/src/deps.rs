//! Shared collaborator bundle.

use crate::notify::Notifier;
use clerk_clients::ai::FieldExtractor;
use clerk_clients::defs::DefinitionCache;
use clerk_clients::doc_store::DocumentStore;
use clerk_clients::doc_text::TextExtractor;
use clerk_clients::ticket::TicketBackend;
use clerk_store::store::SessionStore;
use std::sync::Arc;

/// Everything the router, workflows, gate, and sweeper share. Wrapped in an
/// `Arc` once and cloned freely; timer bodies capture a clone and re-enter
/// through the store.
pub struct RouterDeps {
    /// The process-wide state store.
    pub store: SessionStore,
    /// Outbound messages.
    pub notifier: Arc<dyn Notifier>,
    /// AI extraction.
    pub ai: Arc<dyn FieldExtractor>,
    /// Artifact bytes.
    pub docs: Arc<dyn DocumentStore>,
    /// Document text extraction.
    pub text: Arc<dyn TextExtractor>,
    /// Ticket creation and definitions.
    pub tickets: Arc<dyn TicketBackend>,
    /// Cached form definitions.
    pub defs: DefinitionCache,
    /// HR portal base URL for link-only kinds.
    pub portal_base: String,
}
