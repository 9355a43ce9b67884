//! Cached form definitions.
//!
//! Definitions change rarely but ticket creation fails hard when the cached
//! field layout is stale. The cache is therefore invalidated on any creation
//! failure so the next attempt re-fetches. Free-process flags stick: once the
//! backend says a definition has no approval chain, the gate routes that
//! kind to the portal without asking again.

use crate::error::ClientError;
use crate::ticket::{FormDefinition, TicketBackend};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Default)]
struct CacheInner {
    defs: HashMap<String, FormDefinition>,
    free: HashSet<String>,
}

/// Process-wide form-definition cache.
#[derive(Default)]
pub struct DefinitionCache {
    inner: Mutex<CacheInner>,
}

impl DefinitionCache {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached definition for `code`, or fetch and cache it. The fetch runs
    /// outside the lock.
    pub async fn get_or_fetch(
        &self,
        backend: &dyn TicketBackend,
        code: &str,
    ) -> Result<FormDefinition, ClientError> {
        if let Some(def) = self.inner.lock().defs.get(code) {
            return Ok(def.clone());
        }

        let def = backend.fetch_definition(code).await?;
        debug!(code, fields = def.fields.len(), "cached form definition");
        let mut inner = self.inner.lock();
        if def.is_free_process() {
            let _ = inner.free.insert(code.to_string());
        }
        let _ = inner.defs.insert(code.to_string(), def.clone());
        Ok(def)
    }

    /// Drop the cached definition for `code`. Called after a creation
    /// failure so the next attempt sees the current layout.
    pub fn invalidate(&self, code: &str) {
        let _ = self.inner.lock().defs.remove(code);
    }

    /// Record that `code` is a free process.
    pub fn mark_free(&self, code: &str) {
        let _ = self.inner.lock().free.insert(code.to_string());
    }

    /// Whether `code` is known to be a free process.
    #[must_use]
    pub fn is_free(&self, code: &str) -> bool {
        self.inner.lock().free.contains(code)
    }
}
