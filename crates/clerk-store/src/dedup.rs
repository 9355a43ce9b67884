//! Delivery dedup ledger.
//!
//! The chat transport redelivers webhooks; every inbound event id passes
//! through here first. The ledger is bounded two ways: entries older than a
//! day are dropped, and the count never exceeds a fixed cap. The count bound
//! is enforced first so a redelivery storm cannot grow memory while old
//! entries are still young enough to keep.

use chrono::{DateTime, Utc};
use clerk_core::constants::{DEDUP_MAX_ENTRIES, DEDUP_TTL_SECS};
use clerk_core::ids::EventId;
use std::collections::{HashSet, VecDeque};

/// Bounded set of recently seen event ids.
#[derive(Debug)]
pub struct DedupLedger {
    entries: VecDeque<(EventId, DateTime<Utc>)>,
    seen: HashSet<EventId>,
    max_entries: usize,
    ttl_secs: i64,
}

impl Default for DedupLedger {
    fn default() -> Self {
        Self::new(DEDUP_MAX_ENTRIES, DEDUP_TTL_SECS)
    }
}

impl DedupLedger {
    /// Ledger with explicit bounds, for tests.
    #[must_use]
    pub fn new(max_entries: usize, ttl_secs: i64) -> Self {
        Self {
            entries: VecDeque::new(),
            seen: HashSet::new(),
            max_entries,
            ttl_secs,
        }
    }

    /// Record `event_id`. Returns `true` if it is new, `false` on a
    /// redelivery.
    pub fn observe(&mut self, event_id: &EventId, now: DateTime<Utc>) -> bool {
        self.evict(now);
        if self.seen.contains(event_id) {
            return false;
        }
        self.entries.push_back((event_id.clone(), now));
        let _ = self.seen.insert(event_id.clone());
        true
    }

    /// Number of remembered ids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&mut self, now: DateTime<Utc>) {
        // Count bound first, then age.
        while self.entries.len() >= self.max_entries {
            if let Some((old, _)) = self.entries.pop_front() {
                let _ = self.seen.remove(&old);
            }
        }
        while let Some((_, seen_at)) = self.entries.front() {
            if (now - *seen_at).num_seconds() < self.ttl_secs {
                break;
            }
            if let Some((old, _)) = self.entries.pop_front() {
                let _ = self.seen.remove(&old);
            }
        }
    }
}
