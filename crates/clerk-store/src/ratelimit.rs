//! Per-user rate gate.
//!
//! One event per user per two seconds, with two exemptions decided by the
//! caller: file uploads (multi-file shares arrive in a burst by design) and
//! flow-critical control messages while a batch is active.

use chrono::{DateTime, Utc};
use clerk_core::constants::RATE_MIN_INTERVAL_MS;
use clerk_core::ids::UserId;
use std::collections::HashMap;

/// Minimum-interval gate keyed by user.
#[derive(Debug)]
pub struct RateGate {
    last: HashMap<UserId, DateTime<Utc>>,
    min_interval_ms: i64,
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new(RATE_MIN_INTERVAL_MS)
    }
}

impl RateGate {
    /// Gate with an explicit interval, for tests.
    #[must_use]
    pub fn new(min_interval_ms: i64) -> Self {
        Self {
            last: HashMap::new(),
            min_interval_ms,
        }
    }

    /// Whether `user` may proceed. Exempt events pass without consuming the
    /// interval; denied events do not push the window out either, so a burst
    /// of rejections cannot lock a user out forever.
    pub fn allow(&mut self, user: &UserId, now: DateTime<Utc>, exempt: bool) -> bool {
        if exempt {
            return true;
        }
        if let Some(last) = self.last.get(user) {
            if (now - *last).num_milliseconds() < self.min_interval_ms {
                return false;
            }
        }
        let _ = self.last.insert(user.clone(), now);
        true
    }

    /// Drop users whose last event is older than `max_age_secs`.
    pub fn prune(&mut self, now: DateTime<Utc>, max_age_secs: i64) {
        self.last
            .retain(|_, last| (now - *last).num_seconds() < max_age_secs);
    }
}
