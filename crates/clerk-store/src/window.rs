//! Conversation windows: capped turn history used as classification context.

use chrono::{DateTime, Utc};
use clerk_core::constants::CONVERSATION_CAP;
use std::collections::VecDeque;

/// Who produced a turn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// The end user.
    User,
    /// The assistant.
    Assistant,
}

/// One conversation turn.
#[derive(Clone, Debug, PartialEq)]
pub struct Turn {
    /// Speaker.
    pub role: Role,
    /// Turn text.
    pub text: String,
}

/// Rolling window of the last turns for one user.
#[derive(Clone, Debug)]
pub struct ConversationWindow {
    turns: VecDeque<Turn>,
    /// Last touch; windows idle for a day are swept.
    pub last_activity: DateTime<Utc>,
}

impl ConversationWindow {
    /// Empty window touched at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            turns: VecDeque::new(),
            last_activity: now,
        }
    }

    /// Append a turn, evicting the oldest past the cap.
    pub fn push(&mut self, role: Role, text: impl Into<String>, now: DateTime<Utc>) {
        if self.turns.len() >= CONVERSATION_CAP {
            let _ = self.turns.pop_front();
        }
        self.turns.push_back(Turn { role, text: text.into() });
        self.last_activity = now;
    }

    /// Turns oldest first.
    #[must_use]
    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    /// Whether the window holds no turns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
