//! Chat-transport event types.
//!
//! [`InboundEvent`] is what the transport adapter hands the router after
//! webhook verification; [`OutboundMessage`] is what flows back. Both are
//! tagged unions so the wire shape stays self-describing.

use crate::ids::{ArtifactId, ConfirmToken, EventId, UserId};
use serde::{Deserialize, Serialize};

/// An event arriving from the chat transport.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    /// Free-text message.
    Text {
        /// Provider-assigned id, used for dedup.
        event_id: EventId,
        /// Sender.
        user: UserId,
        /// Message body.
        text: String,
    },
    /// File upload.
    File {
        /// Provider-assigned id, used for dedup.
        event_id: EventId,
        /// Sender.
        user: UserId,
        /// Reference to the uploaded payload.
        artifact: ArtifactId,
        /// Original filename as shown to the user.
        display_name: String,
    },
    /// Interactive button press.
    Button {
        /// Provider-assigned id, used for dedup.
        event_id: EventId,
        /// Sender.
        user: UserId,
        /// Action verb from the pressed button.
        action: String,
        /// Opaque payload attached by the button builder. Malformed payloads
        /// are tolerated; the router falls back to generic handling.
        payload: serde_json::Value,
    },
}

impl InboundEvent {
    /// Dedup key.
    #[must_use]
    pub fn event_id(&self) -> &EventId {
        match self {
            Self::Text { event_id, .. }
            | Self::File { event_id, .. }
            | Self::Button { event_id, .. } => event_id,
        }
    }

    /// Sending user (the session key).
    #[must_use]
    pub fn user(&self) -> &UserId {
        match self {
            Self::Text { user, .. } | Self::File { user, .. } | Self::Button { user, .. } => user,
        }
    }
}

/// One pressable button.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Button {
    /// Action verb echoed back in the press event.
    pub action: String,
    /// Field this button sets.
    pub field: String,
    /// Value the press selects.
    pub value: String,
    /// Row index for multi-file selection matrices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
}

/// A labelled group of buttons for one field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ButtonGroup {
    /// Field the group sets.
    pub field: String,
    /// Label shown above the buttons.
    pub label: String,
    /// Row index for multi-file selection matrices.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    /// The buttons.
    pub buttons: Vec<Button>,
}

/// A message sent back to the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// Plain informational text.
    Notice {
        /// Message body.
        text: String,
    },
    /// A prompt with interactive option buttons.
    Options {
        /// Lead-in text.
        prompt: String,
        /// Button groups, one per field (and per row for file matrices).
        groups: Vec<ButtonGroup>,
    },
    /// Final review card carrying a single-use confirmation token.
    Confirm {
        /// Human-readable summary of the collected fields.
        summary: String,
        /// Token redeemed exactly once on press.
        token: ConfirmToken,
    },
    /// Hand-off to an external portal (link-only kinds).
    OpenExternally {
        /// Explanatory text.
        text: String,
        /// Deep link to open.
        url: String,
    },
}

impl OutboundMessage {
    /// Convenience constructor for plain notices.
    #[must_use]
    pub fn notice(text: impl Into<String>) -> Self {
        Self::Notice { text: text.into() }
    }
}
