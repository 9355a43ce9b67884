//! Branded identifier newtypes.
//!
//! Plain `String`s for user ids, event ids, and artifact refs are easy to
//! swap by accident at call sites that take several of them. Each identifier
//! gets its own newtype with transparent serde so the wire format stays a
//! bare string.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! branded_id {
    ($(#[doc = $doc:literal])* $name:ident) => {
        $(#[doc = $doc])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string.
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the inner string.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

branded_id! {
    /// Chat-transport identity of an end user (the session key).
    UserId
}

branded_id! {
    /// Provider-assigned identifier of an inbound event (dedup key).
    EventId
}

branded_id! {
    /// Reference to an uploaded artifact in the document store.
    ArtifactId
}

branded_id! {
    /// Single-use confirmation token bound to a finalized field set.
    ConfirmToken
}

impl ConfirmToken {
    /// Generate a fresh, unguessable token.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }
}
