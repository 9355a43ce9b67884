//! Field values and source-tracked field maps.
//!
//! Every collected ticket field carries the source it came from so the merge
//! engine can enforce precedence: an explicit UI selection is never clobbered
//! by an AI inference, and a document inference is never clobbered by a
//! conversational one.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A scalar field value, or an ordered list of row maps for table-shaped
/// form fields.
///
/// `untagged` keeps the wire format natural: `true`, `3.5`, `"annual"`, or
/// `[{"item": "paper", "qty": 2}]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean-like value.
    Flag(bool),
    /// Numeric value (days, amounts, counts).
    Number(f64),
    /// Free text or an enumerated option.
    Text(String),
    /// Ordered rows of nested scalar fields.
    Rows(Vec<BTreeMap<String, FieldValue>>),
}

impl FieldValue {
    /// Whether the value carries no information (blank text, no rows).
    ///
    /// An empty value never overrides a previously captured one.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(t) => t.trim().is_empty(),
            Self::Rows(rows) => rows.is_empty(),
            Self::Flag(_) | Self::Number(_) => false,
        }
    }

    /// Borrow as text, if textual.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Interpret as a number: numeric values directly, textual values by
    /// salvaging the digits (handles "1,200.50 total").
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(t) => {
                let digits: String = t
                    .chars()
                    .filter(|c| c.is_ascii_digit() || *c == '.')
                    .collect();
                digits.parse().ok()
            }
            _ => None,
        }
    }

    /// Interpret as a yes/no flag.
    #[must_use]
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            Self::Flag(b) => Some(*b),
            Self::Text(t) => match t.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" => Some(true),
                "no" | "false" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Flag(b) => write!(f, "{}", if *b { "yes" } else { "no" }),
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(t) => f.write_str(t),
            Self::Rows(rows) => write!(f, "[{} rows]", rows.len()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(t: &str) -> Self {
        Self::Text(t.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(t: String) -> Self {
        Self::Text(t)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Flag(b)
    }
}

/// Canonical field id → value, without provenance. Used at the edges (AI
/// replies, finalized confirmations, wire forms).
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Where a field value came from. Order is weakest to strongest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// AI inference from free-text conversation.
    Conversation,
    /// AI inference from document content.
    Document,
    /// Explicit interactive-UI selection by the user.
    Selection,
}

impl FieldSource {
    /// Precedence rank; higher wins.
    #[must_use]
    pub fn rank(self) -> u8 {
        match self {
            Self::Conversation => 0,
            Self::Document => 1,
            Self::Selection => 2,
        }
    }
}

/// A value plus the source that produced it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourcedValue {
    /// The captured value.
    pub value: FieldValue,
    /// Strongest source seen for this field so far.
    pub source: FieldSource,
}

/// Field map with per-field provenance.
///
/// This is the working representation inside sessions; [`Self::finalize`]
/// drops provenance for hand-off to the confirmation gate.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MergedFields {
    map: BTreeMap<String, SourcedValue>,
}

impl MergedFields {
    /// Empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&SourcedValue> {
        self.map.get(field)
    }

    /// Insert unconditionally, recording the source. Precedence enforcement
    /// lives in the merge engine, not here.
    pub fn set(&mut self, field: impl Into<String>, value: FieldValue, source: FieldSource) {
        let _ = self.map.insert(field.into(), SourcedValue { value, source });
    }

    /// Whether any field is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of captured fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Iterate over `(field, sourced value)` pairs in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SourcedValue)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Drop provenance, producing the plain map handed to the gate.
    #[must_use]
    pub fn finalize(&self) -> FieldMap {
        self.map
            .iter()
            .map(|(k, v)| (k.clone(), v.value.clone()))
            .collect()
    }
}
