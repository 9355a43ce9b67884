//! Static catalog of supported ticket kinds.
//!
//! Each kind carries a field table driving the whole pipeline: what the
//! classifier is allowed to infer, which fields must come from an explicit
//! UI selection, which options are valid, and how the reviewer comment is
//! derived from the finalized values.

use crate::fields::{FieldMap, FieldValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported ticket kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketKind {
    /// Time off (annual, sick, personal, marriage, maternity).
    Leave,
    /// Off-site work outing.
    Outing,
    /// Use of a company seal on one or more documents.
    SealUsage,
    /// Purchase request.
    Purchase,
    /// New-hire onboarding; link-only, filed in the HR portal directly.
    Onboarding,
    /// Invoice / reimbursement backed by settlement and contract documents.
    Invoice,
}

/// Overall interaction shape of a kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowShape {
    /// Fields collected from conversation in one or more text turns.
    SingleTurn,
    /// Files batched and debounced, per-file explicit selections.
    SealMultiFile,
    /// Two documents with distinct roles plus user-supplied fields.
    InvoiceDualDoc,
}

/// One form field of a ticket kind.
#[derive(Clone, Copy, Debug)]
pub struct FieldSpec {
    /// Canonical field id used across the pipeline.
    pub id: &'static str,
    /// Human-facing label for prompts and summaries.
    pub label: &'static str,
    /// Valid enumerated options; empty for free-form fields.
    pub options: &'static [&'static str],
    /// Only an explicit UI selection may set this field. Inferred values
    /// for it are discarded regardless of source.
    pub must_be_explicit: bool,
    /// Only the user may supply this field; document inference is rejected.
    pub user_supplied: bool,
    /// Required before the kind can be confirmed.
    pub required: bool,
    /// Values should be normalized to `YYYY-MM-DD`.
    pub is_date: bool,
    /// Backend field id when it differs from the canonical id.
    pub wire_id: Option<&'static str>,
}

impl FieldSpec {
    const fn free(id: &'static str, label: &'static str) -> Self {
        Self {
            id,
            label,
            options: &[],
            must_be_explicit: false,
            user_supplied: false,
            required: true,
            is_date: false,
            wire_id: None,
        }
    }

    const fn date(id: &'static str, label: &'static str) -> Self {
        Self { is_date: true, ..Self::free(id, label) }
    }

    const fn options(self, options: &'static [&'static str]) -> Self {
        Self { options, ..self }
    }

    const fn explicit(self) -> Self {
        Self { must_be_explicit: true, ..self }
    }

    const fn user_supplied(self) -> Self {
        Self { user_supplied: true, ..self }
    }

    const fn optional(self) -> Self {
        Self { required: false, ..self }
    }

    const fn wire(self, wire_id: &'static str) -> Self {
        Self { wire_id: Some(wire_id), ..self }
    }

    /// Whether `value` is acceptable for this field: non-empty, and a member
    /// of the option set when one is defined.
    #[must_use]
    pub fn accepts(&self, value: &FieldValue) -> bool {
        if value.is_empty() {
            return false;
        }
        if self.options.is_empty() {
            return true;
        }
        match value.as_text() {
            Some(t) => {
                let t = t.trim();
                self.options.iter().any(|o| o.eq_ignore_ascii_case(t))
            }
            None => false,
        }
    }
}

/// Static description of one ticket kind.
#[derive(Clone, Copy, Debug)]
pub struct TicketSpec {
    /// The kind this spec describes.
    pub kind: TicketKind,
    /// Display title.
    pub title: &'static str,
    /// Backend ticket-definition code.
    pub code: &'static str,
    /// Field table in prompt order.
    pub fields: &'static [FieldSpec],
    /// One-line hint fed to the classifier prompt.
    pub hint: &'static str,
    /// Filed in the portal directly; no conversational collection.
    pub link_only: bool,
    /// Interaction shape.
    pub flow: FlowShape,
}

impl TicketSpec {
    /// Field spec by canonical id.
    #[must_use]
    pub fn field(&self, id: &str) -> Option<&'static FieldSpec> {
        self.fields.iter().find(|f| f.id == id)
    }

    /// Required field ids in prompt order.
    pub fn required_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Fields that only an explicit selection may set.
    pub fn explicit_fields(&self) -> impl Iterator<Item = &'static FieldSpec> {
        self.fields.iter().filter(|f| f.must_be_explicit)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Field tables
// ─────────────────────────────────────────────────────────────────────────────

const LEAVE_FIELDS: &[FieldSpec] = &[
    FieldSpec::free("leave_type", "Leave type")
        .options(&["annual", "sick", "personal", "marriage", "maternity"]),
    FieldSpec::date("start_date", "Start date"),
    FieldSpec::date("end_date", "End date"),
    FieldSpec::free("days", "Days"),
    FieldSpec::free("reason", "Reason"),
];

const OUTING_FIELDS: &[FieldSpec] = &[
    FieldSpec::free("destination", "Destination"),
    FieldSpec::date("start_date", "Start date"),
    FieldSpec::date("end_date", "End date"),
    FieldSpec::free("reason", "Reason"),
];

const SEAL_FIELDS: &[FieldSpec] = &[
    FieldSpec::free("review_flag", "Legal review completed")
        .options(&["yes", "no"])
        .explicit(),
    FieldSpec::free("delivery_method", "Delivery method")
        .options(&["stamped", "courier", "pickup"])
        .explicit(),
    FieldSpec::free("document_name", "Document name"),
    FieldSpec::free("document_type", "Document type")
        .options(&["contract", "agreement", "certificate", "letter", "other"]),
    FieldSpec::free("admin_note", "Note to admin").optional(),
];

const PURCHASE_FIELDS: &[FieldSpec] = &[
    FieldSpec::free("purchase_reason", "Purchase reason"),
    FieldSpec::free("purchase_type", "Purchase type"),
    FieldSpec::date("expected_date", "Expected date"),
    FieldSpec::free("cost_detail", "Cost detail"),
];

const ONBOARDING_FIELDS: &[FieldSpec] = &[
    FieldSpec::free("name", "Name"),
    FieldSpec::free("department", "Department"),
    FieldSpec::free("position", "Position"),
    FieldSpec::date("entry_date", "Entry date"),
];

const INVOICE_FIELDS: &[FieldSpec] = &[
    FieldSpec::free("invoice_type", "Invoice type").user_supplied(),
    FieldSpec::free("invoice_items", "Invoice items").user_supplied(),
    FieldSpec::free("amount", "Amount").wire("total_amount"),
    FieldSpec::free("buyer_name", "Buyer name"),
    FieldSpec::free("tax_id", "Tax ID"),
    FieldSpec::free("contract_no", "Contract number"),
    FieldSpec::free("settlement_no", "Settlement number"),
    FieldSpec::free("remarks", "Remarks").optional(),
];

static LEAVE: TicketSpec = TicketSpec {
    kind: TicketKind::Leave,
    title: "Leave",
    code: "LEAVE-01",
    fields: LEAVE_FIELDS,
    hint: "time off: vacation, sick days, personal leave",
    link_only: false,
    flow: FlowShape::SingleTurn,
};

static OUTING: TicketSpec = TicketSpec {
    kind: TicketKind::Outing,
    title: "Outing",
    code: "OUTING-01",
    fields: OUTING_FIELDS,
    hint: "working off-site: client visits, field work, business trips",
    link_only: false,
    flow: FlowShape::SingleTurn,
};

static SEAL: TicketSpec = TicketSpec {
    kind: TicketKind::SealUsage,
    title: "Seal usage",
    code: "SEAL-01",
    fields: SEAL_FIELDS,
    hint: "stamping documents with a company seal; usually comes with file uploads",
    link_only: false,
    flow: FlowShape::SealMultiFile,
};

static PURCHASE: TicketSpec = TicketSpec {
    kind: TicketKind::Purchase,
    title: "Purchase",
    code: "PURCHASE-01",
    fields: PURCHASE_FIELDS,
    hint: "buying equipment, supplies, or services",
    link_only: false,
    flow: FlowShape::SingleTurn,
};

static ONBOARDING: TicketSpec = TicketSpec {
    kind: TicketKind::Onboarding,
    title: "Onboarding",
    code: "ONBOARD-01",
    fields: ONBOARDING_FIELDS,
    hint: "new-hire onboarding paperwork",
    link_only: true,
    flow: FlowShape::SingleTurn,
};

static INVOICE: TicketSpec = TicketSpec {
    kind: TicketKind::Invoice,
    title: "Invoice",
    code: "INVOICE-01",
    fields: INVOICE_FIELDS,
    hint: "issuing an invoice; needs a settlement sheet and a contract",
    link_only: false,
    flow: FlowShape::InvoiceDualDoc,
};

impl TicketKind {
    /// All kinds in catalog order.
    #[must_use]
    pub fn all() -> &'static [TicketKind] {
        &[
            Self::Leave,
            Self::Outing,
            Self::SealUsage,
            Self::Purchase,
            Self::Onboarding,
            Self::Invoice,
        ]
    }

    /// Static spec for this kind.
    #[must_use]
    pub fn spec(self) -> &'static TicketSpec {
        match self {
            Self::Leave => &LEAVE,
            Self::Outing => &OUTING,
            Self::SealUsage => &SEAL,
            Self::Purchase => &PURCHASE,
            Self::Onboarding => &ONBOARDING,
            Self::Invoice => &INVOICE,
        }
    }

    /// Stable snake_case name, matching the serde representation.
    #[must_use]
    pub fn slug(self) -> &'static str {
        match self {
            Self::Leave => "leave",
            Self::Outing => "outing",
            Self::SealUsage => "seal_usage",
            Self::Purchase => "purchase",
            Self::Onboarding => "onboarding",
            Self::Invoice => "invoice",
        }
    }

    /// Parse a slug as produced by [`Self::slug`].
    #[must_use]
    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::all().iter().copied().find(|k| k.slug() == slug)
    }
}

impl fmt::Display for TicketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().title)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Reviewer comment rules
// ─────────────────────────────────────────────────────────────────────────────

/// Derive the comment attached for the reviewing administrator from the
/// finalized fields. Rules are per-kind thresholds; kinds without rules get
/// a generic note.
#[must_use]
pub fn admin_comment(kind: TicketKind, fields: &FieldMap) -> String {
    match kind {
        TicketKind::Leave => {
            let days = fields.get("days").and_then(FieldValue::as_number).unwrap_or(0.0);
            if days <= 3.0 {
                "Short leave; routine approval.".to_string()
            } else if days <= 7.0 {
                "Multi-day leave; please check team coverage.".to_string()
            } else {
                "Extended leave; department-head sign-off required.".to_string()
            }
        }
        TicketKind::Purchase => {
            let amount = fields
                .get("cost_detail")
                .or_else(|| fields.get("amount"))
                .and_then(FieldValue::as_number)
                .unwrap_or(0.0);
            if amount <= 1000.0 {
                "Small purchase; routine approval.".to_string()
            } else if amount <= 5000.0 {
                "Mid-size purchase; please verify budget line.".to_string()
            } else {
                "Large purchase; finance review required.".to_string()
            }
        }
        TicketKind::SealUsage => {
            let reviewed = fields
                .get("review_flag")
                .and_then(FieldValue::as_flag)
                .unwrap_or(false);
            if reviewed {
                "Legal review completed.".to_string()
            } else {
                "No legal review; please double-check document terms.".to_string()
            }
        }
        _ => "Submitted via assistant.".to_string(),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Label aliases
// ─────────────────────────────────────────────────────────────────────────────

/// Map a backend form label or loose alias to a canonical field id. Backend
/// definitions label fields inconsistently across tenants; this keeps the
/// mapping in one place.
#[must_use]
pub fn canonical_field_id(label: &str) -> Option<&'static str> {
    let norm = label.trim().to_ascii_lowercase();
    match norm.as_str() {
        "amount" | "total" | "invoice amount" | "total amount" => Some("amount"),
        "buyer" | "buyer name" | "purchaser" | "company name" => Some("buyer_name"),
        "tax id" | "tax no" | "tax number" | "taxpayer id" => Some("tax_id"),
        "contract no" | "contract number" => Some("contract_no"),
        "settlement no" | "settlement number" | "statement no" => Some("settlement_no"),
        "invoice type" => Some("invoice_type"),
        "invoice items" | "items" => Some("invoice_items"),
        "remarks" | "notes" | "note" => Some("remarks"),
        "document name" => Some("document_name"),
        "document type" => Some("document_type"),
        _ => None,
    }
}
