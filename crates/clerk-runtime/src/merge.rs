//! Source-precedence field merging.
//!
//! Rules, in order:
//!
//! - Unknown fields are dropped.
//! - Empty values never land; a captured value is never replaced by nothing.
//! - Fields marked explicit only accept the selection source.
//! - User-supplied fields reject document inference.
//! - Enumerated fields reject values outside their option set; date fields
//!   reject values that are not `YYYY-MM-DD`.
//! - A weaker source never overwrites a stronger one. Equal sources
//!   overwrite, so a corrected message wins over the earlier one.

use clerk_core::catalog::{FieldSpec, TicketSpec};
use clerk_core::fields::{FieldMap, FieldSource, FieldValue, MergedFields};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

static DATE_SHAPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

/// Whether `value` may land on `field` when coming from `source`.
fn admissible(field: &FieldSpec, value: &FieldValue, source: FieldSource) -> bool {
    if value.is_empty() {
        return false;
    }
    if field.must_be_explicit && source != FieldSource::Selection {
        return false;
    }
    if field.user_supplied && source == FieldSource::Document {
        return false;
    }
    if field.is_date && !value.as_text().is_some_and(|t| DATE_SHAPE.is_match(t.trim())) {
        return false;
    }
    field.accepts(value)
}

/// Merge `overlay` into `target` under `source`, enforcing every rule above.
pub fn merge_into(
    target: &mut MergedFields,
    overlay: &FieldMap,
    source: FieldSource,
    spec: &TicketSpec,
) {
    for (id, value) in overlay {
        let Some(field) = spec.field(id) else {
            debug!(field = %id, "dropping unknown field");
            continue;
        };
        if !admissible(field, value, source) {
            continue;
        }
        if let Some(existing) = target.get(id) {
            if existing.source.rank() > source.rank() {
                continue;
            }
        }
        target.set(id.clone(), value.clone(), source);
    }
}

/// Required field ids still absent from `merged`, in prompt order.
#[must_use]
pub fn missing_fields(spec: &TicketSpec, merged: &MergedFields) -> Vec<String> {
    spec.required_fields()
        .filter(|f| merged.get(f.id).is_none())
        .map(|f| f.id.to_string())
        .collect()
}

/// Collapse per-file values of one field into a single ticket value:
/// all-numeric values sum, all yes/no values or-combine, anything else
/// concatenates with the filename as context.
#[must_use]
pub fn aggregate_field(per_file: &[(&str, &FieldValue)]) -> Option<FieldValue> {
    if per_file.is_empty() {
        return None;
    }
    if per_file.len() == 1 {
        return Some(per_file[0].1.clone());
    }

    let numbers: Vec<f64> = per_file.iter().filter_map(|(_, v)| v.as_number()).collect();
    if numbers.len() == per_file.len() {
        return Some(FieldValue::Number(numbers.iter().sum()));
    }

    let flags: Vec<bool> = per_file.iter().filter_map(|(_, v)| v.as_flag()).collect();
    if flags.len() == per_file.len() {
        return Some(FieldValue::Text(
            if flags.iter().any(|b| *b) { "yes" } else { "no" }.to_string(),
        ));
    }

    let joined = per_file
        .iter()
        .map(|(name, v)| format!("{name}: {v}"))
        .collect::<Vec<_>>()
        .join("; ");
    Some(FieldValue::Text(joined))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clerk_core::catalog::TicketKind;

    fn map(pairs: &[(&str, FieldValue)]) -> FieldMap {
        pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect()
    }

    // ── Precedence ──

    #[test]
    fn stronger_source_wins_and_keeps_winning() {
        let spec = TicketKind::SealUsage.spec();
        let mut merged = MergedFields::new();

        merge_into(
            &mut merged,
            &map(&[("document_type", "contract".into())]),
            FieldSource::Conversation,
            spec,
        );
        merge_into(
            &mut merged,
            &map(&[("document_type", "agreement".into())]),
            FieldSource::Document,
            spec,
        );
        assert_eq!(
            merged.get("document_type").unwrap().value,
            FieldValue::Text("agreement".into())
        );

        // A later conversational value does not demote the document one.
        merge_into(
            &mut merged,
            &map(&[("document_type", "letter".into())]),
            FieldSource::Conversation,
            spec,
        );
        assert_eq!(
            merged.get("document_type").unwrap().value,
            FieldValue::Text("agreement".into())
        );
    }

    #[test]
    fn equal_source_overwrites() {
        let spec = TicketKind::Leave.spec();
        let mut merged = MergedFields::new();
        merge_into(
            &mut merged,
            &map(&[("reason", "dentist".into())]),
            FieldSource::Conversation,
            spec,
        );
        merge_into(
            &mut merged,
            &map(&[("reason", "surgery".into())]),
            FieldSource::Conversation,
            spec,
        );
        assert_eq!(
            merged.get("reason").unwrap().value,
            FieldValue::Text("surgery".into())
        );
    }

    // ── Admissibility ──

    #[test]
    fn explicit_fields_only_accept_selection() {
        let spec = TicketKind::SealUsage.spec();
        let mut merged = MergedFields::new();

        merge_into(
            &mut merged,
            &map(&[("review_flag", "yes".into())]),
            FieldSource::Document,
            spec,
        );
        assert!(merged.get("review_flag").is_none());

        merge_into(
            &mut merged,
            &map(&[("review_flag", "yes".into())]),
            FieldSource::Selection,
            spec,
        );
        assert!(merged.get("review_flag").is_some());
    }

    #[test]
    fn user_supplied_fields_reject_document_inference() {
        let spec = TicketKind::Invoice.spec();
        let mut merged = MergedFields::new();

        merge_into(
            &mut merged,
            &map(&[("invoice_type", "VAT special".into())]),
            FieldSource::Document,
            spec,
        );
        assert!(merged.get("invoice_type").is_none());

        merge_into(
            &mut merged,
            &map(&[("invoice_type", "VAT special".into())]),
            FieldSource::Conversation,
            spec,
        );
        assert!(merged.get("invoice_type").is_some());
    }

    #[test]
    fn empty_and_invalid_values_never_land() {
        let spec = TicketKind::Leave.spec();
        let mut merged = MergedFields::new();
        merge_into(
            &mut merged,
            &map(&[("leave_type", "annual".into())]),
            FieldSource::Conversation,
            spec,
        );

        merge_into(
            &mut merged,
            &map(&[
                ("leave_type", "".into()),
                ("reason", "   ".into()),
            ]),
            FieldSource::Conversation,
            spec,
        );
        // The captured value survived the empty overlay.
        assert_eq!(
            merged.get("leave_type").unwrap().value,
            FieldValue::Text("annual".into())
        );
        assert!(merged.get("reason").is_none());

        // Out-of-enum value is discarded, not stored.
        merge_into(
            &mut merged,
            &map(&[("leave_type", "sabbatical".into())]),
            FieldSource::Conversation,
            spec,
        );
        assert_eq!(
            merged.get("leave_type").unwrap().value,
            FieldValue::Text("annual".into())
        );
    }

    #[test]
    fn malformed_dates_are_discarded() {
        let spec = TicketKind::Leave.spec();
        let mut merged = MergedFields::new();
        merge_into(
            &mut merged,
            &map(&[
                ("start_date", "next Tuesday".into()),
                ("end_date", "2026-03-02".into()),
            ]),
            FieldSource::Conversation,
            spec,
        );
        assert!(merged.get("start_date").is_none());
        assert!(merged.get("end_date").is_some());
    }

    #[test]
    fn unknown_fields_are_dropped() {
        let spec = TicketKind::Leave.spec();
        let mut merged = MergedFields::new();
        merge_into(
            &mut merged,
            &map(&[("favorite_color", "blue".into())]),
            FieldSource::Conversation,
            spec,
        );
        assert!(merged.is_empty());
    }

    // ── Missing fields ──

    #[test]
    fn missing_fields_in_prompt_order() {
        let spec = TicketKind::Leave.spec();
        let mut merged = MergedFields::new();
        merge_into(
            &mut merged,
            &map(&[("leave_type", "sick".into()), ("reason", "flu".into())]),
            FieldSource::Conversation,
            spec,
        );
        assert_eq!(
            missing_fields(spec, &merged),
            vec!["start_date", "end_date", "days"]
        );
    }

    #[test]
    fn optional_fields_are_never_missing() {
        let spec = TicketKind::SealUsage.spec();
        let merged = MergedFields::new();
        assert!(!missing_fields(spec, &merged).contains(&"admin_note".to_string()));
    }

    // ── Aggregation ──

    #[test]
    fn numeric_values_sum_across_files() {
        let a = FieldValue::Number(3.0);
        let b = FieldValue::Text("2".into());
        let out = aggregate_field(&[("a.pdf", &a), ("b.pdf", &b)]).unwrap();
        assert_eq!(out, FieldValue::Number(5.0));
    }

    #[test]
    fn flag_values_or_combine() {
        let yes = FieldValue::Text("yes".into());
        let no = FieldValue::Text("no".into());
        assert_eq!(
            aggregate_field(&[("a", &no), ("b", &yes)]).unwrap(),
            FieldValue::Text("yes".into())
        );
        assert_eq!(
            aggregate_field(&[("a", &no), ("b", &no)]).unwrap(),
            FieldValue::Text("no".into())
        );
    }

    #[test]
    fn mixed_values_concatenate_with_filenames() {
        let a = FieldValue::Text("Sales contract".into());
        let b = FieldValue::Text("NDA".into());
        let out = aggregate_field(&[("a.pdf", &a), ("b.pdf", &b)]).unwrap();
        assert_eq!(out, FieldValue::Text("a.pdf: Sales contract; b.pdf: NDA".into()));
    }

    #[test]
    fn single_file_passes_through() {
        let v = FieldValue::Text("contract".into());
        assert_eq!(aggregate_field(&[("a.pdf", &v)]).unwrap(), v);
        assert_eq!(aggregate_field(&[]), None);
    }
}
