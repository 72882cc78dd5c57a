//! Recoverable mapping errors.
//!
//! Field-level failures never abort a mapping call. They are recorded here,
//! tagged with the target path they occurred at, and read back at the end
//! of the call to decide the return shape and to build the report.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kinds of recoverable errors, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    RequiredFieldMissing,
    TypeMismatch,
    PartialModelBuilt,
    EmptyModel,
    ListBuildLimitReached,
    FieldCreationFailure,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 6] = [
        ErrorKind::RequiredFieldMissing,
        ErrorKind::TypeMismatch,
        ErrorKind::PartialModelBuilt,
        ErrorKind::EmptyModel,
        ErrorKind::ListBuildLimitReached,
        ErrorKind::FieldCreationFailure,
    ];

    /// Stable upper-case name used in reports.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RequiredFieldMissing => "REQUIRED_FIELD_MISSING",
            ErrorKind::TypeMismatch => "TYPE_MISMATCH",
            ErrorKind::PartialModelBuilt => "PARTIAL_MODEL_BUILT",
            ErrorKind::EmptyModel => "EMPTY_MODEL",
            ErrorKind::ListBuildLimitReached => "LIST_BUILD_LIMIT_REACHED",
            ErrorKind::FieldCreationFailure => "FIELD_CREATION_FAILURE",
        }
    }

    /// One-line description shown in the detailed report.
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::RequiredFieldMissing => "Required field not found in source data",
            ErrorKind::TypeMismatch => "Attempt to match a value with the wrong type",
            ErrorKind::PartialModelBuilt => "The new model was partially created",
            ErrorKind::EmptyModel => "None of the fields in the new model were found in the source data",
            ErrorKind::ListBuildLimitReached => {
                "The limit of new models for a list of new models was reached"
            }
            ErrorKind::FieldCreationFailure => "An unexpected error occurred while creating a field",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// Target path the error occurred at (`billing.city`, `lines[2]`).
    pub field_path: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorRecord {
    pub fn new(field_path: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Which records [`ErrorRegistry::retract`] removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetractScope {
    /// Records at exactly the given path.
    Exact,
    /// Records at the given path or any path below it. `lines` covers
    /// `lines`, `lines.sku` and `lines[0]`, but not `lines_total`.
    Descendants,
}

impl RetractScope {
    fn matches(self, record_path: &str, path: &str) -> bool {
        match self {
            RetractScope::Exact => record_path == path,
            RetractScope::Descendants => match record_path.strip_prefix(path) {
                Some(rest) => path.is_empty() || rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
                None => false,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Message templates
// ---------------------------------------------------------------------------

pub(crate) fn required_field_message(field: &str, parent: &str, source: &str) -> String {
    format!(
        "The field '{}' is required in the '{}' model and could not be matched in the '{}' model.",
        field, parent, source
    )
}

pub(crate) fn type_mismatch_message(field: &str, field_type: &str, value: &str, value_type: &str) -> String {
    format!(
        "The field '{}' of type '{}' cannot match the value '{}' of type '{}'",
        field, field_type, value, value_type
    )
}

pub(crate) fn partial_model_message(model: &str) -> String {
    format!("The new model '{}' was partially built.", model)
}

pub(crate) fn empty_model_message(model: &str) -> String {
    format!("No data found to build the new model '{}'.", model)
}

pub(crate) fn limit_reached_message(limit: usize, model: &str) -> String {
    format!(
        "Limit of '{}' reached for building list of '{}' models. Raise max-iterations to extend the limit.",
        limit, model
    )
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Error records of one mapping call, grouped by kind.
///
/// Kinds iterate in declaration order; records keep insertion order within
/// their kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorRegistry {
    records: BTreeMap<ErrorKind, Vec<ErrorRecord>>,
}

/// Line appended to the report when a partial mapping is returned.
pub const PARTIAL_DISCLAIMER: &str = "⚠️ Returning partially mapped data.";

impl ErrorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, record: ErrorRecord) {
        tracing::debug!(kind = %record.kind, path = %record.field_path, "recorded mapping error");
        self.records.entry(record.kind).or_default().push(record);
    }

    /// Remove every record of `kind` whose path matches `path` under `scope`.
    /// Returns how many were removed.
    pub fn retract(&mut self, kind: ErrorKind, scope: RetractScope, path: &str) -> usize {
        let Some(records) = self.records.get_mut(&kind) else {
            return 0;
        };
        let before = records.len();
        records.retain(|record| !scope.matches(&record.field_path, path));
        let removed = before - records.len();
        if records.is_empty() {
            self.records.remove(&kind);
        }
        if removed > 0 {
            tracing::trace!(%kind, %path, removed, "retracted mapping errors");
        }
        removed
    }

    pub fn has_errors(&self) -> bool {
        !self.records.is_empty()
    }

    /// Total number of records across all kinds.
    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, kind: ErrorKind) -> usize {
        self.records.get(&kind).map_or(0, Vec::len)
    }

    pub fn get(&self, kind: ErrorKind) -> &[ErrorRecord] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All records, grouped by kind.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.records.values().flatten()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Count-by-kind report.
    pub fn summarize(&self, target: &str) -> String {
        let mut lines = vec![format!(
            "'{}' error(s) found while mapping '{}':\n",
            self.len(),
            target
        )];
        for (kind, records) in &self.records {
            lines.push(format!("  > {} {}", records.len(), kind));
        }
        lines.join("\n")
    }

    /// One block per record.
    pub fn detail(&self) -> String {
        if self.is_empty() {
            return "No errors found.".to_string();
        }
        self.iter()
            .map(|record| {
                format!(
                    "      + Field: {}\n        Type: {}\n        Description: {}\n        Message: {}",
                    record.field_path,
                    record.kind,
                    record.kind.description(),
                    record.message
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Summary, detail and the partial-data disclaimer.
    pub fn report(&self, target: &str) -> String {
        format!("{}\n\n{}\n\n{}\n", self.summarize(target), self.detail(), PARTIAL_DISCLAIMER)
    }
}

impl fmt::Display for ErrorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (kind, records) in &self.records {
            writeln!(f, "{}: {}", kind, records.len())?;
        }
        Ok(())
    }
}

impl<'r> IntoIterator for &'r ErrorRegistry {
    type Item = &'r ErrorRecord;
    type IntoIter = std::iter::Flatten<std::collections::btree_map::Values<'r, ErrorKind, Vec<ErrorRecord>>>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.values().flatten()
    }
}

impl Serialize for ErrorRegistry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn required(path: &str) -> ErrorRecord {
        ErrorRecord::new(path, ErrorKind::RequiredFieldMissing, "missing")
    }

    #[test]
    fn test_grouped_by_kind_in_declaration_order() {
        let mut errors = ErrorRegistry::new();
        errors.add(ErrorRecord::new("lines", ErrorKind::EmptyModel, "empty"));
        errors.add(required("b"));
        errors.add(required("a"));

        let paths: Vec<&str> = errors.iter().map(|r| r.field_path.as_str()).collect();
        assert_eq!(paths, vec!["b", "a", "lines"]);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors.count(ErrorKind::RequiredFieldMissing), 2);
        assert_eq!(errors.count(ErrorKind::TypeMismatch), 0);
    }

    #[test]
    fn test_retract_exact() {
        let mut errors = ErrorRegistry::new();
        errors.add(required("billing"));
        errors.add(required("billing.city"));

        assert_eq!(errors.retract(ErrorKind::RequiredFieldMissing, RetractScope::Exact, "billing"), 1);
        assert_eq!(errors.get(ErrorKind::RequiredFieldMissing)[0].field_path, "billing.city");
    }

    #[test]
    fn test_retract_descendants_is_segment_aware() {
        let mut errors = ErrorRegistry::new();
        errors.add(required("lines"));
        errors.add(required("lines.sku"));
        errors.add(required("lines[3].sku"));
        errors.add(required("lines_total"));

        let removed = errors.retract(ErrorKind::RequiredFieldMissing, RetractScope::Descendants, "lines");
        assert_eq!(removed, 3);
        assert_eq!(errors.get(ErrorKind::RequiredFieldMissing), &[required("lines_total")]);
    }

    #[test]
    fn test_retract_last_record_clears_kind() {
        let mut errors = ErrorRegistry::new();
        errors.add(ErrorRecord::new("lines[2]", ErrorKind::EmptyModel, "empty"));
        errors.retract(ErrorKind::EmptyModel, RetractScope::Descendants, "lines[2]");
        assert!(!errors.has_errors());
    }

    #[test]
    fn test_report_layout() {
        let mut errors = ErrorRegistry::new();
        errors.add(ErrorRecord::new(
            "address_id",
            ErrorKind::RequiredFieldMissing,
            required_field_message("address_id", "Address", "CustomerDetails"),
        ));

        let report = errors.report("Address");
        assert!(report.starts_with("'1' error(s) found while mapping 'Address':\n\n  > 1 REQUIRED_FIELD_MISSING"));
        assert!(report.contains("      + Field: address_id\n        Type: REQUIRED_FIELD_MISSING"));
        assert!(report.contains(
            "Message: The field 'address_id' is required in the 'Address' model and could not be matched in the 'CustomerDetails' model."
        ));
        assert!(report.trim_end().ends_with(PARTIAL_DISCLAIMER));
    }

    #[test]
    fn test_serializes_as_flat_list() {
        let mut errors = ErrorRegistry::new();
        errors.add(ErrorRecord::new("qty", ErrorKind::TypeMismatch, "bad"));
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!([{ "field_path": "qty", "kind": "TYPE_MISMATCH", "message": "bad" }])
        );
    }

    #[test]
    fn test_empty_detail() {
        assert_eq!(ErrorRegistry::new().detail(), "No errors found.");
    }
}
