//! Fact reconciler
//!
//! Merges operator-declared and document-extracted values into a claim
//! record and classifies each touched field as missing, single-sourced,
//! agreed or conflicting.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::normalize::{collapse_whitespace, is_placeholder};
use crate::record::ClaimRecord;
use crate::schema::ClaimSchema;

/// Field name to raw value; `None` means the source does not know the value
pub type SourceValues = BTreeMap<String, Option<String>>;

/// Which slot a batch of values is written to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    User,
    Document,
}

impl Source {
    fn as_str(&self) -> &'static str {
        match self {
            Source::User => "user",
            Source::Document => "document",
        }
    }
}

/// Reconciles source values against one schema
#[derive(Debug, Clone, Copy)]
pub struct Reconciler<'a> {
    schema: &'a ClaimSchema,
}

impl<'a> Reconciler<'a> {
    pub fn new(schema: &'a ClaimSchema) -> Self {
        Self { schema }
    }

    /// Returns the record with both batches of values applied
    ///
    /// Unknown values and placeholders are treated as absent and leave the
    /// slot untouched. Field names outside the schema are logged and
    /// dropped. Applying the same values twice yields the same record.
    pub fn reconcile(&self, record: &ClaimRecord, user: &SourceValues, doc: &SourceValues) -> ClaimRecord {
        let mut next = record.clone();
        self.apply(&mut next, user, doc);
        next
    }

    /// In-place variant used by the controller on its working copy
    ///
    /// Returns the schema fields whose slots were written, in schema order.
    pub(crate) fn apply(&self, record: &mut ClaimRecord, user: &SourceValues, doc: &SourceValues) -> Vec<String> {
        let mut touched = Vec::new();
        self.write_slots(record, user, Source::User, &mut touched);
        self.write_slots(record, doc, Source::Document, &mut touched);

        touched.sort_by_key(|name| self.schema.position(name));
        touched.dedup();

        for name in &touched {
            if let Some(spec) = self.schema.field(name) {
                record.field_mut(name).recompute(spec.kind);
            }
        }
        touched
    }

    fn write_slots(&self, record: &mut ClaimRecord, values: &SourceValues, source: Source, touched: &mut Vec<String>) {
        for (name, value) in values {
            if !self.schema.contains(name) {
                warn!(field = %name, source = source.as_str(), "ignoring field outside the claim schema");
                continue;
            }
            let raw = match value {
                Some(raw) if !is_placeholder(raw) => collapse_whitespace(raw),
                _ => {
                    debug!(field = %name, source = source.as_str(), "value unknown, slot left untouched");
                    continue;
                }
            };
            let field = record.field_mut(name);
            match source {
                Source::User => field.set_user_value(raw),
                Source::Document => field.set_doc_value(raw),
            }
            touched.push(name.clone());
        }
    }
}

/// Builds source values from plain pairs
pub fn source_values<I, K, V>(pairs: I) -> SourceValues
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), Some(v.into())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldState;
    use crate::normalize::FieldKind;
    use crate::schema::FieldSpec;

    fn schema() -> ClaimSchema {
        ClaimSchema::new(
            "test",
            vec![
                FieldSpec::required("date", FieldKind::Date),
                FieldSpec::required("location", FieldKind::Text),
                FieldSpec::required("injuries", FieldKind::Text),
            ],
        )
    }

    #[test]
    fn test_states_per_source_combination() {
        let schema = schema();
        let record = ClaimRecord::open(&schema, 5);
        let reconciler = Reconciler::new(&schema);

        let next = reconciler.reconcile(
            &record,
            &source_values([("date", "2024-01-01"), ("location", "Zurich")]),
            &source_values([("location", "Zürich"), ("injuries", "none")]),
        );

        assert_eq!(next.field_state("date"), FieldState::UserOnly);
        assert_eq!(next.field_state("location"), FieldState::Conflicting);
        assert_eq!(next.field_state("injuries"), FieldState::DocOnly);
        assert_eq!(next.resolved_value("location"), None);
        assert_eq!(next.resolved_value("injuries"), Some("none"));
    }

    #[test]
    fn test_unknown_and_outside_fields_are_ignored() {
        let schema = schema();
        let record = ClaimRecord::open(&schema, 5);
        let reconciler = Reconciler::new(&schema);

        let mut doc = source_values([("weather", "rain"), ("injuries", "unknown")]);
        doc.insert("date".to_string(), None);
        let next = reconciler.reconcile(&record, &SourceValues::new(), &doc);

        assert!(next.field("weather").is_none());
        assert_eq!(next.field_state("injuries"), FieldState::Missing);
        assert_eq!(next.field_state("date"), FieldState::Missing);
    }

    #[test]
    fn test_reconcile_does_not_mutate_input() {
        let schema = schema();
        let record = ClaimRecord::open(&schema, 5);
        let reconciler = Reconciler::new(&schema);

        let _ = reconciler.reconcile(&record, &source_values([("date", "2024-01-01")]), &SourceValues::new());
        assert_eq!(record.field_state("date"), FieldState::Missing);
    }
}
