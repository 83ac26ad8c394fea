//! Completeness and consistency evaluation

use serde::{Deserialize, Serialize};

use crate::field::FieldState;
use crate::record::ClaimRecord;
use crate::schema::ClaimSchema;

/// What still stands between a record and finalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Required fields in state `Missing`, in schema order
    pub missing: Vec<String>,
    /// Fields in state `Conflicting`, required or not, in schema order
    pub conflicting: Vec<String>,
    /// Share of required fields with a resolved value, two decimals
    pub completeness: f64,
}

impl Evaluation {
    /// The loop's termination test
    pub fn is_resolvable(&self) -> bool {
        self.missing.is_empty() && self.conflicting.is_empty()
    }
}

/// Evaluates a record against its schema
pub fn evaluate(record: &ClaimRecord, schema: &ClaimSchema) -> Evaluation {
    let missing = schema
        .required_fields()
        .filter(|spec| record.field_state(&spec.name) == FieldState::Missing)
        .map(|spec| spec.name.clone())
        .collect();

    let conflicting = schema
        .fields
        .iter()
        .filter(|spec| record.field_state(&spec.name) == FieldState::Conflicting)
        .map(|spec| spec.name.clone())
        .collect();

    Evaluation {
        missing,
        conflicting,
        completeness: completeness_score(record, schema),
    }
}

/// Fraction of required fields that have a resolved value
pub fn completeness_score(record: &ClaimRecord, schema: &ClaimSchema) -> f64 {
    let required = schema.required_count();
    if required == 0 {
        return 1.0;
    }
    let filled = schema
        .required_fields()
        .filter(|spec| record.resolved_value(&spec.name).is_some())
        .count();
    (filled as f64 / required as f64 * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::FieldKind;
    use crate::reconciler::{source_values, Reconciler, SourceValues};
    use crate::schema::FieldSpec;

    #[test]
    fn test_optional_conflicts_are_reported_but_optional_gaps_are_not() {
        let schema = ClaimSchema::new(
            "test",
            vec![
                FieldSpec::required("date", FieldKind::Date),
                FieldSpec::optional("other_vehicle_plate", FieldKind::Plate),
                FieldSpec::optional("estimated_damage_cost", FieldKind::Amount),
            ],
        );
        let record = ClaimRecord::open(&schema, 5);
        let record = Reconciler::new(&schema).reconcile(
            &record,
            &source_values([("other_vehicle_plate", "ZH 1234")]),
            &source_values([("other_vehicle_plate", "BE 9999")]),
        );

        let evaluation = evaluate(&record, &schema);
        assert_eq!(evaluation.missing, vec!["date"]);
        assert_eq!(evaluation.conflicting, vec!["other_vehicle_plate"]);
        assert!(!evaluation.is_resolvable());
        assert_eq!(evaluation.completeness, 0.0);
    }

    #[test]
    fn test_completeness_rounds_to_two_decimals() {
        let schema = ClaimSchema::new(
            "test",
            vec![
                FieldSpec::required("a", FieldKind::Text),
                FieldSpec::required("b", FieldKind::Text),
                FieldSpec::required("c", FieldKind::Text),
            ],
        );
        let record = ClaimRecord::open(&schema, 5);
        let record = Reconciler::new(&schema).reconcile(&record, &source_values([("a", "x")]), &SourceValues::new());

        assert_eq!(completeness_score(&record, &schema), 0.33);
    }

    #[test]
    fn test_empty_required_set_is_complete() {
        let schema = ClaimSchema::new("test", vec![FieldSpec::optional("note", FieldKind::Text)]);
        let record = ClaimRecord::open(&schema, 5);

        let evaluation = evaluate(&record, &schema);
        assert!(evaluation.is_resolvable());
        assert_eq!(evaluation.completeness, 1.0);
    }
}
