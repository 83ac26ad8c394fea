//! Property-Based Test Generators
//!
//! Proptest strategies for schemas and source values whose values always
//! parse for their field kind.

use domain_intake::{ClaimSchema, FieldKind, FieldSpec, SourceValues};
use proptest::prelude::*;

/// Strategy for field kinds
pub fn field_kind_strategy() -> impl Strategy<Value = FieldKind> {
    prop_oneof![
        Just(FieldKind::Text),
        Just(FieldKind::Date),
        Just(FieldKind::Time),
        Just(FieldKind::Boolean),
        Just(FieldKind::Amount),
        Just(FieldKind::Plate),
    ]
}

/// Strategy for raw values that parse for `kind`
pub fn valid_value_strategy(kind: FieldKind) -> BoxedStrategy<String> {
    match kind {
        // the prefix keeps generated text clear of the placeholder words
        FieldKind::Text => "Loc [a-z]{3,8}".boxed(),
        FieldKind::Date => (2000u32..2030, 1u32..13, 1u32..29)
            .prop_map(|(y, m, d)| format!("{y:04}-{m:02}-{d:02}"))
            .boxed(),
        FieldKind::Time => (0u32..24, 0u32..60)
            .prop_map(|(h, m)| format!("{h:02}:{m:02}"))
            .boxed(),
        FieldKind::Boolean => prop_oneof![Just("yes".to_string()), Just("no".to_string())].boxed(),
        FieldKind::Amount => (1u32..100_000).prop_map(|n| n.to_string()).boxed(),
        FieldKind::Plate => ("[A-Z]{2}", 100u32..999_999)
            .prop_map(|(prefix, digits)| format!("{prefix} {digits}"))
            .boxed(),
    }
}

/// Strategy for schemas of 1 to `max_fields` fields, at least one required
pub fn schema_strategy(max_fields: usize) -> impl Strategy<Value = ClaimSchema> {
    prop::collection::vec((field_kind_strategy(), any::<bool>()), 1..=max_fields.max(1)).prop_map(|specs| {
        let fields = specs
            .into_iter()
            .enumerate()
            .map(|(i, (kind, required))| {
                let name = format!("field_{i}");
                if required || i == 0 {
                    FieldSpec::required(name, kind)
                } else {
                    FieldSpec::optional(name, kind)
                }
            })
            .collect();
        ClaimSchema::new("generated", fields)
    })
}

/// Strategy for one source's values over a schema; each field may be absent
pub fn source_values_strategy(schema: &ClaimSchema) -> BoxedStrategy<SourceValues> {
    let per_field: Vec<BoxedStrategy<(String, Option<String>)>> = schema
        .fields
        .iter()
        .map(|spec| {
            let name = spec.name.clone();
            prop::option::of(valid_value_strategy(spec.kind))
                .prop_map(move |value| (name.clone(), value))
                .boxed()
        })
        .collect();
    per_field
        .prop_map(|pairs| pairs.into_iter().collect::<SourceValues>())
        .boxed()
}

/// Strategy for a schema with operator and document values
pub fn session_inputs_strategy(
    max_fields: usize,
) -> impl Strategy<Value = (ClaimSchema, SourceValues, SourceValues)> {
    schema_strategy(max_fields).prop_flat_map(|schema| {
        let user = source_values_strategy(&schema);
        let doc = source_values_strategy(&schema);
        (Just(schema), user, doc)
    })
}

/// A fixed answer that parses for `kind`
pub fn sample_answer(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Text => "Loc answered",
        FieldKind::Date => "2024-01-01",
        FieldKind::Time => "12:00",
        FieldKind::Boolean => "no",
        FieldKind::Amount => "1500",
        FieldKind::Plate => "ZH 1234",
    }
}
