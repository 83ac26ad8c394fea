//! Field schema registry
//!
//! A claim type maps to an ordered list of field specifications. Order is
//! significant: the controller asks for missing fields and surfaces
//! conflicts in declaration order.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::IntakeError;
use crate::normalize::FieldKind;

/// Claim type used when none is given
pub const DEFAULT_CLAIM_TYPE: &str = "motor_accident";

/// One field of a claim schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, as used by extractors and in the final record
    pub name: String,
    /// Expected value shape
    pub kind: FieldKind,
    /// Whether the claim is incomplete without it
    pub required: bool,
}

impl FieldSpec {
    /// Creates a required field
    pub fn required(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
        }
    }

    /// Creates an optional field
    pub fn optional(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
        }
    }

    /// Name for operator-facing text (`other_vehicle_plate` -> `other vehicle plate`)
    pub fn label(&self) -> String {
        self.name.replace('_', " ")
    }
}

/// The ordered field set of one claim type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimSchema {
    pub claim_type: String,
    pub fields: Vec<FieldSpec>,
}

impl ClaimSchema {
    /// Creates a schema from its fields, in declaration order
    pub fn new(claim_type: impl Into<String>, fields: Vec<FieldSpec>) -> Self {
        Self {
            claim_type: claim_type.into(),
            fields,
        }
    }

    /// Looks up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the schema declares the field
    pub fn contains(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// Required fields in declaration order
    pub fn required_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.required)
    }

    /// Number of required fields
    pub fn required_count(&self) -> usize {
        self.required_fields().count()
    }

    /// Position of a field in declaration order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// Registry of claim schemas keyed by claim type
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, ClaimSchema>,
    default_schema: ClaimSchema,
}

impl SchemaRegistry {
    /// Creates an empty registry with the given fallback schema
    pub fn new(default_schema: ClaimSchema) -> Self {
        Self {
            schemas: HashMap::new(),
            default_schema,
        }
    }

    /// Registry with the built-in claim types (`motor_accident`, `theft`)
    pub fn builtin() -> Self {
        let base = vec![
            FieldSpec::required("date", FieldKind::Date),
            FieldSpec::required("time", FieldKind::Time),
            FieldSpec::required("location", FieldKind::Text),
            FieldSpec::required("other_vehicle_involved", FieldKind::Boolean),
            FieldSpec::required("injuries", FieldKind::Text),
            FieldSpec::required("description", FieldKind::Text),
        ];

        let mut motor = base.clone();
        motor.push(FieldSpec::optional("other_vehicle_plate", FieldKind::Plate));
        motor.push(FieldSpec::optional("estimated_damage_cost", FieldKind::Amount));

        let theft = vec![
            FieldSpec::required("date", FieldKind::Date),
            FieldSpec::required("location", FieldKind::Text),
            FieldSpec::required("description", FieldKind::Text),
            FieldSpec::optional("estimated_damage_cost", FieldKind::Amount),
        ];

        Self::new(ClaimSchema::new("default", base))
            .with_schema(ClaimSchema::new(DEFAULT_CLAIM_TYPE, motor))
            .with_schema(ClaimSchema::new("theft", theft))
    }

    /// Registers (or replaces) a schema
    pub fn with_schema(mut self, schema: ClaimSchema) -> Self {
        self.schemas.insert(schema.claim_type.clone(), schema);
        self
    }

    /// Strict lookup
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::UnknownClaimType` if no schema is registered.
    pub fn get(&self, claim_type: &str) -> Result<&ClaimSchema, IntakeError> {
        self.schemas
            .get(claim_type)
            .ok_or_else(|| IntakeError::UnknownClaimType(claim_type.to_string()))
    }

    /// Lookup that falls back to the default schema
    ///
    /// The returned schema always carries the requested claim type; the
    /// boolean is true when the fallback was used.
    pub fn resolve(&self, claim_type: &str) -> (ClaimSchema, bool) {
        match self.schemas.get(claim_type) {
            Some(schema) => (schema.clone(), false),
            None => (
                ClaimSchema::new(claim_type, self.default_schema.fields.clone()),
                true,
            ),
        }
    }

    /// Registered claim types, sorted
    pub fn claim_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.schemas.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_motor_schema_order_and_optionals() {
        let registry = SchemaRegistry::builtin();
        let schema = registry.get("motor_accident").unwrap();

        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names[0], "date");
        assert_eq!(schema.required_count(), 6);
        assert!(!schema.field("other_vehicle_plate").unwrap().required);
    }

    #[test]
    fn test_unknown_claim_type_falls_back() {
        let registry = SchemaRegistry::builtin();
        assert!(matches!(registry.get("flood"), Err(IntakeError::UnknownClaimType(_))));

        let (schema, defaulted) = registry.resolve("flood");
        assert!(defaulted);
        assert_eq!(schema.claim_type, "flood");
        assert_eq!(schema.required_count(), 6);
    }

    #[test]
    fn test_label() {
        let spec = FieldSpec::optional("other_vehicle_plate", FieldKind::Plate);
        assert_eq!(spec.label(), "other vehicle plate");
    }
}
