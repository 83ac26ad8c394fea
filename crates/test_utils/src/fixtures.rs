//! Pre-built Test Fixtures
//!
//! Schemas and document texts that keep tests consistent and predictable.

use std::path::PathBuf;

use domain_intake::{ClaimSchema, FieldKind, FieldSpec, SchemaRegistry};

/// Fixture schemas
pub struct SchemaFixtures;

impl SchemaFixtures {
    /// `{date, location, injuries}`, all required
    pub fn date_location_injuries() -> ClaimSchema {
        ClaimSchema::new(
            "scenario_a",
            vec![
                FieldSpec::required("date", FieldKind::Date),
                FieldSpec::required("location", FieldKind::Text),
                FieldSpec::required("injuries", FieldKind::Text),
            ],
        )
    }

    /// `{date, time}`, both required
    pub fn date_time() -> ClaimSchema {
        ClaimSchema::new(
            "scenario_b",
            vec![
                FieldSpec::required("date", FieldKind::Date),
                FieldSpec::required("time", FieldKind::Time),
            ],
        )
    }

    pub fn motor_accident() -> ClaimSchema {
        Self::builtin("motor_accident")
    }

    pub fn theft() -> ClaimSchema {
        Self::builtin("theft")
    }

    fn builtin(claim_type: &str) -> ClaimSchema {
        let (schema, _) = SchemaRegistry::builtin().resolve(claim_type);
        schema
    }
}

/// Fixture document texts
pub struct DocumentFixtures;

impl DocumentFixtures {
    /// A labeled police report for a motor accident
    pub fn police_report() -> &'static str {
        "CANTONAL POLICE ZURICH - ACCIDENT REPORT\n\
         Date of incident: 2025-01-12\n\
         Time: 18:45\n\
         Location: Main Street 5, Zurich\n\
         Other vehicle plate: ZH 223014\n\
         Injuries: none\n\
         Description: Vehicle A rear-ended vehicle B at a red light.\n"
    }

    /// A short theft report without a time
    pub fn theft_report() -> &'static str {
        "Theft report\n\
         Date: 03.05.2024\n\
         Location: Bahnhofplatz, Bern\n\
         Description: Bicycle stolen from the rack in front of the station.\n\
         Estimated damage: CHF 1'200\n"
    }

    /// Writes a document into `dir` and returns its path
    pub fn write(dir: &tempfile::TempDir, file_name: &str, text: &str) -> PathBuf {
        let path = dir.path().join(file_name);
        std::fs::write(&path, text).expect("write fixture document");
        path
    }
}
