//! Test Data Builders
//!
//! [`SessionBuilder`] assembles a controller over the in-memory adapters so
//! tests state only what the operator says, what the document says and how
//! the operator answers.

use std::sync::Arc;
use std::time::Duration;

use domain_intake::ports::memory::{ScriptedOperator, StaticExtractor};
use domain_intake::{ClaimSchema, ControllerSettings, ResolutionController, SourceValues};

use crate::fixtures::SchemaFixtures;

/// Source identifier used for the builder's document
pub const FIXTURE_DOCUMENT: &str = "fixture_document.txt";

/// Builder for a ready-to-run session
pub struct SessionBuilder {
    schema: ClaimSchema,
    settings: ControllerSettings,
    declared: SourceValues,
    document: Option<SourceValues>,
    extraction_delay: Option<Duration>,
    operator: ScriptedOperator,
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new(SchemaFixtures::motor_accident())
    }
}

impl SessionBuilder {
    pub fn new(schema: ClaimSchema) -> Self {
        Self {
            schema,
            settings: ControllerSettings::default(),
            declared: SourceValues::new(),
            document: None,
            extraction_delay: None,
            operator: ScriptedOperator::new(),
        }
    }

    pub fn max_turns(mut self, max_turns: u32) -> Self {
        self.settings = self.settings.with_max_turns(max_turns);
        self
    }

    pub fn questions_per_turn(mut self, questions: usize) -> Self {
        self.settings = self.settings.with_questions_per_turn(questions);
        self
    }

    pub fn extraction_timeout(mut self, timeout: Duration) -> Self {
        self.settings = self.settings.with_extraction_timeout(timeout);
        self
    }

    /// A value the operator states up front
    pub fn declare(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.declared.insert(field.into(), Some(value.into()));
        self
    }

    /// A value the document states; any call adds a document to the session
    pub fn document_says(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.document
            .get_or_insert_with(SourceValues::new)
            .insert(field.into(), Some(value.into()));
        self
    }

    /// Delays the document's extraction
    pub fn slow_extraction(mut self, delay: Duration) -> Self {
        self.extraction_delay = Some(delay);
        self
    }

    /// Scripted answer for a missing-field prompt
    pub fn answer(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.operator = self.operator.answer(field, value);
        self
    }

    /// Scripted answer for a confirmation request
    pub fn confirm_with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.operator = self.operator.confirm_with(field, value);
        self
    }

    /// Opens the session, applies declared values and ingests the document
    pub async fn build(self) -> BuiltSession {
        let mut extractor = StaticExtractor::new(self.document.clone().unwrap_or_default());
        if let Some(delay) = self.extraction_delay {
            extractor = extractor.with_delay(delay);
        }
        let operator = Arc::new(self.operator);
        let mut controller =
            ResolutionController::new(self.schema, self.settings, Arc::new(extractor), operator.clone());

        controller
            .apply_user_values(&self.declared)
            .expect("fresh session accepts declared values");
        if self.document.is_some() {
            controller
                .ingest_text(FIXTURE_DOCUMENT, "fixture document text")
                .await
                .expect("fresh session accepts a document");
        }

        BuiltSession { controller, operator }
    }
}

/// A built session and its scripted operator
pub struct BuiltSession {
    pub controller: ResolutionController,
    pub operator: Arc<ScriptedOperator>,
}
