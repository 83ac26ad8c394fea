//! Session wiring
//!
//! [`IntakeApp`] turns an [`IntakeConfig`] into a ready controller: it picks
//! the extractor, attaches the filesystem document source and runs a
//! session from declared values and documents to its outcome. Resolved
//! sessions also get a handler summary, from the model when one is
//! configured.

use std::sync::Arc;

use tracing::{info, instrument};

use domain_intake::{
    ClaimRecord, ClaimSchema, ClaimSummarizer, DocumentExtractor, DocumentSource, HandlerSummary, OperatorIo,
    ResolutionController, SchemaRegistry, SessionOutcome, SourceValues, DEFAULT_CLAIM_TYPE,
};
use infra_extraction::{build_extractor, build_summarizer, FileDocumentSource};

use crate::config::IntakeConfig;
use crate::error::AppError;

/// What the operator brings to a new session
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub claim_type: String,
    /// Values stated before the dialogue starts
    pub declared: SourceValues,
    /// Document paths, ingested in order
    pub documents: Vec<String>,
}

impl Default for SessionRequest {
    fn default() -> Self {
        Self {
            claim_type: DEFAULT_CLAIM_TYPE.to_string(),
            declared: SourceValues::new(),
            documents: Vec::new(),
        }
    }
}

impl SessionRequest {
    pub fn new(claim_type: impl Into<String>) -> Self {
        Self {
            claim_type: claim_type.into(),
            ..Self::default()
        }
    }

    pub fn declare(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.declared.insert(field.into(), Some(value.into()));
        self
    }

    pub fn with_document(mut self, path: impl Into<String>) -> Self {
        self.documents.push(path.into());
        self
    }
}

/// An ended session with everything needed for export
#[derive(Debug, Clone)]
pub struct CompletedSession {
    pub outcome: SessionOutcome,
    pub record: ClaimRecord,
    pub schema: ClaimSchema,
    /// Present for resolved sessions
    pub summary: Option<HandlerSummary>,
}

/// Application entry point for running sessions
pub struct IntakeApp {
    config: IntakeConfig,
    registry: SchemaRegistry,
    extractor: Arc<dyn DocumentExtractor>,
    summarizer: Option<Arc<dyn ClaimSummarizer>>,
    documents: Arc<dyn DocumentSource>,
}

impl IntakeApp {
    /// Builds the application from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configured extractor or summarizer cannot be built.
    pub fn from_config(config: IntakeConfig) -> Result<Self, AppError> {
        let source = config.extractor_source();
        let extractor = build_extractor(&source)?;
        let summarizer = build_summarizer(&source)?;
        let documents = Arc::new(FileDocumentSource::new());
        Ok(Self {
            config,
            registry: SchemaRegistry::builtin(),
            extractor,
            summarizer,
            documents,
        })
    }

    pub fn with_registry(mut self, registry: SchemaRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn DocumentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replaces the summarizer; `None` always uses the template summary
    pub fn with_summarizer(mut self, summarizer: Option<Arc<dyn ClaimSummarizer>>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn with_document_source(mut self, documents: Arc<dyn DocumentSource>) -> Self {
        self.documents = documents;
        self
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Opens a controller with declared values applied and documents ingested
    ///
    /// # Errors
    ///
    /// Returns an error only for invalid session state; unreadable documents
    /// are recorded and skipped.
    #[instrument(skip(self, request, operator), fields(claim_type = %request.claim_type))]
    pub async fn open(
        &self,
        request: &SessionRequest,
        operator: Arc<dyn OperatorIo>,
    ) -> Result<ResolutionController, AppError> {
        let mut controller = ResolutionController::for_claim_type(
            &self.registry,
            &request.claim_type,
            self.config.controller_settings(),
            self.extractor.clone(),
            operator,
        )
        .with_document_source(self.documents.clone());

        controller.apply_user_values(&request.declared)?;
        for document in &request.documents {
            controller.ingest_document(document).await?;
        }
        Ok(controller)
    }

    /// Runs a session to its end
    ///
    /// # Errors
    ///
    /// Returns an error only for invalid session state.
    pub async fn run(
        &self,
        request: &SessionRequest,
        operator: Arc<dyn OperatorIo>,
    ) -> Result<CompletedSession, AppError> {
        let mut controller = self.open(request, operator).await?;
        let outcome = controller.run().await?;
        let summary = if outcome.is_resolved() {
            Some(controller.summarize(self.summarizer.as_deref()).await?)
        } else {
            None
        };
        info!(
            session_id = %controller.record().session_id(),
            resolved = outcome.is_resolved(),
            turns = controller.record().turn_count(),
            "claim session ended"
        );
        Ok(CompletedSession {
            outcome,
            record: controller.record().clone(),
            schema: controller.schema().clone(),
            summary,
        })
    }
}

impl std::fmt::Debug for IntakeApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntakeApp")
            .field("extractor", &self.extractor.name())
            .field("summarizer", &self.summarizer.as_ref().map(|s| s.name().to_string()))
            .field("claim_types", &self.registry.claim_types())
            .finish()
    }
}
