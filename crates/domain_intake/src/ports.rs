//! Intake Domain Ports
//!
//! The resolution loop talks to three collaborators through these traits:
//!
//! - [`DocumentSource`]: returns raw document text for a source identifier
//! - [`DocumentExtractor`]: turns document text into field values
//! - [`OperatorIo`]: asks the operator for values and confirmations
//!
//! A fourth, optional one, [`ClaimSummarizer`], writes the handler summary
//! once a claim is resolved.
//!
//! The controller holds each of them as `Arc<dyn ...>` and never branches on
//! which implementation is active. Filesystem, rule-based and model-backed
//! adapters live in `infra_extraction`; the in-memory adapters in [`memory`]
//! back tests and scripted sessions.
//!
//! ```rust,ignore
//! let controller = ResolutionController::new(
//!     schema,
//!     settings,
//!     Arc::new(RuleBasedExtractor::new()),
//!     Arc::new(ScriptedOperator::new().answer("date", "2024-01-01")),
//! );
//! ```

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use core_kernel::{DomainPort, PortError};

use crate::reconciler::SourceValues;
use crate::schema::ClaimSchema;
use crate::summary::{HandlerSummary, SummaryBrief};

/// Supplies raw document text
#[async_trait]
pub trait DocumentSource: DomainPort {
    /// Reads the document identified by `source` (a path or equivalent)
    ///
    /// # Returns
    ///
    /// The document text, or `PortError::NotFound` / `PortError::Unsupported`
    async fn load(&self, source: &str) -> Result<String, PortError>;
}

/// Field values extracted from one document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    /// Field name to value; `None` is "unknown"
    pub values: SourceValues,
    /// Name of the extractor that produced the values
    pub extractor: String,
    /// True when a primary extractor failed and a fallback produced the values
    pub fallback_used: bool,
}

impl Extraction {
    pub fn new(extractor: impl Into<String>, values: SourceValues) -> Self {
        Self {
            values,
            extractor: extractor.into(),
            fallback_used: false,
        }
    }

    /// Number of fields with a known value
    pub fn known_count(&self) -> usize {
        self.values.values().filter(|v| v.is_some()).count()
    }
}

/// Turns document text into field values
#[async_trait]
pub trait DocumentExtractor: DomainPort {
    /// Short identifier used in logs and the audit trail
    fn name(&self) -> &str;

    /// Extracts the schema's fields from document text
    async fn extract(&self, text: &str, schema: &ClaimSchema) -> Result<Extraction, PortError>;
}

/// A request for one missing field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorPrompt {
    pub field: String,
    pub label: String,
    /// Accepted shape, for the operator's benefit
    pub expected: String,
    /// 1 for the first request of this field
    pub attempt: usize,
    /// Why the previous answer was not accepted
    pub retry_reason: Option<String>,
}

impl fmt::Display for OperatorPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.retry_reason {
            Some(reason) => write!(
                f,
                "{} Please provide the {} again ({}).",
                reason, self.label, self.expected
            ),
            None if self.attempt > 1 => write!(f, "I still need the {} ({}).", self.label, self.expected),
            None => write!(f, "Please provide the {}.", self.label),
        }
    }
}

/// A request to settle one conflicting field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationRequest {
    pub field: String,
    pub label: String,
    pub user_value: String,
    pub doc_value: String,
}

impl fmt::Display for ConfirmationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The {} differs: you said \"{}\" but the document says \"{}\". Which is correct?",
            self.label, self.user_value, self.doc_value
        )
    }
}

/// The operator side of the dialogue
#[async_trait]
pub trait OperatorIo: DomainPort {
    /// Asks for a missing field and returns the raw answer
    async fn ask(&self, prompt: &OperatorPrompt) -> Result<String, PortError>;

    /// Asks the operator to settle a conflict and returns the raw answer
    async fn confirm(&self, request: &ConfirmationRequest) -> Result<String, PortError>;

    /// Progress message; nothing is expected back
    async fn notify(&self, _message: &str) {}
}

/// Writes the handler summary of a resolved claim
#[async_trait]
pub trait ClaimSummarizer: DomainPort {
    fn name(&self) -> &str;

    async fn summarize(&self, brief: &SummaryBrief) -> Result<HandlerSummary, PortError>;
}

/// In-memory adapters
pub mod memory {
    use std::collections::{HashMap, VecDeque};
    use std::time::Duration;

    use tokio::sync::Mutex;

    use super::*;

    /// Operator that replays scripted answers per field
    ///
    /// Fields without a scripted answer (or whose answers ran out) get an
    /// empty answer, which the loop treats as a non-answer.
    #[derive(Debug, Default)]
    pub struct ScriptedOperator {
        answers: Mutex<HashMap<String, VecDeque<String>>>,
        confirmations: Mutex<HashMap<String, VecDeque<String>>>,
        asked: Mutex<Vec<String>>,
        confirm_requests: Mutex<Vec<ConfirmationRequest>>,
        notifications: Mutex<Vec<String>>,
    }

    impl ScriptedOperator {
        pub fn new() -> Self {
            Self::default()
        }

        /// An operator that never answers
        pub fn silent() -> Self {
            Self::default()
        }

        /// Queues an answer for a missing-field prompt
        pub fn answer(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
            self.answers
                .get_mut()
                .entry(field.into())
                .or_default()
                .push_back(value.into());
            self
        }

        /// Queues an answer for a confirmation request
        pub fn confirm_with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
            self.confirmations
                .get_mut()
                .entry(field.into())
                .or_default()
                .push_back(value.into());
            self
        }

        /// Fields asked for, in order
        pub async fn asked(&self) -> Vec<String> {
            self.asked.lock().await.clone()
        }

        /// Confirmation requests received, in order
        pub async fn confirm_requests(&self) -> Vec<ConfirmationRequest> {
            self.confirm_requests.lock().await.clone()
        }

        pub async fn notifications(&self) -> Vec<String> {
            self.notifications.lock().await.clone()
        }
    }

    impl DomainPort for ScriptedOperator {}

    #[async_trait]
    impl OperatorIo for ScriptedOperator {
        async fn ask(&self, prompt: &OperatorPrompt) -> Result<String, PortError> {
            self.asked.lock().await.push(prompt.field.clone());
            let mut answers = self.answers.lock().await;
            Ok(answers
                .get_mut(&prompt.field)
                .and_then(VecDeque::pop_front)
                .unwrap_or_default())
        }

        async fn confirm(&self, request: &ConfirmationRequest) -> Result<String, PortError> {
            self.confirm_requests.lock().await.push(request.clone());
            let mut confirmations = self.confirmations.lock().await;
            Ok(confirmations
                .get_mut(&request.field)
                .and_then(VecDeque::pop_front)
                .unwrap_or_default())
        }

        async fn notify(&self, message: &str) {
            self.notifications.lock().await.push(message.to_string());
        }
    }

    /// Extractor returning fixed values, optionally after a delay
    #[derive(Debug, Clone, Default)]
    pub struct StaticExtractor {
        values: SourceValues,
        delay: Option<Duration>,
    }

    impl StaticExtractor {
        pub fn new(values: SourceValues) -> Self {
            Self { values, delay: None }
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }
    }

    impl DomainPort for StaticExtractor {}

    #[async_trait]
    impl DocumentExtractor for StaticExtractor {
        fn name(&self) -> &str {
            "static"
        }

        async fn extract(&self, _text: &str, schema: &ClaimSchema) -> Result<Extraction, PortError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let values = self
                .values
                .iter()
                .filter(|(name, _)| schema.contains(name))
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect();
            Ok(Extraction::new(self.name(), values))
        }
    }

    /// Extractor that always fails
    #[derive(Debug, Clone)]
    pub struct FailingExtractor {
        message: String,
    }

    impl FailingExtractor {
        pub fn new(message: impl Into<String>) -> Self {
            Self { message: message.into() }
        }
    }

    impl DomainPort for FailingExtractor {}

    #[async_trait]
    impl DocumentExtractor for FailingExtractor {
        fn name(&self) -> &str {
            "failing"
        }

        async fn extract(&self, _text: &str, _schema: &ClaimSchema) -> Result<Extraction, PortError> {
            Err(PortError::ServiceUnavailable {
                service: self.message.clone(),
            })
        }
    }

    /// Summarizer returning fixed texts, or failing when built with `failing`
    #[derive(Debug, Clone, Default)]
    pub struct CannedSummarizer {
        texts: Option<(String, String)>,
    }

    impl CannedSummarizer {
        pub fn new(summary: impl Into<String>, reasoning: impl Into<String>) -> Self {
            Self {
                texts: Some((summary.into(), reasoning.into())),
            }
        }

        pub fn failing() -> Self {
            Self::default()
        }
    }

    impl DomainPort for CannedSummarizer {}

    #[async_trait]
    impl ClaimSummarizer for CannedSummarizer {
        fn name(&self) -> &str {
            "canned"
        }

        async fn summarize(&self, _brief: &SummaryBrief) -> Result<HandlerSummary, PortError> {
            let (summary, reasoning) = self.texts.clone().ok_or_else(|| PortError::ServiceUnavailable {
                service: "summarizer".to_string(),
            })?;
            Ok(HandlerSummary {
                summary,
                reasoning,
                source: crate::summary::SummarySource::Model,
            })
        }
    }

    /// Document source backed by a map of source id to text
    #[derive(Debug, Clone, Default)]
    pub struct InMemoryDocumentSource {
        documents: HashMap<String, String>,
    }

    impl InMemoryDocumentSource {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_document(mut self, source: impl Into<String>, text: impl Into<String>) -> Self {
            self.documents.insert(source.into(), text.into());
            self
        }
    }

    impl DomainPort for InMemoryDocumentSource {}

    #[async_trait]
    impl DocumentSource for InMemoryDocumentSource {
        async fn load(&self, source: &str) -> Result<String, PortError> {
            self.documents
                .get(source)
                .cloned()
                .ok_or_else(|| PortError::not_found("Document", source))
        }
    }
}
