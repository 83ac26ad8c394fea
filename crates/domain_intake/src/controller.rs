//! Resolution loop controller
//!
//! An explicit state machine over [`SessionStatus`]. Each call to
//! [`ResolutionController::step`] runs one turn:
//!
//! ```text
//!              +-- missing fields ---> ask operator ----+
//!              |                                         |
//! Collecting --+-- conflicts --> AwaitingConfirmation --+--> Collecting
//!              |
//!              +-- nothing left --> Resolved
//!              +-- budget spent --> Abandoned
//! ```
//!
//! Missing fields are handled before conflicts, both in schema order. The
//! resolvable check runs before the budget check and consumes no turn, so a
//! session that becomes complete on its last turn still resolves.
//!
//! Every turn works on a copy of the record that replaces the session's
//! record only once the turn has completed. Dropping a turn's future midway
//! (cancellation) leaves the record exactly as it was before the turn.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use core_kernel::CoreError;

use crate::answer::{interpret_confirmation, parse_answer};
use crate::error::IntakeError;
use crate::evaluator::{evaluate, Evaluation};
use crate::event::{Event, EventKind};
use crate::finalizer::{finalize, render_trace, FinalClaim};
use crate::ports::{
    ClaimSummarizer, ConfirmationRequest, DocumentExtractor, DocumentSource, OperatorIo, OperatorPrompt,
};
use crate::reconciler::{Reconciler, SourceValues};
use crate::record::{ClaimRecord, SessionStatus, Speaker};
use crate::schema::{ClaimSchema, FieldSpec, SchemaRegistry};
use crate::summary::{template_summary, HandlerSummary, SummaryBrief};

/// Upper bound on questions asked in one turn
pub const MAX_QUESTIONS_PER_TURN: usize = 3;

/// Loop limits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerSettings {
    /// Turn budget; the session is abandoned once it is spent
    pub max_turns: u32,
    /// Missing fields asked per turn (1 to 3)
    pub questions_per_turn: usize,
    /// Bound on a single extraction call
    pub extraction_timeout: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            max_turns: 20,
            questions_per_turn: 1,
            extraction_timeout: Duration::from_secs(30),
        }
    }
}

impl ControllerSettings {
    pub fn with_max_turns(mut self, max_turns: u32) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn with_questions_per_turn(mut self, questions: usize) -> Self {
        self.questions_per_turn = questions;
        self
    }

    pub fn with_extraction_timeout(mut self, timeout: Duration) -> Self {
        self.extraction_timeout = timeout;
        self
    }

    fn batch_size(&self) -> usize {
        self.questions_per_turn.clamp(1, MAX_QUESTIONS_PER_TURN)
    }
}

/// What the next call to `step` will do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// Ask for these missing fields
    AskMissing(Vec<String>),
    /// Ask the operator to settle this conflict
    Confirm(String),
    /// Nothing is missing or conflicting
    Finalize,
    /// The turn budget is spent
    Abandon,
    /// The session is over
    Done(SessionStatus),
}

/// Why a session ended without a resolved claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbandonReason {
    TurnBudgetExceeded,
    Aborted,
}

/// Everything a caller learns from an abandoned session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbandonedReport {
    pub reason: AbandonReason,
    pub claim_type: String,
    pub turns: u32,
    pub missing: Vec<String>,
    pub conflicting: Vec<String>,
    pub completeness: f64,
    pub trace: Vec<String>,
}

/// How a session ended
#[derive(Debug, Clone)]
pub enum SessionOutcome {
    Resolved(FinalClaim),
    Abandoned(AbandonedReport),
}

impl SessionOutcome {
    pub fn is_resolved(&self) -> bool {
        matches!(self, SessionOutcome::Resolved(_))
    }
}

/// Drives one claim session to `Resolved` or `Abandoned`
pub struct ResolutionController {
    schema: ClaimSchema,
    settings: ControllerSettings,
    extractor: Arc<dyn DocumentExtractor>,
    operator: Arc<dyn OperatorIo>,
    documents: Option<Arc<dyn DocumentSource>>,
    record: ClaimRecord,
}

impl ResolutionController {
    /// Opens a session for a schema
    pub fn new(
        schema: ClaimSchema,
        settings: ControllerSettings,
        extractor: Arc<dyn DocumentExtractor>,
        operator: Arc<dyn OperatorIo>,
    ) -> Self {
        let record = ClaimRecord::open(&schema, settings.max_turns);
        info!(
            session_id = %record.session_id(),
            claim_type = %schema.claim_type,
            max_turns = settings.max_turns,
            "claim session opened"
        );
        Self {
            schema,
            settings,
            extractor,
            operator,
            documents: None,
            record,
        }
    }

    /// Opens a session for a claim type, falling back to the default schema
    pub fn for_claim_type(
        registry: &SchemaRegistry,
        claim_type: &str,
        settings: ControllerSettings,
        extractor: Arc<dyn DocumentExtractor>,
        operator: Arc<dyn OperatorIo>,
    ) -> Self {
        let (schema, defaulted) = registry.resolve(claim_type);
        let mut controller = Self::new(schema, settings, extractor, operator);
        if defaulted {
            warn!(claim_type, "no schema registered for claim type, using default fields");
            controller.record.append(Event::new(
                EventKind::SchemaDefaulted,
                0,
                format!("no schema for {claim_type}; using the default field set"),
            ));
        }
        controller
    }

    pub fn with_document_source(mut self, documents: Arc<dyn DocumentSource>) -> Self {
        self.documents = Some(documents);
        self
    }

    pub fn record(&self) -> &ClaimRecord {
        &self.record
    }

    pub fn schema(&self) -> &ClaimSchema {
        &self.schema
    }

    pub fn status(&self) -> SessionStatus {
        self.record.status()
    }

    /// Current missing and conflicting fields
    pub fn evaluation(&self) -> Evaluation {
        evaluate(&self.record, &self.schema)
    }

    /// Applies values the operator declared up front
    ///
    /// Declared values go through the same shape check as answers. A value
    /// that does not parse for its field is recorded as rejected and left
    /// out, so the loop asks for the field again.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidState` once the session has ended.
    pub fn apply_user_values(&mut self, values: &SourceValues) -> Result<(), IntakeError> {
        self.ensure_open("apply user values")?;
        let mut work = self.record.clone();
        let turn = work.turn_count();

        let mut accepted = SourceValues::new();
        let mut rejected = Vec::new();
        for (name, value) in values {
            let check = match (self.schema.field(name), value) {
                (Some(spec), Some(raw)) => parse_answer(spec, raw).err(),
                _ => None,
            };
            match check {
                Some(error) => rejected.push((name.clone(), rejection_detail(&error))),
                None => {
                    accepted.insert(name.clone(), value.clone());
                }
            }
        }

        let touched = Reconciler::new(&self.schema).apply(&mut work, &accepted, &SourceValues::new());
        if !touched.is_empty() {
            work.append(Event::new(
                EventKind::FieldsDeclared,
                turn,
                format!("operator declared {}", touched.join(", ")),
            ));
        }
        for (field, detail) in rejected {
            debug!(field = %field, "declared value rejected");
            work.append(Event::for_field(EventKind::AnswerRejected, turn, &field, detail));
        }
        self.record = work;
        Ok(())
    }

    /// Reads a document through the configured source and ingests it
    ///
    /// A document that cannot be read is logged and contributes nothing.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidState` once the session has ended, or a
    /// configuration error when no document source was provided.
    #[instrument(skip(self), fields(session_id = %self.record.session_id()))]
    pub async fn ingest_document(&mut self, source: &str) -> Result<(), IntakeError> {
        self.ensure_open("ingest a document")?;
        let documents = self
            .documents
            .clone()
            .ok_or_else(|| CoreError::configuration("no document source configured"))?;

        match documents.load(source).await {
            Ok(text) => self.ingest_text(source, &text).await,
            Err(e) => {
                warn!(source, error = %e, "document unavailable, continuing without it");
                let turn = self.record.turn_count();
                self.record.append(Event::new(
                    EventKind::DocumentUnavailable,
                    turn,
                    format!("{source}: {e}"),
                ));
                self.notify(&format!("Could not read {source}; continuing without it.")).await;
                Ok(())
            }
        }
    }

    /// Extracts fields from document text and reconciles them
    ///
    /// Extraction is bounded by the configured timeout. On timeout or
    /// extractor failure the document contributes no fields.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidState` once the session has ended.
    #[instrument(skip(self, text), fields(session_id = %self.record.session_id(), chars = text.len()))]
    pub async fn ingest_text(&mut self, source: &str, text: &str) -> Result<(), IntakeError> {
        self.ensure_open("ingest a document")?;
        let turn = self.record.turn_count();

        if text.trim().is_empty() {
            self.record.append(Event::new(
                EventKind::DocumentUnavailable,
                turn,
                format!("{source}: no text"),
            ));
            self.notify(&format!("{source} contained no text; continuing without it.")).await;
            return Ok(());
        }

        let timeout = self.settings.extraction_timeout;
        let result = tokio::time::timeout(timeout, self.extractor.extract(text, &self.schema)).await;

        let mut work = self.record.clone();
        let message = match result {
            Ok(Ok(extraction)) => {
                if extraction.fallback_used {
                    work.append(Event::new(
                        EventKind::ExtractionFallback,
                        turn,
                        format!("{source}: primary extractor failed, used {}", extraction.extractor),
                    ));
                }
                let touched =
                    Reconciler::new(&self.schema).apply(&mut work, &SourceValues::new(), &extraction.values);
                work.add_document(source);
                work.append(Event::new(
                    EventKind::DocumentIngested,
                    turn,
                    format!(
                        "{source}: {} field(s) extracted by {}{}",
                        touched.len(),
                        extraction.extractor,
                        if touched.is_empty() {
                            String::new()
                        } else {
                            format!(" ({})", touched.join(", "))
                        }
                    ),
                ));
                info!(source, fields = touched.len(), extractor = %extraction.extractor, "document ingested");
                if extraction.fallback_used {
                    format!(
                        "Processed {source} with the {} extractor after the primary extractor failed.",
                        extraction.extractor
                    )
                } else {
                    format!("Processed {source}: {} field(s) found.", touched.len())
                }
            }
            Ok(Err(e)) => {
                warn!(source, error = %e, "extraction failed, document contributes nothing");
                work.append(Event::new(
                    EventKind::ExtractionFailed,
                    turn,
                    format!("{source}: {}", IntakeError::from(e)),
                ));
                format!("Could not extract fields from {source}; continuing without it.")
            }
            Err(_) => {
                warn!(source, timeout_ms = timeout.as_millis() as u64, "extraction timed out");
                work.append(Event::new(
                    EventKind::ExtractionFailed,
                    turn,
                    format!("{source}: timed out after {}ms", timeout.as_millis()),
                ));
                format!("Extraction of {source} timed out; continuing without it.")
            }
        };
        self.record = work;
        self.notify(&message).await;
        Ok(())
    }

    /// Decides what the next turn will do, without running it
    pub fn next_action(&self) -> NextAction {
        let status = self.record.status();
        if status.is_terminal() {
            return NextAction::Done(status);
        }

        let evaluation = self.evaluation();
        if evaluation.is_resolvable() {
            return NextAction::Finalize;
        }
        if self.record.turn_count() >= self.record.max_turns() {
            return NextAction::Abandon;
        }

        if status == SessionStatus::AwaitingConfirmation {
            if let Some(pending) = self.record.pending_confirmation() {
                if evaluation.conflicting.iter().any(|f| f == pending) {
                    return NextAction::Confirm(pending.to_string());
                }
            }
        }

        if !evaluation.missing.is_empty() {
            let batch = evaluation
                .missing
                .into_iter()
                .take(self.settings.batch_size())
                .collect();
            return NextAction::AskMissing(batch);
        }
        match evaluation.conflicting.into_iter().next() {
            Some(field) => NextAction::Confirm(field),
            None => NextAction::Finalize,
        }
    }

    /// Runs one turn and returns the resulting status
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidState` if the session has already ended.
    #[instrument(skip(self), fields(session_id = %self.record.session_id(), turn = self.record.turn_count()))]
    pub async fn step(&mut self) -> Result<SessionStatus, IntakeError> {
        let mut work = self.record.clone();
        let notice = match self.next_action() {
            NextAction::Done(status) => return Err(IntakeError::invalid_state("run a turn", status)),
            NextAction::Finalize => {
                self.finish_resolved(&mut work);
                Some("All required details are complete and consistent.".to_string())
            }
            NextAction::Abandon => {
                self.finish_abandoned(&mut work);
                Some("The turn budget is exhausted; the claim remains incomplete.".to_string())
            }
            NextAction::AskMissing(fields) => {
                let turn = work.begin_turn();
                for field in &fields {
                    self.ask_missing(&mut work, turn, field).await;
                }
                None
            }
            NextAction::Confirm(field) => {
                let turn = work.begin_turn();
                self.ask_confirmation(&mut work, turn, &field).await;
                None
            }
        };

        self.record = work;
        if let Some(message) = notice {
            self.notify(&message).await;
        }
        Ok(self.record.status())
    }

    /// Runs turns until the session ends
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidState` if the session has already ended.
    pub async fn run(&mut self) -> Result<SessionOutcome, IntakeError> {
        self.ensure_open("run the session")?;
        while !self.record.status().is_terminal() {
            self.step().await?;
        }
        self.outcome()
    }

    /// Ends the session between turns
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidState` if the session has already ended.
    pub fn abort(&mut self, reason: &str) -> Result<AbandonedReport, IntakeError> {
        self.ensure_open("abort the session")?;
        let evaluation = self.evaluation();
        let turn = self.record.turn_count();
        self.record.set_status(SessionStatus::Abandoned);
        self.record.append(Event::new(
            EventKind::SessionAborted,
            turn,
            format!("{reason}; {}", describe_open_items(&evaluation)),
        ));
        info!(session_id = %self.record.session_id(), reason, "claim session aborted");
        Ok(self.abandoned_report(AbandonReason::Aborted))
    }

    /// Final claim of a resolved session
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidState` unless the session is resolved.
    pub fn finalize(&self) -> Result<FinalClaim, IntakeError> {
        finalize(&self.record)
    }

    /// Writes the handler summary of a resolved session
    ///
    /// The summarizer gets the extraction timeout; when it is absent, fails
    /// or runs out of time the summary is rendered from the template.
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidState` unless the session is resolved.
    #[instrument(skip(self, summarizer), fields(session_id = %self.record.session_id()))]
    pub async fn summarize(
        &mut self,
        summarizer: Option<&dyn ClaimSummarizer>,
    ) -> Result<HandlerSummary, IntakeError> {
        let claim = self.finalize()?;
        let brief = SummaryBrief::new(&claim, &self.schema);

        let written = match summarizer {
            Some(summarizer) => {
                let timeout = self.settings.extraction_timeout;
                match tokio::time::timeout(timeout, summarizer.summarize(&brief)).await {
                    Ok(Ok(summary)) => Some(summary),
                    Ok(Err(e)) => {
                        warn!(summarizer = summarizer.name(), error = %e, "summarizer failed, using template");
                        None
                    }
                    Err(_) => {
                        warn!(
                            summarizer = summarizer.name(),
                            timeout_ms = timeout.as_millis() as u64,
                            "summarizer timed out, using template"
                        );
                        None
                    }
                }
            }
            None => None,
        };
        let summary = written.unwrap_or_else(|| template_summary(&claim, &self.schema, &brief));

        let turn = self.record.turn_count();
        self.record.append(Event::new(
            EventKind::SummaryPrepared,
            turn,
            format!("handler summary and reasoning prepared by {}", summary.source),
        ));
        self.notify("Summary ready.").await;
        Ok(summary)
    }

    /// Result of an ended session
    ///
    /// # Errors
    ///
    /// Returns `IntakeError::InvalidState` while the session is still open.
    pub fn outcome(&self) -> Result<SessionOutcome, IntakeError> {
        match self.record.status() {
            SessionStatus::Resolved => self.finalize().map(SessionOutcome::Resolved),
            SessionStatus::Abandoned => {
                let aborted = self
                    .record
                    .events()
                    .iter()
                    .any(|e| e.kind == EventKind::SessionAborted);
                let reason = if aborted {
                    AbandonReason::Aborted
                } else {
                    AbandonReason::TurnBudgetExceeded
                };
                Ok(SessionOutcome::Abandoned(self.abandoned_report(reason)))
            }
            status => Err(IntakeError::invalid_state("report an outcome", status)),
        }
    }

    fn abandoned_report(&self, reason: AbandonReason) -> AbandonedReport {
        let evaluation = self.evaluation();
        AbandonedReport {
            reason,
            claim_type: self.record.claim_type().to_string(),
            turns: self.record.turn_count(),
            missing: evaluation.missing,
            conflicting: evaluation.conflicting,
            completeness: evaluation.completeness,
            trace: render_trace(self.record.events()),
        }
    }

    fn finish_resolved(&self, work: &mut ClaimRecord) {
        let turn = work.turn_count();
        work.set_status(SessionStatus::Resolved);
        work.append(Event::new(
            EventKind::Finalized,
            turn,
            format!(
                "{} required field(s) resolved after {} turn(s)",
                self.schema.required_count(),
                turn
            ),
        ));
        info!(turns = turn, "claim resolved");
    }

    fn finish_abandoned(&self, work: &mut ClaimRecord) {
        let evaluation = evaluate(work, &self.schema);
        let turn = work.turn_count();
        work.set_status(SessionStatus::Abandoned);
        work.append(Event::new(
            EventKind::Abandoned,
            turn,
            format!(
                "turn budget of {} exhausted; {}",
                work.max_turns(),
                describe_open_items(&evaluation)
            ),
        ));
        warn!(
            turns = turn,
            missing = ?evaluation.missing,
            conflicting = ?evaluation.conflicting,
            "claim abandoned"
        );
    }

    async fn ask_missing(&self, work: &mut ClaimRecord, turn: u32, field: &str) {
        let Some(spec) = self.schema.field(field) else {
            return;
        };
        let prompt = OperatorPrompt {
            field: field.to_string(),
            label: spec.label(),
            expected: spec.kind.expected_shape().to_string(),
            attempt: work.prompts_for(field) + 1,
            retry_reason: last_rejection(work, field),
        };
        work.say(Speaker::Assistant, prompt.to_string());
        work.append(Event::for_field(
            EventKind::FieldMissingPrompted,
            turn,
            field,
            format!("asked (attempt {})", prompt.attempt),
        ));
        debug!(field, attempt = prompt.attempt, "prompting for missing field");

        let raw = match self.operator.ask(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(field, error = %e, "operator unavailable");
                work.append(Event::for_field(
                    EventKind::AnswerMissing,
                    turn,
                    field,
                    format!("operator unavailable: {e}"),
                ));
                return;
            }
        };
        work.say(Speaker::Operator, raw.clone());
        self.apply_answer(work, turn, spec, &raw);
    }

    fn apply_answer(&self, work: &mut ClaimRecord, turn: u32, spec: &FieldSpec, raw: &str) {
        match parse_answer(spec, raw) {
            Ok(Some(value)) => {
                let mut values = SourceValues::new();
                values.insert(spec.name.clone(), Some(value.clone()));
                Reconciler::new(&self.schema).apply(work, &values, &SourceValues::new());
                let state = work.field_state(&spec.name);
                work.append(Event::for_field(
                    EventKind::FieldCollected,
                    turn,
                    &spec.name,
                    format!("operator answered \"{value}\" ({state})"),
                ));
            }
            Ok(None) => {
                work.append(Event::for_field(EventKind::AnswerMissing, turn, &spec.name, "no answer"));
            }
            Err(e) => {
                debug!(field = %spec.name, error = %e, "answer rejected");
                work.append(Event::for_field(
                    EventKind::AnswerRejected,
                    turn,
                    &spec.name,
                    rejection_detail(&e),
                ));
            }
        }
    }

    async fn ask_confirmation(&self, work: &mut ClaimRecord, turn: u32, field: &str) {
        let Some(spec) = self.schema.field(field) else {
            return;
        };
        let (user_value, doc_value) = match work.field(field) {
            Some(value) => (
                value.user_value().unwrap_or_default().to_string(),
                value.doc_value().unwrap_or_default().to_string(),
            ),
            None => return,
        };
        let request = ConfirmationRequest {
            field: field.to_string(),
            label: spec.label(),
            user_value,
            doc_value,
        };

        let kind = if work.pending_confirmation() == Some(field) {
            EventKind::ConfirmationRequested
        } else {
            EventKind::MismatchDetected
        };
        work.append(Event::for_field(
            kind,
            turn,
            field,
            format!(
                "operator \"{}\" vs document \"{}\"",
                request.user_value, request.doc_value
            ),
        ));
        work.await_confirmation(field);
        work.say(Speaker::Assistant, request.to_string());
        info!(field, "surfacing conflict for confirmation");

        let raw = match self.operator.confirm(&request).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(field, error = %e, "operator unavailable");
                work.append(Event::for_field(
                    EventKind::ConfirmationRejected,
                    turn,
                    field,
                    format!("operator unavailable: {e}"),
                ));
                return;
            }
        };
        work.say(Speaker::Operator, raw.clone());

        match interpret_confirmation(spec, &request.user_value, &request.doc_value, &raw) {
            Ok(Some(choice)) => {
                let detail = format!("settled with {}: \"{}\"", choice.source(), choice.value());
                work.field_mut(field).confirm(choice.into_value());
                work.append(Event::for_field(EventKind::MismatchResolved, turn, field, detail));
                work.set_status(SessionStatus::Collecting);
            }
            Ok(None) => {
                work.append(Event::for_field(
                    EventKind::ConfirmationRejected,
                    turn,
                    field,
                    "no answer",
                ));
            }
            Err(e) => {
                work.append(Event::for_field(
                    EventKind::ConfirmationRejected,
                    turn,
                    field,
                    e.to_string(),
                ));
            }
        }
    }

    async fn notify(&self, message: &str) {
        self.operator.notify(message).await;
    }

    fn ensure_open(&self, operation: &'static str) -> Result<(), IntakeError> {
        let status = self.record.status();
        if status.is_terminal() {
            return Err(IntakeError::invalid_state(operation, status));
        }
        Ok(())
    }
}

fn rejection_detail(error: &IntakeError) -> String {
    match error {
        IntakeError::MalformedAnswer { expected, answer, .. } => format!("\"{answer}\" is not {expected}."),
        other => other.to_string(),
    }
}

/// Reason the field's last answer was rejected, if its latest event is a rejection
fn last_rejection(record: &ClaimRecord, field: &str) -> Option<String> {
    record
        .events()
        .iter()
        .rev()
        .find(|e| e.field.as_deref() == Some(field))
        .filter(|e| e.kind == EventKind::AnswerRejected)
        .map(|e| e.detail.clone())
}

fn describe_open_items(evaluation: &Evaluation) -> String {
    let list = |items: &[String]| {
        if items.is_empty() {
            "none".to_string()
        } else {
            items.join(", ")
        }
    };
    format!(
        "missing: {}; conflicting: {}",
        list(&evaluation.missing),
        list(&evaluation.conflicting)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldState;
    use crate::normalize::FieldKind;
    use crate::ports::memory::{ScriptedOperator, StaticExtractor};
    use crate::reconciler::source_values;

    fn schema() -> ClaimSchema {
        ClaimSchema::new(
            "test",
            vec![
                FieldSpec::required("date", FieldKind::Date),
                FieldSpec::required("location", FieldKind::Text),
            ],
        )
    }

    fn controller(operator: ScriptedOperator, max_turns: u32) -> ResolutionController {
        ResolutionController::new(
            schema(),
            ControllerSettings::default().with_max_turns(max_turns),
            Arc::new(StaticExtractor::default()),
            Arc::new(operator),
        )
    }

    #[test]
    fn test_missing_before_conflicting() {
        let mut controller = controller(ScriptedOperator::silent(), 5);
        controller
            .apply_user_values(&source_values([("location", "Zurich")]))
            .unwrap();
        let mut work = controller.record.clone();
        let mut doc = SourceValues::new();
        doc.insert("location".to_string(), Some("Basel".to_string()));
        Reconciler::new(&controller.schema).apply(&mut work, &SourceValues::new(), &doc);
        controller.record = work;

        assert_eq!(controller.record().field_state("location"), FieldState::Conflicting);
        assert_eq!(controller.next_action(), NextAction::AskMissing(vec!["date".to_string()]));
    }

    #[tokio::test]
    async fn test_rejected_answer_is_cited_in_next_prompt() {
        let operator = ScriptedOperator::new().answer("date", "18:45");
        let mut controller = controller(operator, 5);

        controller.step().await.unwrap();
        let last = controller.record().events().last().unwrap();
        assert_eq!(last.kind, EventKind::AnswerRejected);
        assert_eq!(last_rejection(controller.record(), "date").as_deref(), Some(last.detail.as_str()));
    }

    #[tokio::test]
    async fn test_batching_asks_several_fields_in_one_turn() {
        let operator = ScriptedOperator::new()
            .answer("date", "2024-01-01")
            .answer("location", "Bern");
        let mut controller = ResolutionController::new(
            schema(),
            ControllerSettings::default().with_questions_per_turn(3),
            Arc::new(StaticExtractor::default()),
            Arc::new(operator),
        );

        assert_eq!(controller.step().await.unwrap(), SessionStatus::Collecting);
        assert_eq!(controller.record().turn_count(), 1);
        assert_eq!(controller.step().await.unwrap(), SessionStatus::Resolved);
        assert_eq!(controller.record().turn_count(), 1);
    }

    #[test]
    fn test_abort_ends_session() {
        let mut controller = controller(ScriptedOperator::silent(), 5);
        let report = controller.abort("operator hung up").unwrap();

        assert_eq!(report.reason, AbandonReason::Aborted);
        assert_eq!(report.missing, vec!["date", "location"]);
        assert!(matches!(
            controller.abort("again"),
            Err(IntakeError::InvalidState { .. })
        ));
    }
}
