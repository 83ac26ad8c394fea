//! Integration tests for domain_intake

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use proptest::prelude::*;

use core_kernel::{DomainPort, PortError};

use domain_intake::ports::memory::{
    CannedSummarizer, FailingExtractor, InMemoryDocumentSource, ScriptedOperator, StaticExtractor,
};
use domain_intake::{
    evaluate, source_values, AbandonReason, ClaimRecord, ClaimSchema, ClaimSummarizer, ConfirmationRequest,
    ControllerSettings, DocumentExtractor, EventKind, Extraction, FieldKind, FieldSpec, FieldState, HandlerSummary,
    IntakeError, NextAction, OperatorIo, OperatorPrompt, Reconciler, ResolutionController, SchemaRegistry,
    SessionOutcome, SessionStatus, SourceValues, SummaryBrief, SummarySource,
};

fn scenario_schema() -> ClaimSchema {
    ClaimSchema::new(
        "scenario",
        vec![
            FieldSpec::required("date", FieldKind::Date),
            FieldSpec::required("location", FieldKind::Text),
            FieldSpec::required("injuries", FieldKind::Text),
        ],
    )
}

fn controller_with(
    schema: ClaimSchema,
    max_turns: u32,
    extractor: StaticExtractor,
    operator: Arc<ScriptedOperator>,
) -> ResolutionController {
    ResolutionController::new(
        schema,
        ControllerSettings::default().with_max_turns(max_turns),
        Arc::new(extractor),
        operator,
    )
}

/// Operator whose answers never arrive
struct HangingOperator;

impl DomainPort for HangingOperator {}

#[async_trait]
impl OperatorIo for HangingOperator {
    async fn ask(&self, _prompt: &OperatorPrompt) -> Result<String, PortError> {
        std::future::pending().await
    }

    async fn confirm(&self, _request: &ConfirmationRequest) -> Result<String, PortError> {
        std::future::pending().await
    }
}

/// Extractor that reads each successive document differently
struct RevisedReports {
    readings: std::sync::Mutex<std::collections::VecDeque<SourceValues>>,
}

impl RevisedReports {
    fn new(readings: Vec<SourceValues>) -> Self {
        Self {
            readings: std::sync::Mutex::new(readings.into()),
        }
    }
}

impl DomainPort for RevisedReports {}

#[async_trait]
impl DocumentExtractor for RevisedReports {
    fn name(&self) -> &str {
        "revised"
    }

    async fn extract(&self, _text: &str, _schema: &ClaimSchema) -> Result<Extraction, PortError> {
        let values = self.readings.lock().unwrap().pop_front().unwrap_or_default();
        Ok(Extraction::new("revised", values))
    }
}

/// Summarizer that never answers
struct HangingSummarizer;

impl DomainPort for HangingSummarizer {}

#[async_trait]
impl ClaimSummarizer for HangingSummarizer {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn summarize(&self, _brief: &SummaryBrief) -> Result<HandlerSummary, PortError> {
        std::future::pending().await
    }
}

// ============================================================================
// Scenarios
// ============================================================================

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn test_scenario_conflict_settled_by_operator() {
        let operator = Arc::new(ScriptedOperator::new().confirm_with("location", "Zurich"));
        let extractor = StaticExtractor::new(source_values([("location", "Zürich"), ("injuries", "none")]));
        let mut controller = controller_with(scenario_schema(), 10, extractor, operator.clone());

        controller
            .apply_user_values(&source_values([("date", "2024-01-01"), ("location", "Zurich")]))
            .unwrap();
        controller.ingest_text("police_report.txt", "report text").await.unwrap();

        let record = controller.record();
        assert_eq!(record.field_state("location"), FieldState::Conflicting);
        assert_eq!(record.field_state("injuries"), FieldState::DocOnly);

        let evaluation = controller.evaluation();
        assert!(evaluation.missing.is_empty());
        assert_eq!(evaluation.conflicting, vec!["location"]);

        let outcome = controller.run().await.unwrap();
        let SessionOutcome::Resolved(claim) = outcome else {
            panic!("expected a resolved claim");
        };

        assert_eq!(controller.status(), SessionStatus::Resolved);
        assert_eq!(claim.value("date"), Some("2024-01-01"));
        assert_eq!(claim.value("location"), Some("Zurich"));
        assert_eq!(claim.value("injuries"), Some("none"));
        assert_eq!(claim.turns, 1);
        assert_eq!(claim.settlements.len(), 1);

        let requests = operator.confirm_requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].user_value, "Zurich");
        assert_eq!(requests[0].doc_value, "Zürich");
    }

    #[tokio::test]
    async fn test_scenario_silent_operator_without_document() {
        let schema = ClaimSchema::new(
            "scenario",
            vec![
                FieldSpec::required("date", FieldKind::Date),
                FieldSpec::required("time", FieldKind::Time),
            ],
        );
        let operator = Arc::new(ScriptedOperator::silent());
        let mut controller = controller_with(schema, 2, StaticExtractor::default(), operator);

        let outcome = controller.run().await.unwrap();
        let SessionOutcome::Abandoned(report) = outcome else {
            panic!("expected an abandoned session");
        };

        assert_eq!(controller.status(), SessionStatus::Abandoned);
        assert_eq!(controller.record().turn_count(), 2);
        assert_eq!(report.reason, AbandonReason::TurnBudgetExceeded);
        assert_eq!(report.missing, vec!["date", "time"]);
        assert!(report.conflicting.is_empty());

        let last = controller.record().events().last().unwrap();
        assert_eq!(last.kind, EventKind::Abandoned);
        assert!(last.detail.contains("date, time"));
    }

    #[tokio::test]
    async fn test_full_motor_claim_from_document_and_answers() {
        let registry = SchemaRegistry::builtin();
        let operator = Arc::new(
            ScriptedOperator::new()
                .answer("time", "6:45 pm")
                .answer("other_vehicle_involved", "yes")
                .answer("description", "Rear-ended at a red light"),
        );
        let extractor = StaticExtractor::new(source_values([
            ("date", "12/01/2025"),
            ("location", "Main Street, Zurich"),
            ("injuries", "none"),
        ]));
        let mut controller = ResolutionController::for_claim_type(
            &registry,
            "motor_accident",
            ControllerSettings::default(),
            Arc::new(extractor),
            operator.clone(),
        );

        controller.ingest_text("report.txt", "...").await.unwrap();
        let outcome = controller.run().await.unwrap();
        let SessionOutcome::Resolved(claim) = outcome else {
            panic!("expected a resolved claim");
        };

        assert_eq!(claim.value("date"), Some("2025-01-12"));
        assert_eq!(claim.value("time"), Some("18:45"));
        assert_eq!(claim.value("other_vehicle_plate"), None);
        assert_eq!(
            operator.asked().await,
            vec!["time", "other_vehicle_involved", "description"]
        );
        assert!(!operator.notifications().await.is_empty());
    }
}

// ============================================================================
// Controller Transitions
// ============================================================================

mod transitions {
    use super::*;

    #[tokio::test]
    async fn test_missing_date_prompted_before_conflicting_location() {
        let operator = Arc::new(ScriptedOperator::new().answer("date", "2024-01-01"));
        let extractor = StaticExtractor::new(source_values([("location", "Basel"), ("injuries", "none")]));
        let mut controller = controller_with(scenario_schema(), 10, extractor, operator.clone());

        controller
            .apply_user_values(&source_values([("location", "Zurich")]))
            .unwrap();
        controller.ingest_text("report.txt", "text").await.unwrap();

        assert_eq!(controller.next_action(), NextAction::AskMissing(vec!["date".to_string()]));
        controller.step().await.unwrap();
        assert_eq!(operator.asked().await, vec!["date"]);
        assert_eq!(controller.next_action(), NextAction::Confirm("location".to_string()));
    }

    #[tokio::test]
    async fn test_unusable_confirmation_keeps_awaiting_and_reasks() {
        let operator = Arc::new(
            ScriptedOperator::new()
                .confirm_with("date", "sometime last week")
                .confirm_with("date", "report"),
        );
        let schema = ClaimSchema::new("test", vec![FieldSpec::required("date", FieldKind::Date)]);
        let extractor = StaticExtractor::new(source_values([("date", "2024-01-02")]));
        let mut controller = controller_with(schema, 5, extractor, operator.clone());

        controller
            .apply_user_values(&source_values([("date", "2024-01-01")]))
            .unwrap();
        controller.ingest_text("report.txt", "text").await.unwrap();

        assert_eq!(controller.step().await.unwrap(), SessionStatus::AwaitingConfirmation);
        assert_eq!(controller.record().pending_confirmation(), Some("date"));
        assert_eq!(
            controller.record().events().last().unwrap().kind,
            EventKind::ConfirmationRejected
        );

        assert_eq!(controller.step().await.unwrap(), SessionStatus::Collecting);
        assert_eq!(controller.record().resolved_value("date"), Some("2024-01-02"));
        assert_eq!(controller.step().await.unwrap(), SessionStatus::Resolved);

        let kinds: Vec<EventKind> = controller.record().events().iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&EventKind::MismatchDetected));
        assert!(kinds.contains(&EventKind::ConfirmationRequested));
        assert!(kinds.contains(&EventKind::MismatchResolved));
    }

    #[tokio::test]
    async fn test_malformed_answer_reprompts_same_field() {
        let operator = Arc::new(
            ScriptedOperator::new()
                .answer("date", "18:45")
                .answer("date", "2024-03-01"),
        );
        let schema = ClaimSchema::new("test", vec![FieldSpec::required("date", FieldKind::Date)]);
        let mut controller = controller_with(schema, 5, StaticExtractor::default(), operator.clone());

        let outcome = controller.run().await.unwrap();
        assert!(outcome.is_resolved());
        assert_eq!(controller.record().turn_count(), 2);
        assert_eq!(operator.asked().await, vec!["date", "date"]);
        assert_eq!(controller.record().prompts_for("date"), 2);

        let transcript = controller.record().transcript();
        assert!(transcript[2].text.contains("\"18:45\" is not a date"));
    }

    #[tokio::test]
    async fn test_declared_value_with_wrong_shape_is_asked_again() {
        let operator = Arc::new(ScriptedOperator::new().answer("date", "2024-05-05"));
        let mut controller = controller_with(scenario_schema(), 5, StaticExtractor::default(), operator.clone());

        controller
            .apply_user_values(&source_values([
                ("date", "last tuesday"),
                ("location", "Bern"),
                ("injuries", "none"),
            ]))
            .unwrap();

        assert_eq!(controller.record().field_state("date"), FieldState::Missing);
        assert_eq!(controller.record().field_state("location"), FieldState::UserOnly);
        let rejection = controller
            .record()
            .events()
            .iter()
            .find(|e| e.kind == EventKind::AnswerRejected)
            .unwrap();
        assert_eq!(rejection.field.as_deref(), Some("date"));
        assert!(rejection.detail.contains("\"last tuesday\""));

        let outcome = controller.run().await.unwrap();
        assert!(outcome.is_resolved());
        assert_eq!(operator.asked().await, vec!["date"]);
        assert_eq!(controller.finalize().unwrap().value("date"), Some("2024-05-05"));
    }

    #[tokio::test]
    async fn test_new_conflict_after_pending_one_settles_is_a_fresh_mismatch() {
        let operator = Arc::new(ScriptedOperator::new().confirm_with("date", "mine"));
        let extractor = RevisedReports::new(vec![
            source_values([("location", "Main Street 5"), ("injuries", "none")]),
            source_values([("location", "Main Street 7"), ("date", "2024-02-02")]),
        ]);
        let mut controller = ResolutionController::new(
            scenario_schema(),
            ControllerSettings::default().with_max_turns(5),
            Arc::new(extractor),
            operator.clone(),
        );

        controller
            .apply_user_values(&source_values([("date", "2024-01-01"), ("location", "Main Street 7")]))
            .unwrap();
        controller.ingest_text("report.txt", "text").await.unwrap();

        // no scripted answer for location, so the confirmation stays pending
        assert_eq!(controller.step().await.unwrap(), SessionStatus::AwaitingConfirmation);
        assert_eq!(controller.record().pending_confirmation(), Some("location"));

        controller.ingest_text("report_v2.txt", "text").await.unwrap();
        assert_eq!(controller.record().field_state("location"), FieldState::Agreed);
        assert_eq!(controller.next_action(), NextAction::Confirm("date".to_string()));

        controller.step().await.unwrap();
        let date_events: Vec<EventKind> = controller
            .record()
            .events()
            .iter()
            .filter(|e| e.field.as_deref() == Some("date"))
            .map(|e| e.kind)
            .collect();
        assert_eq!(date_events, vec![EventKind::MismatchDetected, EventKind::MismatchResolved]);
        assert_eq!(controller.step().await.unwrap(), SessionStatus::Resolved);
    }

    #[tokio::test]
    async fn test_operations_after_end_are_invalid_state() {
        let operator = Arc::new(ScriptedOperator::silent());
        let schema = ClaimSchema::new("test", vec![FieldSpec::required("date", FieldKind::Date)]);
        let mut controller = controller_with(schema, 1, StaticExtractor::default(), operator);

        assert!(matches!(controller.finalize(), Err(IntakeError::InvalidState { .. })));
        controller.run().await.unwrap();

        assert!(matches!(controller.step().await, Err(IntakeError::InvalidState { .. })));
        assert!(matches!(
            controller.finalize(),
            Err(IntakeError::InvalidState {
                status: SessionStatus::Abandoned,
                ..
            })
        ));
        assert!(matches!(
            controller.apply_user_values(&source_values([("date", "2024-01-01")])),
            Err(IntakeError::InvalidState { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_claim_type_uses_default_schema() {
        let registry = SchemaRegistry::builtin();
        let controller = ResolutionController::for_claim_type(
            &registry,
            "flood",
            ControllerSettings::default(),
            Arc::new(StaticExtractor::default()),
            Arc::new(ScriptedOperator::silent()),
        );

        assert_eq!(controller.record().claim_type(), "flood");
        assert_eq!(controller.schema().required_count(), 6);
        assert!(controller
            .record()
            .events()
            .iter()
            .any(|e| e.kind == EventKind::SchemaDefaulted));
    }
}

// ============================================================================
// Degradation and Cancellation
// ============================================================================

mod degradation {
    use super::*;

    #[tokio::test]
    async fn test_extraction_timeout_contributes_nothing() {
        let extractor = StaticExtractor::new(source_values([("injuries", "none")])).with_delay(Duration::from_millis(500));
        let mut controller = ResolutionController::new(
            scenario_schema(),
            ControllerSettings::default().with_extraction_timeout(Duration::from_millis(10)),
            Arc::new(extractor),
            Arc::new(ScriptedOperator::silent()),
        );

        controller.ingest_text("report.txt", "text").await.unwrap();

        assert_eq!(controller.record().field_state("injuries"), FieldState::Missing);
        let last = controller.record().events().last().unwrap();
        assert_eq!(last.kind, EventKind::ExtractionFailed);
        assert!(last.detail.contains("timed out"));
        assert_eq!(controller.status(), SessionStatus::Collecting);
    }

    #[tokio::test]
    async fn test_extractor_failure_contributes_nothing() {
        let mut controller = ResolutionController::new(
            scenario_schema(),
            ControllerSettings::default(),
            Arc::new(FailingExtractor::new("model endpoint")),
            Arc::new(ScriptedOperator::silent()),
        );

        controller.ingest_text("report.txt", "text").await.unwrap();

        assert!(controller.record().documents().is_empty());
        assert_eq!(controller.evaluation().missing.len(), 3);
        assert_eq!(
            controller.record().events().last().unwrap().kind,
            EventKind::ExtractionFailed
        );
    }

    #[tokio::test]
    async fn test_unreadable_document_is_skipped() {
        let operator = Arc::new(ScriptedOperator::silent());
        let mut controller = controller_with(scenario_schema(), 5, StaticExtractor::default(), operator.clone())
            .with_document_source(Arc::new(InMemoryDocumentSource::new()));

        controller.ingest_document("missing.pdf").await.unwrap();

        assert_eq!(
            controller.record().events().last().unwrap().kind,
            EventKind::DocumentUnavailable
        );
        assert_eq!(operator.notifications().await.len(), 1);
    }

    #[tokio::test]
    async fn test_ingest_document_without_source_is_configuration_error() {
        let mut controller = controller_with(
            scenario_schema(),
            5,
            StaticExtractor::default(),
            Arc::new(ScriptedOperator::silent()),
        );

        assert!(matches!(
            controller.ingest_document("report.txt").await,
            Err(IntakeError::Core(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_turn_leaves_no_partial_writes() {
        let mut controller = ResolutionController::new(
            scenario_schema(),
            ControllerSettings::default(),
            Arc::new(StaticExtractor::default()),
            Arc::new(HangingOperator),
        );
        let events_before = controller.record().events().len();

        let result = tokio::time::timeout(Duration::from_millis(20), controller.step()).await;
        assert!(result.is_err());

        assert_eq!(controller.record().turn_count(), 0);
        assert_eq!(controller.record().events().len(), events_before);
        assert!(controller.record().transcript().is_empty());

        let report = controller.abort("operator disconnected").unwrap();
        assert_eq!(report.reason, AbandonReason::Aborted);
        assert!(matches!(
            controller.outcome().unwrap(),
            SessionOutcome::Abandoned(r) if r.reason == AbandonReason::Aborted
        ));
    }
}

// ============================================================================
// Summaries
// ============================================================================

mod summaries {
    use super::*;

    async fn resolved_controller(operator: Arc<ScriptedOperator>, settings: ControllerSettings) -> ResolutionController {
        let extractor = StaticExtractor::new(source_values([("location", "Bern"), ("injuries", "none")]));
        let mut controller = ResolutionController::new(scenario_schema(), settings, Arc::new(extractor), operator);
        controller
            .apply_user_values(&source_values([("date", "2024-01-01")]))
            .unwrap();
        controller.ingest_text("report.txt", "report text").await.unwrap();
        controller.run().await.unwrap();
        controller
    }

    #[tokio::test]
    async fn test_summarizer_text_is_used_when_it_answers() {
        let operator = Arc::new(ScriptedOperator::new());
        let mut controller = resolved_controller(operator.clone(), ControllerSettings::default()).await;
        let summarizer = CannedSummarizer::new("Collision in Bern on 1 January.", "- Location came from the report.");

        let summary = controller.summarize(Some(&summarizer)).await.unwrap();

        assert_eq!(summary.source, SummarySource::Model);
        assert_eq!(summary.summary, "Collision in Bern on 1 January.");
        let last = controller.record().events().last().unwrap();
        assert_eq!(last.kind, EventKind::SummaryPrepared);
        assert!(last.detail.ends_with("by model"));
        assert_eq!(operator.notifications().await.last().map(String::as_str), Some("Summary ready."));
    }

    #[tokio::test]
    async fn test_failing_summarizer_falls_back_to_template() {
        let operator = Arc::new(ScriptedOperator::new());
        let mut controller = resolved_controller(operator.clone(), ControllerSettings::default()).await;

        let summary = controller
            .summarize(Some(&CannedSummarizer::failing()))
            .await
            .unwrap();

        assert_eq!(summary.source, SummarySource::Template);
        assert!(summary.summary.contains("Bern"));
        assert!(summary.reasoning.lines().all(|line| line.starts_with("- ")));
        assert!(!summary.reasoning.contains("budget"));
        assert!(!summary.reasoning.contains("attempt"));
        assert_eq!(operator.notifications().await.last().map(String::as_str), Some("Summary ready."));
    }

    #[tokio::test]
    async fn test_hanging_summarizer_is_cut_off_by_extraction_timeout() {
        let settings = ControllerSettings::default().with_extraction_timeout(Duration::from_millis(20));
        let mut controller = resolved_controller(Arc::new(ScriptedOperator::new()), settings).await;

        let summary = controller.summarize(Some(&HangingSummarizer)).await.unwrap();

        assert_eq!(summary.source, SummarySource::Template);
        assert_eq!(
            controller.record().events().last().map(|e| e.kind),
            Some(EventKind::SummaryPrepared)
        );
    }

    #[tokio::test]
    async fn test_open_session_cannot_be_summarized() {
        let mut controller = controller_with(
            scenario_schema(),
            5,
            StaticExtractor::new(SourceValues::new()),
            Arc::new(ScriptedOperator::new()),
        );

        let result = controller.summarize(None).await;

        assert!(matches!(result, Err(IntakeError::InvalidState { .. })));
    }
}

// ============================================================================
// Properties
// ============================================================================

mod properties {
    use super::*;

    fn runtime() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap()
    }

    fn date_value() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("2024-01-01".to_string())),
            Just(Some("01/01/2024".to_string())),
            Just(Some("2024-02-03".to_string())),
            Just(Some("unknown".to_string())),
        ]
    }

    fn text_value() -> impl Strategy<Value = Option<String>> {
        prop_oneof![
            Just(None),
            Just(Some("Zurich".to_string())),
            Just(Some("Zürich".to_string())),
            Just(Some("  zurich ".to_string())),
            Just(Some("none".to_string())),
            Just(Some("".to_string())),
        ]
    }

    fn source() -> impl Strategy<Value = SourceValues> {
        (date_value(), text_value(), text_value()).prop_map(|(date, location, injuries)| {
            let mut values = SourceValues::new();
            values.insert("date".to_string(), date);
            values.insert("location".to_string(), location);
            values.insert("injuries".to_string(), injuries);
            values
        })
    }

    proptest! {
        #[test]
        fn reconcile_is_idempotent(user in source(), doc in source()) {
            let schema = scenario_schema();
            let reconciler = Reconciler::new(&schema);
            let record = ClaimRecord::open(&schema, 10);

            let once = reconciler.reconcile(&record, &user, &doc);
            let twice = reconciler.reconcile(&once, &user, &doc);

            prop_assert_eq!(once.fields(), twice.fields());
        }

        #[test]
        fn resolved_value_set_iff_state_is_settled(user in source(), doc in source()) {
            let schema = scenario_schema();
            let record = Reconciler::new(&schema).reconcile(&ClaimRecord::open(&schema, 10), &user, &doc);

            for value in record.fields().values() {
                let settled = matches!(
                    value.state(),
                    FieldState::UserOnly | FieldState::DocOnly | FieldState::Agreed
                );
                prop_assert_eq!(value.resolved_value().is_some(), settled);
            }
        }

        #[test]
        fn cooperative_operator_converges_within_budget(user in source(), doc in source()) {
            let schema = scenario_schema();
            let probe = Reconciler::new(&schema).reconcile(&ClaimRecord::open(&schema, 10), &user, &doc);
            let evaluation = evaluate(&probe, &schema);
            let budget = (evaluation.missing.len() + evaluation.conflicting.len()) as u32;

            let operator = Arc::new(
                ScriptedOperator::new()
                    .answer("date", "2024-05-05")
                    .answer("location", "Basel")
                    .answer("injuries", "minor")
                    .confirm_with("date", "report")
                    .confirm_with("location", "mine")
                    .confirm_with("injuries", "report"),
            );
            let mut controller = controller_with(schema, budget, StaticExtractor::new(doc), operator);

            let outcome = runtime().block_on(async {
                controller.apply_user_values(&user)?;
                controller.ingest_text("report.txt", "text").await?;
                Ok::<SessionOutcome, IntakeError>(controller.run().await?)
            }).unwrap();

            prop_assert!(outcome.is_resolved());
            prop_assert!(controller.record().turn_count() <= budget);
        }

        #[test]
        fn silent_operator_terminates_at_budget(max_turns in 1u32..40, questions in 1usize..=3) {
            let operator = Arc::new(ScriptedOperator::silent());
            let mut controller = ResolutionController::new(
                scenario_schema(),
                ControllerSettings::default()
                    .with_max_turns(max_turns)
                    .with_questions_per_turn(questions),
                Arc::new(StaticExtractor::default()),
                operator,
            );

            let outcome = runtime().block_on(controller.run()).unwrap();

            prop_assert!(!outcome.is_resolved());
            prop_assert_eq!(controller.record().turn_count(), max_turns);
            prop_assert_eq!(controller.status(), SessionStatus::Abandoned);
        }
    }
}
