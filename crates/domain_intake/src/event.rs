//! Audit events
//!
//! Every controller decision appends one [`Event`] to the session's event
//! log. The log is append-only; the trace handed to a claims handler is a
//! rendering of it, never a separate record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::EventId;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Session opened with a schema
    SessionStarted,
    /// Claim type had no schema; the default field set applies
    SchemaDefaulted,
    /// Operator supplied values up front
    FieldsDeclared,
    /// A document was read and its fields extracted
    DocumentIngested,
    /// A document could not be read; it contributes nothing
    DocumentUnavailable,
    /// Extraction failed or timed out; the document contributes nothing
    ExtractionFailed,
    /// The primary extractor failed and the fallback produced the fields
    ExtractionFallback,
    /// The operator was asked for a missing field
    FieldMissingPrompted,
    /// The operator's answer filled a field
    FieldCollected,
    /// The operator gave no answer
    AnswerMissing,
    /// The operator's answer did not match the field shape
    AnswerRejected,
    /// A conflict was surfaced for confirmation
    MismatchDetected,
    /// A pending conflict was surfaced again
    ConfirmationRequested,
    /// The operator's confirmation was unusable
    ConfirmationRejected,
    /// The operator settled a conflict
    MismatchResolved,
    /// The claim is complete and consistent
    Finalized,
    /// Handler summary and reasoning were written
    SummaryPrepared,
    /// The turn budget ran out
    Abandoned,
    /// The session was aborted from outside
    SessionAborted,
}

impl EventKind {
    /// Stable snake_case name
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionStarted => "session_started",
            EventKind::SchemaDefaulted => "schema_defaulted",
            EventKind::FieldsDeclared => "fields_declared",
            EventKind::DocumentIngested => "document_ingested",
            EventKind::DocumentUnavailable => "document_unavailable",
            EventKind::ExtractionFailed => "extraction_failed",
            EventKind::ExtractionFallback => "extraction_fallback",
            EventKind::FieldMissingPrompted => "field_missing_prompted",
            EventKind::FieldCollected => "field_collected",
            EventKind::AnswerMissing => "answer_missing",
            EventKind::AnswerRejected => "answer_rejected",
            EventKind::MismatchDetected => "mismatch_detected",
            EventKind::ConfirmationRequested => "confirmation_requested",
            EventKind::ConfirmationRejected => "confirmation_rejected",
            EventKind::MismatchResolved => "mismatch_resolved",
            EventKind::Finalized => "finalized",
            EventKind::SummaryPrepared => "summary_prepared",
            EventKind::Abandoned => "abandoned",
            EventKind::SessionAborted => "session_aborted",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub kind: EventKind,
    pub field: Option<String>,
    pub detail: String,
    /// Turn during which the event was recorded (0 = before the first turn)
    pub turn: u32,
    pub recorded_at: DateTime<Utc>,
}

impl Event {
    /// Creates a session-level event
    pub fn new(kind: EventKind, turn: u32, detail: impl Into<String>) -> Self {
        Self {
            id: EventId::new_v7(),
            kind,
            field: None,
            detail: detail.into(),
            turn,
            recorded_at: Utc::now(),
        }
    }

    /// Creates an event about one field
    pub fn for_field(kind: EventKind, turn: u32, field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: Some(field.into()),
            ..Self::new(kind, turn, detail)
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "[{}] {}: {}", self.kind, field, self.detail),
            None => write!(f, "[{}] {}", self.kind, self.detail),
        }
    }
}
