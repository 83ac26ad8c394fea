//! Claim record aggregate

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::SessionId;

use crate::event::{Event, EventKind};
use crate::field::{FieldState, FieldValue};
use crate::schema::ClaimSchema;

/// Controller state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Gathering missing fields
    Collecting,
    /// A conflict has been surfaced and waits on the operator
    AwaitingConfirmation,
    /// Complete and consistent (terminal)
    Resolved,
    /// Turn budget exhausted or aborted (terminal)
    Abandoned,
}

impl SessionStatus {
    /// Whether no further turns can run
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Resolved | SessionStatus::Abandoned)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Collecting => "collecting",
            SessionStatus::AwaitingConfirmation => "awaiting_confirmation",
            SessionStatus::Resolved => "resolved",
            SessionStatus::Abandoned => "abandoned",
        };
        f.write_str(name)
    }
}

/// Who said what in the dialogue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Assistant,
    Operator,
}

/// One line of the operator dialogue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueEntry {
    pub speaker: Speaker,
    pub text: String,
}

/// Working state of one claim session
///
/// Only the reconciler writes field source slots and only the controller
/// writes status, turn count and events. The claim type is fixed at
/// creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    session_id: SessionId,
    claim_type: String,
    fields: BTreeMap<String, FieldValue>,
    event_log: Vec<Event>,
    turn_count: u32,
    max_turns: u32,
    status: SessionStatus,
    pending_confirmation: Option<String>,
    documents: Vec<String>,
    transcript: Vec<DialogueEntry>,
    created_at: DateTime<Utc>,
}

impl ClaimRecord {
    /// Opens a record with every schema field missing
    pub fn open(schema: &ClaimSchema, max_turns: u32) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|spec| (spec.name.clone(), FieldValue::missing()))
            .collect();

        let mut record = Self {
            session_id: SessionId::new_v7(),
            claim_type: schema.claim_type.clone(),
            fields,
            event_log: Vec::new(),
            turn_count: 0,
            max_turns,
            status: SessionStatus::Collecting,
            pending_confirmation: None,
            documents: Vec::new(),
            transcript: Vec::new(),
            created_at: Utc::now(),
        };
        record.append(Event::new(
            EventKind::SessionStarted,
            0,
            format!(
                "opened {} claim with {} fields ({} required), budget {} turns",
                schema.claim_type,
                schema.fields.len(),
                schema.required_count(),
                max_turns
            ),
        ));
        record
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    pub fn claim_type(&self) -> &str {
        &self.claim_type
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// State of a field; fields never touched are `Missing`
    pub fn field_state(&self, name: &str) -> FieldState {
        self.fields.get(name).map(FieldValue::state).unwrap_or(FieldState::Missing)
    }

    pub fn resolved_value(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(FieldValue::resolved_value)
    }

    pub fn events(&self) -> &[Event] {
        &self.event_log
    }

    pub fn turn_count(&self) -> u32 {
        self.turn_count
    }

    pub fn max_turns(&self) -> u32 {
        self.max_turns
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// Field surfaced for confirmation while `AwaitingConfirmation`
    pub fn pending_confirmation(&self) -> Option<&str> {
        self.pending_confirmation.as_deref()
    }

    /// Document sources ingested so far
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn transcript(&self) -> &[DialogueEntry] {
        &self.transcript
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of prompts already issued for a field
    pub fn prompts_for(&self, field: &str) -> usize {
        self.event_log
            .iter()
            .filter(|e| e.kind == EventKind::FieldMissingPrompted && e.field.as_deref() == Some(field))
            .count()
    }

    pub(crate) fn field_mut(&mut self, name: &str) -> &mut FieldValue {
        self.fields.entry(name.to_string()).or_default()
    }

    pub(crate) fn append(&mut self, event: Event) {
        self.event_log.push(event);
    }

    pub(crate) fn begin_turn(&mut self) -> u32 {
        self.turn_count += 1;
        self.turn_count
    }

    pub(crate) fn set_status(&mut self, status: SessionStatus) {
        self.status = status;
        if status != SessionStatus::AwaitingConfirmation {
            self.pending_confirmation = None;
        }
    }

    pub(crate) fn await_confirmation(&mut self, field: &str) {
        self.status = SessionStatus::AwaitingConfirmation;
        self.pending_confirmation = Some(field.to_string());
    }

    pub(crate) fn add_document(&mut self, source: impl Into<String>) {
        self.documents.push(source.into());
    }

    pub(crate) fn say(&mut self, speaker: Speaker, text: impl Into<String>) {
        self.transcript.push(DialogueEntry {
            speaker,
            text: text.into(),
        });
    }
}
