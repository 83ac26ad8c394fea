//! Finalizer and trace builder
//!
//! Produces the handler-facing result of a resolved session: the final
//! field values and the audit trace. Both are views over the record; the
//! event log itself is never touched.

use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::SessionId;

use crate::error::IntakeError;
use crate::event::{Event, EventKind};
use crate::record::{ClaimRecord, SessionStatus};
use crate::schema::ClaimSchema;

/// A resolved claim ready for a claims handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalClaim {
    pub session_id: SessionId,
    pub claim_type: String,
    /// Every field with its resolved value; `None` for optional fields never supplied
    pub fields: BTreeMap<String, Option<String>>,
    /// Ordered, human-readable decisions
    pub trace: Vec<String>,
    /// How each conflict was settled, as `field: detail`
    pub settlements: Vec<String>,
    pub documents: Vec<String>,
    pub turns: u32,
    pub finalized_at: DateTime<Utc>,
}

impl FinalClaim {
    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|v| v.as_deref())
    }
}

/// Builds the final claim of a resolved record
///
/// # Errors
///
/// Returns `IntakeError::InvalidState` unless the record is `Resolved`.
pub fn finalize(record: &ClaimRecord) -> Result<FinalClaim, IntakeError> {
    if record.status() != SessionStatus::Resolved {
        return Err(IntakeError::invalid_state("finalize", record.status()));
    }

    let fields = record
        .fields()
        .iter()
        .map(|(name, value)| (name.clone(), value.resolved_value().map(str::to_string)))
        .collect();

    let settlements = record
        .events()
        .iter()
        .filter(|e| e.kind == EventKind::MismatchResolved)
        .filter_map(|e| e.field.as_ref().map(|field| format!("{field}: {}", e.detail)))
        .collect();

    let finalized_at = record
        .events()
        .iter()
        .rev()
        .find(|e| e.kind == EventKind::Finalized)
        .map(|e| e.recorded_at)
        .unwrap_or_else(Utc::now);

    Ok(FinalClaim {
        session_id: record.session_id(),
        claim_type: record.claim_type().to_string(),
        fields,
        trace: render_trace(record.events()),
        settlements,
        documents: record.documents().to_vec(),
        turns: record.turn_count(),
        finalized_at,
    })
}

/// Renders events as numbered steps
///
/// ```text
/// 1. (turn 0) [session_started] opened theft claim with 4 fields (3 required), budget 20 turns
/// 2. (turn 1) [field_missing_prompted] date: asked (attempt 1)
/// ```
pub fn render_trace(events: &[Event]) -> Vec<String> {
    events
        .iter()
        .enumerate()
        .map(|(i, event)| format!("{}. (turn {}) {}", i + 1, event.turn, event))
        .collect()
}

/// Plain-text summary of a resolved claim for a claims handler
///
/// Fields are listed in schema order; fields without a value read
/// "not provided".
pub fn handler_summary(claim: &FinalClaim, schema: &ClaimSchema) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Claim type: {}", claim.claim_type);
    let _ = writeln!(out, "Session: {}", claim.session_id);
    let _ = writeln!(out, "Turns used: {}", claim.turns);
    if !claim.documents.is_empty() {
        let _ = writeln!(out, "Documents: {}", claim.documents.join(", "));
    }

    let _ = writeln!(out, "\nFields:");
    for spec in &schema.fields {
        let value = claim.value(&spec.name).unwrap_or("not provided");
        let _ = writeln!(out, "- {}: {}", spec.label(), value);
    }

    if !claim.settlements.is_empty() {
        let _ = writeln!(out, "\nConflicts settled:");
        for settlement in &claim.settlements {
            let _ = writeln!(out, "- {settlement}");
        }
    }
    out
}
