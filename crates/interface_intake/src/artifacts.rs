//! Artifact export
//!
//! Writes four files per session into an output directory:
//!
//! | File                         | Content                                   |
//! |------------------------------|-------------------------------------------|
//! | `<name>_claim_state.json`    | status, fields with both sources, outcome |
//! | `<name>_summary.txt`         | handler summary or what remains open      |
//! | `<name>_reasoning_trace.txt` | audit trace, then the reasoning summary   |
//! | `<name>_dialogue.txt`        | assistant/operator transcript             |

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use domain_intake::{
    handler_summary, render_trace, AbandonedReport, FieldValue, FinalClaim, HandlerSummary, SessionOutcome,
    SessionStatus, Speaker, SummarySource,
};

use crate::error::AppError;
use crate::session::CompletedSession;

/// Paths of the written artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub claim_state: PathBuf,
    pub summary: PathBuf,
    pub reasoning_trace: PathBuf,
    pub dialogue: PathBuf,
}

#[derive(Debug, Serialize)]
struct ClaimState<'a> {
    session_id: String,
    claim_type: &'a str,
    status: SessionStatus,
    opened_at: DateTime<Utc>,
    exported_at: DateTime<Utc>,
    turns: u32,
    max_turns: u32,
    documents: &'a [String],
    fields: &'a BTreeMap<String, FieldValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    final_claim: Option<&'a FinalClaim>,
    #[serde(skip_serializing_if = "Option::is_none")]
    abandoned: Option<&'a AbandonedReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<&'a HandlerSummary>,
}

/// Writes the session's artifacts to `dir`, creating it if needed
///
/// # Errors
///
/// Returns an error if the directory or a file cannot be written.
pub async fn write_artifacts(
    dir: impl AsRef<Path>,
    name: &str,
    session: &CompletedSession,
) -> Result<ArtifactPaths, AppError> {
    let dir = dir.as_ref();
    tokio::fs::create_dir_all(dir).await?;

    let paths = ArtifactPaths {
        claim_state: dir.join(format!("{name}_claim_state.json")),
        summary: dir.join(format!("{name}_summary.txt")),
        reasoning_trace: dir.join(format!("{name}_reasoning_trace.txt")),
        dialogue: dir.join(format!("{name}_dialogue.txt")),
    };

    tokio::fs::write(&paths.claim_state, claim_state_json(session)?).await?;
    tokio::fs::write(&paths.summary, summary_text(session)).await?;
    tokio::fs::write(&paths.reasoning_trace, trace_text(session)).await?;
    tokio::fs::write(&paths.dialogue, dialogue_text(session)).await?;

    info!(dir = %dir.display(), name, "artifacts written");
    Ok(paths)
}

pub fn claim_state_json(session: &CompletedSession) -> Result<String, AppError> {
    let record = &session.record;
    let (final_claim, abandoned) = match &session.outcome {
        SessionOutcome::Resolved(claim) => (Some(claim), None),
        SessionOutcome::Abandoned(report) => (None, Some(report)),
    };
    let state = ClaimState {
        session_id: record.session_id().to_string(),
        claim_type: record.claim_type(),
        status: record.status(),
        opened_at: record.created_at(),
        exported_at: Utc::now(),
        turns: record.turn_count(),
        max_turns: record.max_turns(),
        documents: record.documents(),
        fields: record.fields(),
        final_claim,
        abandoned,
        summary: session.summary.as_ref(),
    };
    Ok(serde_json::to_string_pretty(&state)?)
}

pub fn summary_text(session: &CompletedSession) -> String {
    match &session.outcome {
        SessionOutcome::Resolved(claim) => {
            let mut out = handler_summary(claim, &session.schema);
            if let Some(summary) = session.summary.as_ref().filter(|s| s.source == SummarySource::Model) {
                let _ = write!(out, "\nCase summary:\n{}\n", summary.summary.trim_end());
            }
            out
        }
        SessionOutcome::Abandoned(report) => {
            let mut out = String::new();
            let _ = writeln!(out, "Claim type: {}", report.claim_type);
            let _ = writeln!(out, "Status: abandoned ({:?}) after {} turn(s)", report.reason, report.turns);
            let _ = writeln!(out, "Completeness: {:.0}%", report.completeness * 100.0);
            if !report.missing.is_empty() {
                let _ = writeln!(out, "Still missing: {}", report.missing.join(", "));
            }
            if !report.conflicting.is_empty() {
                let _ = writeln!(out, "Still conflicting: {}", report.conflicting.join(", "));
            }
            out
        }
    }
}

pub fn trace_text(session: &CompletedSession) -> String {
    let mut lines = render_trace(session.record.events());
    if let Some(summary) = &session.summary {
        lines.push(String::new());
        lines.push(format!("Reasoning summary ({}):", summary.source));
        lines.extend(summary.reasoning.lines().map(str::to_string));
    }
    lines.push(String::new());
    lines.join("\n")
}

pub fn dialogue_text(session: &CompletedSession) -> String {
    session
        .record
        .transcript()
        .iter()
        .map(|entry| {
            let speaker = match entry.speaker {
                Speaker::Assistant => "Assistant",
                Speaker::Operator => "Operator",
            };
            format!("{speaker}: {}\n", entry.text)
        })
        .collect()
}
