//! Handler summaries
//!
//! A resolved claim is handed over with two texts: a short case summary and
//! a plain-language account of how the session got there. A
//! [`ClaimSummarizer`](crate::ports::ClaimSummarizer) may write both from a
//! [`SummaryBrief`]; without one, or when it fails, [`template_summary`]
//! renders them deterministically.
//!
//! The brief carries only what a claims handler cares about. Session
//! mechanics (turn counts, prompt attempts, budgets) stay out of it, and
//! trace entries about them are filtered before anything is summarized.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::finalizer::{handler_summary, FinalClaim};
use crate::schema::ClaimSchema;

/// Trace entries mentioning these are session mechanics, not claim facts
const TECHNICAL_MARKERS: &[&str] = &[
    "completeness",
    "attempt",
    "budget",
    "cycle",
    "no progress",
    "timed out",
];

/// Trace entries kept in the template reasoning
const TEMPLATE_REASONING_ENTRIES: usize = 6;

/// One field as the handler sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BriefField {
    pub field: String,
    pub label: String,
    pub value: Option<String>,
}

/// Handler-facing view of a resolved claim
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryBrief {
    pub claim_type: String,
    /// Schema order
    pub fields: Vec<BriefField>,
    pub documents: Vec<String>,
    /// How each conflict was settled
    pub settlements: Vec<String>,
    /// Trace entries without technical ones
    #[serde(skip)]
    pub events: Vec<String>,
}

impl SummaryBrief {
    pub fn new(claim: &FinalClaim, schema: &ClaimSchema) -> Self {
        let fields = schema
            .fields
            .iter()
            .map(|spec| BriefField {
                field: spec.name.clone(),
                label: spec.label(),
                value: claim.value(&spec.name).map(str::to_string),
            })
            .collect();
        Self {
            claim_type: claim.claim_type.clone(),
            fields,
            documents: claim.documents.clone(),
            settlements: claim.settlements.clone(),
            events: filter_technical_entries(&claim.trace),
        }
    }
}

/// Who wrote a summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    Model,
    Template,
}

impl fmt::Display for SummarySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummarySource::Model => f.write_str("model"),
            SummarySource::Template => f.write_str("template"),
        }
    }
}

/// Case summary and reasoning for a claims handler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandlerSummary {
    pub summary: String,
    pub reasoning: String,
    pub source: SummarySource,
}

/// Drops trace entries about session mechanics
pub fn filter_technical_entries(trace: &[String]) -> Vec<String> {
    trace
        .iter()
        .filter(|entry| {
            let lowered = entry.to_lowercase();
            !TECHNICAL_MARKERS.iter().any(|marker| lowered.contains(marker))
        })
        .cloned()
        .collect()
}

/// Deterministic summary used when no summarizer is available
pub fn template_summary(claim: &FinalClaim, schema: &ClaimSchema, brief: &SummaryBrief) -> HandlerSummary {
    let recent = brief
        .events
        .len()
        .saturating_sub(TEMPLATE_REASONING_ENTRIES);
    let reasoning = if brief.events.is_empty() {
        "- Processed claim.".to_string()
    } else {
        brief.events[recent..]
            .iter()
            .map(|entry| format!("- {entry}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    HandlerSummary {
        summary: handler_summary(claim, schema),
        reasoning,
        source: SummarySource::Template,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_technical_entries_are_dropped() {
        let trace = vec![
            "1. (turn 0) [session_started] opened theft claim with 4 fields (3 required), budget 20 turns".to_string(),
            "2. (turn 0) [document_ingested] report.txt: 3 field(s) extracted by rule_based".to_string(),
            "3. (turn 1) [field_missing_prompted] date: asked (attempt 1)".to_string(),
            "4. (turn 1) [mismatch_resolved] location: settled with document".to_string(),
        ];

        let kept = filter_technical_entries(&trace);

        assert_eq!(kept.len(), 2);
        assert!(kept[0].contains("[document_ingested]"));
        assert!(kept[1].contains("[mismatch_resolved]"));
    }
}
