//! Custom Test Assertions
//!
//! Assertion helpers for session outcomes and the audit trail that give
//! more meaningful failure messages than standard assertions.

use domain_intake::{AbandonedReport, ClaimRecord, EventKind, FieldState, FinalClaim, SessionOutcome};

/// Asserts that a session resolved and returns the final claim
pub fn assert_resolved(outcome: &SessionOutcome) -> &FinalClaim {
    match outcome {
        SessionOutcome::Resolved(claim) => claim,
        SessionOutcome::Abandoned(report) => panic!(
            "Expected a resolved claim, session was abandoned after {} turn(s): missing={:?}, conflicting={:?}\n{}",
            report.turns,
            report.missing,
            report.conflicting,
            report.trace.join("\n")
        ),
    }
}

/// Asserts that a session was abandoned and returns the report
pub fn assert_abandoned(outcome: &SessionOutcome) -> &AbandonedReport {
    match outcome {
        SessionOutcome::Abandoned(report) => report,
        SessionOutcome::Resolved(claim) => panic!(
            "Expected an abandoned session, claim resolved with fields {:?}",
            claim.fields
        ),
    }
}

/// Asserts a field's state and resolved value
pub fn assert_field(record: &ClaimRecord, field: &str, state: FieldState, resolved: Option<&str>) {
    assert_eq!(
        record.field_state(field),
        state,
        "Unexpected state for field '{field}'"
    );
    assert_eq!(
        record.resolved_value(field),
        resolved,
        "Unexpected resolved value for field '{field}'"
    );
}

/// Asserts that the event log contains `expected` as an ordered subsequence
pub fn assert_events_in_order(record: &ClaimRecord, expected: &[EventKind]) {
    let kinds: Vec<EventKind> = record.events().iter().map(|e| e.kind).collect();
    let mut remaining = expected.iter().peekable();
    for kind in &kinds {
        if remaining.peek() == Some(&kind) {
            remaining.next();
        }
    }
    assert!(
        remaining.peek().is_none(),
        "Event log {:?} does not contain {:?} in order",
        kinds,
        expected
    );
}

/// Counts events of one kind
pub fn count_events(record: &ClaimRecord, kind: EventKind) -> usize {
    record.events().iter().filter(|e| e.kind == kind).count()
}

/// Asserts that some trace line mentions `needle`
pub fn assert_trace_mentions(trace: &[String], needle: &str) {
    assert!(
        trace.iter().any(|line| line.contains(needle)),
        "No trace line mentions '{needle}':\n{}",
        trace.join("\n")
    );
}
