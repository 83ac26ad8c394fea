//! Intake domain errors
//!
//! Only `InvalidState` is a contract violation that callers must handle.
//! `MalformedAnswer` and `AdapterFailure` are recovered inside the
//! resolution loop and show up in the audit trail rather than as faults.

use thiserror::Error;

use core_kernel::{CoreError, PortError};

use crate::record::SessionStatus;

/// Errors that can occur in the intake domain
#[derive(Debug, Error)]
pub enum IntakeError {
    /// An operation was invoked in a controller state that does not allow it
    #[error("Cannot {operation} while session is {status}")]
    InvalidState {
        operation: &'static str,
        status: SessionStatus,
    },

    /// Operator input does not have the field's expected shape
    #[error("Malformed answer for {field}: expected {expected}, got {answer:?}")]
    MalformedAnswer {
        field: String,
        expected: &'static str,
        answer: String,
    },

    /// A document source, extractor or operator adapter failed
    #[error("Adapter failure: {0}")]
    AdapterFailure(#[from] PortError),

    /// No schema is registered for the claim type
    #[error("Unknown claim type: {0}")]
    UnknownClaimType(String),

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl IntakeError {
    /// Creates an InvalidState error
    pub fn invalid_state(operation: &'static str, status: SessionStatus) -> Self {
        IntakeError::InvalidState { operation, status }
    }

    /// Creates a MalformedAnswer error
    pub fn malformed(field: impl Into<String>, expected: &'static str, answer: impl Into<String>) -> Self {
        IntakeError::MalformedAnswer {
            field: field.into(),
            expected,
            answer: answer.into(),
        }
    }

    /// Whether the loop recovers from this error by re-prompting
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IntakeError::MalformedAnswer { .. } | IntakeError::AdapterFailure(_))
    }
}
