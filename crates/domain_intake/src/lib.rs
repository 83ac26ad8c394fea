//! Claim Intake Domain
//!
//! This crate implements the claim-resolution loop: it merges what the
//! operator says with what a source document (typically a police report)
//! says, and iterates with the operator until the claim record is complete
//! and internally consistent.
//!
//! # Session Lifecycle
//!
//! ```text
//! Collecting <-> AwaitingConfirmation -> Resolved
//!      \________________________________/ -> Abandoned (turn budget / abort)
//! ```
//!
//! # Components
//!
//! - [`schema`]: required and optional fields per claim type
//! - [`reconciler`]: merges operator and document values per field
//! - [`evaluator`]: missing and conflicting fields, completeness
//! - [`controller`]: the turn-by-turn state machine
//! - [`finalizer`]: final field values and the audit trace
//! - [`summary`]: handler summary and reasoning of a resolved claim

pub mod answer;
pub mod controller;
pub mod error;
pub mod evaluator;
pub mod event;
pub mod field;
pub mod finalizer;
pub mod normalize;
pub mod ports;
pub mod reconciler;
pub mod record;
pub mod schema;
pub mod summary;

pub use answer::{interpret_confirmation, parse_answer, ConfirmationChoice};
pub use controller::{
    AbandonReason, AbandonedReport, ControllerSettings, NextAction, ResolutionController, SessionOutcome,
};
pub use error::IntakeError;
pub use evaluator::{completeness_score, evaluate, Evaluation};
pub use event::{Event, EventKind};
pub use field::{FieldState, FieldValue};
pub use finalizer::{finalize, handler_summary, render_trace, FinalClaim};
pub use normalize::FieldKind;
pub use ports::{
    ClaimSummarizer, ConfirmationRequest, DocumentExtractor, DocumentSource, Extraction, OperatorIo, OperatorPrompt,
};
pub use reconciler::{source_values, Reconciler, SourceValues};
pub use record::{ClaimRecord, DialogueEntry, SessionStatus, Speaker};
pub use schema::{ClaimSchema, FieldSpec, SchemaRegistry, DEFAULT_CLAIM_TYPE};
pub use summary::{
    filter_technical_entries, template_summary, BriefField, HandlerSummary, SummaryBrief, SummarySource,
};
