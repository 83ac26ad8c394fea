//! Claim Intake Application Layer
//!
//! Wires the intake domain to its adapters and to the outside world.
//!
//! # Architecture
//!
//! - **Config**: `INTAKE_*` environment configuration, validated
//! - **Telemetry**: tracing subscriber setup
//! - **Session**: extractor and summarizer selection, session execution
//! - **Operators**: console and transcript-replay operators
//! - **Artifacts**: claim state, summary, trace and dialogue files
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_intake::{IntakeApp, IntakeConfig, SessionRequest, ReplayOperator};
//!
//! let app = IntakeApp::from_config(IntakeConfig::from_env()?)?;
//! let request = SessionRequest::new("motor_accident").with_document("police_report.txt");
//! let session = app.run(&request, Arc::new(ReplayOperator::parse(&answers))).await?;
//! write_artifacts("out", "claim_001", &session).await?;
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod operators;
pub mod session;
pub mod telemetry;

pub use artifacts::{summary_text, write_artifacts, ArtifactPaths};
pub use config::IntakeConfig;
pub use error::AppError;
pub use operators::{ConsoleOperator, ReplayOperator};
pub use session::{CompletedSession, IntakeApp, SessionRequest};
pub use telemetry::init_tracing;
