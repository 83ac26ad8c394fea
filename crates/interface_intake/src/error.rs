//! Application errors

use thiserror::Error;

use domain_intake::IntakeError;
use infra_extraction::ExtractionError;

/// Errors surfaced by the application layer
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("Failed to write artifacts: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize claim state: {0}")]
    Serialization(#[from] serde_json::Error),
}
