//! Extraction infrastructure errors
//!
//! Adapters in this crate work with [`ExtractionError`] internally and hand
//! a [`PortError`] to the domain, so the resolution loop can degrade
//! without knowing which adapter failed.

use reqwest::StatusCode;
use thiserror::Error;

use core_kernel::PortError;

/// Errors raised by document sources and extractors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The document file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The document's format is not handled
    #[error("Unsupported document type: {0}")]
    UnsupportedFormat(String),

    /// The HTTP request could not be completed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The model endpoint answered with a non-success status
    #[error("Model API error ({status}): {body}")]
    Api {
        status: StatusCode,
        body: String,
        retry_after_secs: Option<u64>,
    },

    /// The model's reply could not be read as field values
    #[error("Invalid model reply: {0}")]
    InvalidReply(String),

    /// The adapter is missing required settings
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A prompt payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExtractionError {
    /// Creates an InvalidReply error
    pub fn invalid_reply(message: impl Into<String>) -> Self {
        ExtractionError::InvalidReply(message.into())
    }

    /// Creates a Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        ExtractionError::Configuration(message.into())
    }
}

/// Maps extraction errors onto the port error taxonomy
///
/// - 401/403 -> `PortError::Unauthorized`
/// - 404 -> `PortError::NotFound`
/// - 429 -> `PortError::RateLimited`
/// - 5xx -> `PortError::ServiceUnavailable`
/// - request timeouts -> `PortError::Timeout`
/// - connect failures -> `PortError::Connection`
impl From<ExtractionError> for PortError {
    fn from(error: ExtractionError) -> Self {
        match error {
            ExtractionError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                PortError::not_found("Document", e)
            }
            ExtractionError::Io(e) => PortError::Internal {
                message: "failed to read document".to_string(),
                source: Some(Box::new(e)),
            },
            ExtractionError::UnsupportedFormat(kind) => {
                PortError::unsupported(format!("document type {kind}"))
            }
            ExtractionError::Http(e) if e.is_timeout() => PortError::Timeout {
                operation: "model chat completion".to_string(),
                duration_ms: 0,
            },
            ExtractionError::Http(e) if e.is_connect() => PortError::Connection {
                message: "model endpoint unreachable".to_string(),
                source: Some(Box::new(e)),
            },
            ExtractionError::Http(e) if e.is_decode() => PortError::transformation(e.to_string()),
            ExtractionError::Http(e) => PortError::Internal {
                message: "model request failed".to_string(),
                source: Some(Box::new(e)),
            },
            ExtractionError::Api {
                status,
                body,
                retry_after_secs,
            } => match status.as_u16() {
                401 | 403 => PortError::Unauthorized { message: body },
                404 => PortError::not_found("Model endpoint", status),
                429 => PortError::RateLimited {
                    retry_after_secs: retry_after_secs.unwrap_or(1),
                },
                500..=599 => PortError::ServiceUnavailable {
                    service: format!("model endpoint ({status})"),
                },
                _ => PortError::internal(format!("model endpoint returned {status}: {body}")),
            },
            ExtractionError::InvalidReply(message) => PortError::transformation(message),
            ExtractionError::Configuration(message) => PortError::validation(message),
            ExtractionError::Serialization(e) => PortError::transformation(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16) -> ExtractionError {
        ExtractionError::Api {
            status: StatusCode::from_u16(status).unwrap(),
            body: "body".to_string(),
            retry_after_secs: None,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(PortError::from(api(401)), PortError::Unauthorized { .. }));
        assert!(PortError::from(api(429)).is_transient());
        assert!(PortError::from(api(503)).is_transient());
        assert!(!PortError::from(api(400)).is_transient());
    }

    #[test]
    fn test_missing_file_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "report.txt");
        assert!(PortError::from(ExtractionError::Io(io)).is_not_found());
    }

    #[test]
    fn test_invalid_reply_is_not_transient() {
        let error = PortError::from(ExtractionError::invalid_reply("not an object"));
        assert!(matches!(error, PortError::Transformation { .. }));
        assert!(!error.is_transient());
    }
}
