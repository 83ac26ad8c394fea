//! Port plumbing shared by every adapter
//!
//! The intake core consumes three collaborators it does not implement:
//! document ingestion, document extraction and operator I/O. Their traits
//! live in `domain_intake`; this module holds what they have in common.
//!
//! ```text
//!      ResolutionController
//!              │  Arc<dyn Port>
//!              ▼
//!   DocumentSource / DocumentExtractor / OperatorIo
//!              ▲
//!     ┌────────┴─────────┐
//!  in-process        external API
//!  (files, rules)    (chat completions)
//! ```
//!
//! Adapters report every failure as a [`PortError`]. The controller only
//! needs to know whether a failure is worth retrying; which adapter failed
//! is never part of its decision.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure at an adapter boundary
#[derive(Debug, Error)]
pub enum PortError {
    #[error("{resource} not found: {key}")]
    NotFound { resource: String, key: String },

    #[error("Validation error: {message}")]
    Validation { message: String, field: Option<String> },

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Service unavailable: {service}")]
    ServiceUnavailable { service: String },

    /// Input or reply did not have the expected shape
    #[error("Transformation error: {message}")]
    Transformation { message: String },

    /// The adapter cannot handle this kind of input at all
    #[error("Unsupported: {message}")]
    Unsupported { message: String },

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl PortError {
    pub fn not_found(resource: impl Into<String>, key: impl fmt::Display) -> Self {
        PortError::NotFound {
            resource: resource.into(),
            key: key.to_string(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        PortError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn connection(message: impl Into<String>) -> Self {
        PortError::Connection {
            message: message.into(),
            source: None,
        }
    }

    pub fn transformation(message: impl Into<String>) -> Self {
        PortError::Transformation {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        PortError::Unsupported {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        PortError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Whether the same call may succeed if repeated
    pub fn is_transient(&self) -> bool {
        match self {
            PortError::Connection { .. }
            | PortError::Timeout { .. }
            | PortError::RateLimited { .. }
            | PortError::ServiceUnavailable { .. } => true,
            PortError::NotFound { .. }
            | PortError::Validation { .. }
            | PortError::Unauthorized { .. }
            | PortError::Transformation { .. }
            | PortError::Unsupported { .. }
            | PortError::Internal { .. } => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PortError::NotFound { .. })
    }
}

/// Marker for port traits
///
/// Adapters are held as `Arc<dyn ...>` and awaited from spawned tasks.
pub trait DomainPort: Send + Sync + 'static {}

/// Timeout and retry policy of one adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Name used in logs
    pub adapter_id: String,
    pub adapter_type: AdapterType,
    /// Bound on a single call
    pub timeout_ms: u64,
    /// Retries after the first attempt, transient failures only
    pub max_retries: u32,
    /// First backoff step; doubles with every retry
    pub retry_delay_ms: u64,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            adapter_id: "default".to_string(),
            adapter_type: AdapterType::InProcess,
            timeout_ms: 30_000,
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl AdapterConfig {
    /// Policy for an adapter calling an external API
    pub fn external(adapter_id: impl Into<String>, timeout_ms: u64) -> Self {
        Self {
            adapter_id: adapter_id.into(),
            adapter_type: AdapterType::ExternalApi,
            timeout_ms,
            ..Default::default()
        }
    }

    /// Policy for an external adapter that must give up inside `budget_ms`
    ///
    /// Every attempt gets an equal share of the budget, with one share left
    /// over for whatever the caller does after the adapter fails.
    pub fn external_within(adapter_id: impl Into<String>, budget_ms: u64) -> Self {
        let mut config = Self::external(adapter_id, budget_ms);
        let shares = u64::from(config.max_retries) + 2;
        config.timeout_ms = (budget_ms / shares).max(1);
        config.retry_delay_ms = config.retry_delay_ms.min(config.timeout_ms);
        config
    }

    /// Time all attempts may take together, backoff excluded
    pub fn attempts_budget(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.saturating_mul(u64::from(self.max_retries) + 1))
    }

    /// Backoff before retry `attempt` (1-based)
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let exponent = attempt.saturating_sub(1).min(16);
        self.retry_delay_ms.saturating_mul(1u64 << exponent)
    }

    /// Delay before retry `attempt`, honoring a rate limit's retry-after
    pub fn retry_delay(&self, attempt: u32, error: &PortError) -> Duration {
        let backoff = self.backoff_ms(attempt);
        let delay = match error {
            PortError::RateLimited { retry_after_secs } => retry_after_secs.saturating_mul(1000).max(backoff),
            _ => backoff,
        };
        Duration::from_millis(delay)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Where an adapter does its work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterType {
    /// Filesystem, deterministic rules
    InProcess,
    /// Remote API over the network
    ExternalApi,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_names_the_key() {
        let error = PortError::not_found("Document", "report.txt");
        assert!(error.is_not_found());
        assert!(!error.is_transient());
        assert_eq!(error.to_string(), "Document not found: report.txt");
    }

    #[test]
    fn test_transient_classification() {
        let timeout = PortError::Timeout {
            operation: "extract".to_string(),
            duration_ms: 5000,
        };
        assert!(timeout.is_transient());
        assert!(PortError::RateLimited { retry_after_secs: 60 }.is_transient());
        assert!(!PortError::transformation("reply was not a JSON object").is_transient());
        assert!(!PortError::unsupported("docx").is_transient());
    }

    #[test]
    fn test_backoff_doubles() {
        let config = AdapterConfig::external("model", 1000);
        assert_eq!(config.adapter_type, AdapterType::ExternalApi);
        assert_eq!(config.backoff_ms(1), 500);
        assert_eq!(config.backoff_ms(2), 1000);
        assert_eq!(config.backoff_ms(3), 2000);
    }

    #[test]
    fn test_budgeted_policy_leaves_room_after_the_last_attempt() {
        let config = AdapterConfig::external_within("model", 500);
        assert_eq!(config.timeout(), Duration::from_millis(125));
        assert_eq!(config.retry_delay_ms, 125);
        assert_eq!(config.attempts_budget(), Duration::from_millis(375));
        assert!(config.attempts_budget() < Duration::from_millis(500));
    }

    #[test]
    fn test_retry_after_overrides_shorter_backoff() {
        let config = AdapterConfig::default();
        let limited = PortError::RateLimited { retry_after_secs: 3 };
        assert_eq!(config.retry_delay(1, &limited), Duration::from_secs(3));
        assert_eq!(
            config.retry_delay(1, &PortError::connection("reset")),
            Duration::from_millis(500)
        );
    }
}
