//! Fallback composition of two extractors

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{instrument, warn};

use core_kernel::{DomainPort, PortError};
use domain_intake::{ClaimSchema, DocumentExtractor, Extraction};

/// Runs `fallback` whenever `primary` fails
///
/// The extraction reports `fallback_used` so the session can record that
/// the document was read by the secondary extractor. With a primary
/// timeout, a primary that does not answer in time counts as failed.
#[derive(Clone)]
pub struct FallbackExtractor {
    primary: Arc<dyn DocumentExtractor>,
    fallback: Arc<dyn DocumentExtractor>,
    primary_timeout: Option<Duration>,
    name: String,
}

impl FallbackExtractor {
    pub fn new(primary: Arc<dyn DocumentExtractor>, fallback: Arc<dyn DocumentExtractor>) -> Self {
        let name = format!("{}+{}", primary.name(), fallback.name());
        Self {
            primary,
            fallback,
            primary_timeout: None,
            name,
        }
    }

    /// Bounds the primary extractor; the fallback is not bounded here
    pub fn with_primary_timeout(mut self, timeout: Duration) -> Self {
        self.primary_timeout = Some(timeout);
        self
    }

    async fn extract_primary(&self, text: &str, schema: &ClaimSchema) -> Result<Extraction, PortError> {
        let Some(limit) = self.primary_timeout else {
            return self.primary.extract(text, schema).await;
        };
        tokio::time::timeout(limit, self.primary.extract(text, schema))
            .await
            .unwrap_or_else(|_| {
                Err(PortError::Timeout {
                    operation: format!("{} extraction", self.primary.name()),
                    duration_ms: limit.as_millis() as u64,
                })
            })
    }
}

impl std::fmt::Debug for FallbackExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackExtractor")
            .field("name", &self.name)
            .field("primary_timeout", &self.primary_timeout)
            .finish()
    }
}

impl DomainPort for FallbackExtractor {}

#[async_trait]
impl DocumentExtractor for FallbackExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self, text, schema), fields(extractor = %self.name))]
    async fn extract(&self, text: &str, schema: &ClaimSchema) -> Result<Extraction, PortError> {
        match self.extract_primary(text, schema).await {
            Ok(extraction) => Ok(extraction),
            Err(error) => {
                warn!(
                    primary = self.primary.name(),
                    fallback = self.fallback.name(),
                    error = %error,
                    "primary extractor failed, using fallback"
                );
                let mut extraction = self.fallback.extract(text, schema).await?;
                extraction.fallback_used = true;
                Ok(extraction)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain_intake::ports::memory::{FailingExtractor, StaticExtractor};
    use domain_intake::{source_values, FieldKind, FieldSpec};

    fn schema() -> ClaimSchema {
        ClaimSchema::new("test", vec![FieldSpec::required("location", FieldKind::Text)])
    }

    #[tokio::test]
    async fn test_primary_success_is_passed_through() {
        let extractor = FallbackExtractor::new(
            Arc::new(StaticExtractor::new(source_values([("location", "Bern")]))),
            Arc::new(FailingExtractor::new("unused")),
        );

        let extraction = extractor.extract("text", &schema()).await.unwrap();
        assert!(!extraction.fallback_used);
        assert_eq!(extraction.values["location"].as_deref(), Some("Bern"));
    }

    #[tokio::test]
    async fn test_primary_failure_uses_fallback() {
        let extractor = FallbackExtractor::new(
            Arc::new(FailingExtractor::new("model endpoint")),
            Arc::new(StaticExtractor::new(source_values([("location", "Basel")]))),
        );

        let extraction = extractor.extract("text", &schema()).await.unwrap();
        assert!(extraction.fallback_used);
        assert_eq!(extraction.extractor, "static");
        assert_eq!(extractor.name(), "failing+static");
    }

    #[tokio::test]
    async fn test_slow_primary_gives_way_to_fallback() {
        let extractor = FallbackExtractor::new(
            Arc::new(StaticExtractor::new(source_values([("location", "Bern")])).with_delay(Duration::from_secs(5))),
            Arc::new(StaticExtractor::new(source_values([("location", "Basel")]))),
        )
        .with_primary_timeout(Duration::from_millis(20));

        let started = std::time::Instant::now();
        let extraction = extractor.extract("text", &schema()).await.unwrap();

        assert!(extraction.fallback_used);
        assert_eq!(extraction.values["location"].as_deref(), Some("Basel"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_both_failing_surfaces_fallback_error() {
        let extractor = FallbackExtractor::new(
            Arc::new(FailingExtractor::new("a")),
            Arc::new(FailingExtractor::new("b")),
        );
        assert!(extractor.extract("text", &schema()).await.is_err());
    }
}
