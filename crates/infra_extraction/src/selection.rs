//! Configuration-driven extractor selection
//!
//! The application picks an [`ExtractorSource`] from configuration and
//! receives a `DocumentExtractor` trait object; the resolution loop never
//! learns which implementation it was given.
//!
//! ```rust,ignore
//! let source = ExtractorSource::ModelWithFallback(ModelSettings::new(ModelProvider::OpenRouter, key));
//! let extractor = build_extractor(&source)?;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use domain_intake::{ClaimSummarizer, DocumentExtractor};

use crate::error::ExtractionError;
use crate::fallback::FallbackExtractor;
use crate::model::{ModelExtractor, ModelSettings};
use crate::rule_based::RuleBasedExtractor;
use crate::summarizer::ModelSummarizer;

/// Extractor kind as named in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractorKind {
    RuleBased,
    Model,
    ModelWithFallback,
}

/// Which extractor to build, with its settings
#[derive(Debug, Clone)]
pub enum ExtractorSource {
    /// Deterministic, offline
    RuleBased,
    /// Language model only; failures leave the document empty
    Model(ModelSettings),
    /// Language model, rule-based when the model fails
    ModelWithFallback(ModelSettings),
}

impl Default for ExtractorSource {
    fn default() -> Self {
        ExtractorSource::RuleBased
    }
}

impl ExtractorSource {
    /// Resolves a configured kind
    ///
    /// A model kind without model settings (no API key) degrades to
    /// rule-based extraction.
    pub fn from_kind(kind: ExtractorKind, model: Option<ModelSettings>) -> Self {
        match (kind, model) {
            (ExtractorKind::Model, Some(settings)) => ExtractorSource::Model(settings),
            (ExtractorKind::ModelWithFallback, Some(settings)) => ExtractorSource::ModelWithFallback(settings),
            (ExtractorKind::RuleBased, _) => ExtractorSource::RuleBased,
            (kind, None) => {
                info!(?kind, "no model settings available, using rule-based extraction");
                ExtractorSource::RuleBased
            }
        }
    }

    pub fn kind(&self) -> ExtractorKind {
        match self {
            ExtractorSource::RuleBased => ExtractorKind::RuleBased,
            ExtractorSource::Model(_) => ExtractorKind::Model,
            ExtractorSource::ModelWithFallback(_) => ExtractorKind::ModelWithFallback,
        }
    }
}

/// Builds the extractor for a source
///
/// # Errors
///
/// Returns an error if a model extractor cannot be constructed.
pub fn build_extractor(source: &ExtractorSource) -> Result<Arc<dyn DocumentExtractor>, ExtractionError> {
    let extractor: Arc<dyn DocumentExtractor> = match source {
        ExtractorSource::RuleBased => Arc::new(RuleBasedExtractor::new()),
        ExtractorSource::Model(settings) => Arc::new(ModelExtractor::new(settings.clone())?),
        ExtractorSource::ModelWithFallback(settings) => Arc::new(
            FallbackExtractor::new(
                Arc::new(ModelExtractor::new(settings.clone())?),
                Arc::new(RuleBasedExtractor::new()),
            )
            .with_primary_timeout(settings.adapter.attempts_budget()),
        ),
    };
    info!(extractor = extractor.name(), "document extractor selected");
    Ok(extractor)
}

/// Builds the summarizer for a source, `None` for rule-based extraction
///
/// # Errors
///
/// Returns an error if the model summarizer cannot be constructed.
pub fn build_summarizer(source: &ExtractorSource) -> Result<Option<Arc<dyn ClaimSummarizer>>, ExtractionError> {
    match source {
        ExtractorSource::RuleBased => Ok(None),
        ExtractorSource::Model(settings) | ExtractorSource::ModelWithFallback(settings) => {
            let summarizer: Arc<dyn ClaimSummarizer> = Arc::new(ModelSummarizer::new(settings.clone())?);
            info!(summarizer = summarizer.name(), "handler summarizer selected");
            Ok(Some(summarizer))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelProvider;

    #[test]
    fn test_model_kind_without_settings_degrades() {
        let source = ExtractorSource::from_kind(ExtractorKind::ModelWithFallback, None);
        assert_eq!(source.kind(), ExtractorKind::RuleBased);
    }

    #[test]
    fn test_build_names() {
        let rule = build_extractor(&ExtractorSource::RuleBased).unwrap();
        assert_eq!(rule.name(), "rule_based");

        let settings = ModelSettings::new(ModelProvider::OpenRouter, "key");
        let composed = build_extractor(&ExtractorSource::ModelWithFallback(settings)).unwrap();
        assert_eq!(composed.name(), "model+rule_based");
    }

    #[test]
    fn test_summarizer_only_for_model_sources() {
        assert!(build_summarizer(&ExtractorSource::RuleBased).unwrap().is_none());

        let settings = ModelSettings::new(ModelProvider::OpenAi, "key");
        let summarizer = build_summarizer(&ExtractorSource::Model(settings)).unwrap();
        assert_eq!(summarizer.map(|s| s.name().to_string()).as_deref(), Some("model"));
    }
}
