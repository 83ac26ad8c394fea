//! Intake configuration
//!
//! Loaded from `INTAKE_*` environment variables (a `.env` file is honored by
//! the binary) and validated before use.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use validator::Validate;

use core_kernel::AdapterConfig;
use domain_intake::ControllerSettings;
use infra_extraction::{ExtractorKind, ExtractorSource, ModelProvider, ModelSettings};

use crate::error::AppError;

/// Application configuration
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct IntakeConfig {
    /// Turn budget per session
    #[validate(range(min = 1, max = 500))]
    pub max_turns: u32,
    /// Missing fields asked per turn
    #[validate(range(min = 1, max = 3))]
    pub questions_per_turn: usize,
    /// Bound on one extraction call
    #[validate(range(min = 1))]
    pub extraction_timeout_ms: u64,
    /// Extractor to use; derived from the API key when unset
    pub extractor: Option<ExtractorKind>,
    pub model_provider: ModelProvider,
    /// Model name; the provider's default when unset
    pub model_name: Option<String>,
    pub api_key: Option<String>,
    #[validate(url)]
    pub site_url: Option<String>,
    pub site_name: Option<String>,
    /// Document characters sent to the model
    #[validate(range(min = 100))]
    pub max_document_chars: usize,
    /// Model endpoint override (OpenAI-compatible gateways)
    #[validate(url)]
    pub model_base_url: Option<String>,
    pub log_level: String,
    pub log_json: bool,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            max_turns: 20,
            questions_per_turn: 1,
            extraction_timeout_ms: 30_000,
            extractor: None,
            model_provider: ModelProvider::OpenRouter,
            model_name: None,
            api_key: None,
            site_url: None,
            site_name: None,
            max_document_chars: 6000,
            model_base_url: None,
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl IntakeConfig {
    /// Loads configuration from the process environment
    pub fn from_env() -> Result<Self, AppError> {
        Self::load(None)
    }

    /// Loads configuration from explicit `INTAKE_*` pairs instead of the environment
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self::load(Some(map))
    }

    fn load(source: Option<HashMap<String, String>>) -> Result<Self, AppError> {
        let config: Self = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("INTAKE")
                    .try_parsing(true)
                    .source(source),
            )
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// API key, if one is set and non-blank
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// Configured extractor kind, or the default for the key situation
    pub fn extractor_kind(&self) -> ExtractorKind {
        match (self.extractor, self.api_key()) {
            (Some(kind), _) => kind,
            (None, Some(_)) => ExtractorKind::ModelWithFallback,
            (None, None) => ExtractorKind::RuleBased,
        }
    }

    pub fn controller_settings(&self) -> ControllerSettings {
        ControllerSettings::default()
            .with_max_turns(self.max_turns)
            .with_questions_per_turn(self.questions_per_turn)
            .with_extraction_timeout(Duration::from_millis(self.extraction_timeout_ms))
    }

    /// Model settings; `None` without an API key
    ///
    /// The model's attempts must all end inside the extraction timeout so
    /// that the rule-based fallback still runs when the model hangs.
    pub fn model_settings(&self) -> Option<ModelSettings> {
        let key = self.api_key()?;
        let mut settings = ModelSettings::new(self.model_provider, key)
            .with_attribution(self.site_url.clone(), self.site_name.clone())
            .with_adapter(AdapterConfig::external_within("model-extractor", self.extraction_timeout_ms));
        settings.max_document_chars = self.max_document_chars;
        if let Some(model) = &self.model_name {
            settings = settings.with_model(model.clone());
        }
        if let Some(base_url) = &self.model_base_url {
            settings = settings.with_base_url(base_url.clone());
        }
        Some(settings)
    }

    pub fn extractor_source(&self) -> ExtractorSource {
        ExtractorSource::from_kind(self.extractor_kind(), self.model_settings())
    }
}
