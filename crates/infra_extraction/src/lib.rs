//! Extraction Infrastructure
//!
//! Adapters behind the intake domain's document ports:
//!
//! - [`FileDocumentSource`]: reads `.txt`/`.md` documents and PDF text from disk
//! - [`RuleBasedExtractor`]: labeled lines and patterns, no network access
//! - [`ModelExtractor`]: OpenAI-compatible chat completions (OpenRouter, OpenAI)
//! - [`FallbackExtractor`]: model first, rule-based on failure
//! - [`ModelSummarizer`]: handler summary and reasoning from the same endpoint
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_extraction::{build_extractor, ExtractorSource, FileDocumentSource};
//!
//! let extractor = build_extractor(&ExtractorSource::RuleBased)?;
//! let documents = Arc::new(FileDocumentSource::new().with_max_chars(6000));
//! ```

pub mod documents;
pub mod error;
pub mod fallback;
pub mod model;
pub mod rule_based;
pub mod selection;
pub mod summarizer;

pub use documents::FileDocumentSource;
pub use error::ExtractionError;
pub use fallback::FallbackExtractor;
pub use model::{ModelExtractor, ModelProvider, ModelSettings};
pub use rule_based::RuleBasedExtractor;
pub use selection::{build_extractor, build_summarizer, ExtractorKind, ExtractorSource};
pub use summarizer::ModelSummarizer;
