//! Model-backed handler summaries
//!
//! Two calls against the same chat endpoint as [`ModelExtractor`](crate::ModelExtractor):
//! one for the case summary and one for the reasoning, which also receives
//! the filtered trace entries. Replies are used as plain text.

use async_trait::async_trait;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, PortError};
use domain_intake::{ClaimSummarizer, HandlerSummary, SummaryBrief, SummarySource};

use crate::error::ExtractionError;
use crate::model::{strip_code_fences, ChatCall, ChatClient, ModelSettings};

const SUMMARY_SYSTEM: &str = "You brief insurance claims handlers. \
Write plain professional English, state only facts present in the claim, and say when something is unknown.";

const SUMMARY_TEMPERATURE: f32 = 0.2;
const REASONING_TEMPERATURE: f32 = 0.1;

/// Summarizer backed by a language model
#[derive(Debug, Clone)]
pub struct ModelSummarizer {
    client: ChatClient,
}

impl ModelSummarizer {
    /// Creates the summarizer
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::Configuration` if the API key is empty.
    pub fn new(settings: ModelSettings) -> Result<Self, ExtractionError> {
        Ok(Self {
            client: ChatClient::new(settings)?,
        })
    }

    async fn ask(&self, user: String, temperature: f32) -> Result<String, PortError> {
        let call = ChatCall {
            system: SUMMARY_SYSTEM,
            user,
            temperature,
            json: false,
        };
        let reply = self.client.complete(&call).await?;
        let text = strip_code_fences(&reply);
        if text.is_empty() {
            return Err(ExtractionError::invalid_reply("empty summary reply").into());
        }
        Ok(text.to_string())
    }
}

/// Prompt for the case summary
pub fn summary_prompt(brief: &SummaryBrief) -> Result<String, ExtractionError> {
    let state = serde_json::to_string_pretty(brief)?;
    Ok(format!(
        "Resolved claim:\n----------------\n{state}\n----------------\n\n\
         Write a case summary of 120 to 200 words for the claims handler. \
         Cover what happened, when and where, who was involved, injuries and damage. \
         Mention missing information briefly. No headings, no JSON."
    ))
}

/// Prompt for the reasoning account
pub fn reasoning_prompt(brief: &SummaryBrief) -> Result<String, ExtractionError> {
    let state = serde_json::to_string_pretty(brief)?;
    let events = serde_json::to_string_pretty(&brief.events)?;
    Ok(format!(
        "Resolved claim:\n----------------\n{state}\n----------------\n\n\
         Session events:\n----------------\n{events}\n----------------\n\n\
         Explain in 5 to 10 chronological bullet points how the claim was assembled: \
         what the claimant said, what the documents contributed, and how disagreements were settled. \
         Start each bullet with \"- \"."
    ))
}

impl DomainPort for ModelSummarizer {}

#[async_trait]
impl ClaimSummarizer for ModelSummarizer {
    fn name(&self) -> &str {
        "model"
    }

    #[instrument(skip(self, brief), fields(model = %self.client.settings().model, claim_type = %brief.claim_type))]
    async fn summarize(&self, brief: &SummaryBrief) -> Result<HandlerSummary, PortError> {
        let summary = self.ask(summary_prompt(brief)?, SUMMARY_TEMPERATURE).await?;
        let reasoning = self.ask(reasoning_prompt(brief)?, REASONING_TEMPERATURE).await?;
        debug!(summary_chars = summary.len(), reasoning_chars = reasoning.len(), "model summary written");
        Ok(HandlerSummary {
            summary,
            reasoning,
            source: SummarySource::Model,
        })
    }
}
