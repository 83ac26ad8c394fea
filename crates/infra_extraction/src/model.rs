//! Model-backed extractor
//!
//! Sends the document to an OpenAI-compatible chat-completions endpoint
//! (OpenRouter or OpenAI) and reads the reply as a JSON object of field
//! values. Transient failures (connection errors, timeouts, 429, 5xx) are
//! retried with exponential backoff per the adapter's [`AdapterConfig`].
//!
//! The HTTP exchange lives in a crate-private chat client that the
//! summarizer shares.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use core_kernel::{AdapterConfig, DomainPort, PortError};
use domain_intake::{ClaimSchema, DocumentExtractor, Extraction, SourceValues};

use crate::error::ExtractionError;

const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1";
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

const SYSTEM_PROMPT: &str = "You extract structured information from insurance claim documents. \
Be precise and conservative: never invent facts that the text does not clearly state. \
If a value is missing or unclear, set it to null. Reply with JSON only.";

/// Which OpenAI-compatible provider to call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    OpenRouter,
    OpenAi,
}

impl ModelProvider {
    pub fn base_url(&self) -> &'static str {
        match self {
            ModelProvider::OpenRouter => OPENROUTER_API_URL,
            ModelProvider::OpenAi => OPENAI_API_URL,
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ModelProvider::OpenRouter => "mistralai/mistral-small-3.2-24b-instruct:free",
            ModelProvider::OpenAi => "gpt-4o-mini",
        }
    }
}

/// Settings for [`ModelExtractor`]
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub provider: ModelProvider,
    pub model: String,
    pub api_key: String,
    /// Sent as `HTTP-Referer` (OpenRouter attribution)
    pub site_url: Option<String>,
    /// Sent as `X-Title` (OpenRouter attribution)
    pub site_name: Option<String>,
    /// Document text beyond this many characters is not sent
    pub max_document_chars: usize,
    /// Overrides the provider's base URL
    pub base_url: Option<String>,
    pub adapter: AdapterConfig,
}

impl ModelSettings {
    pub fn new(provider: ModelProvider, api_key: impl Into<String>) -> Self {
        Self {
            provider,
            model: provider.default_model().to_string(),
            api_key: api_key.into(),
            site_url: None,
            site_name: None,
            max_document_chars: 6000,
            base_url: None,
            adapter: AdapterConfig::external("model-extractor", 30_000),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_attribution(mut self, site_url: Option<String>, site_name: Option<String>) -> Self {
        self.site_url = site_url;
        self.site_name = site_name;
        self
    }

    pub fn with_adapter(mut self, adapter: AdapterConfig) -> Self {
        self.adapter = adapter;
        self
    }

    fn endpoint(&self) -> String {
        let base = self.base_url.as_deref().unwrap_or(self.provider.base_url());
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// One chat-completions exchange
#[derive(Debug, Clone)]
pub(crate) struct ChatCall<'a> {
    pub system: &'a str,
    pub user: String,
    pub temperature: f32,
    /// Asks the provider for a JSON object reply
    pub json: bool,
}

/// Chat-completions client shared by the model adapters
#[derive(Debug, Clone)]
pub(crate) struct ChatClient {
    settings: ModelSettings,
    http: reqwest::Client,
}

impl ChatClient {
    pub(crate) fn new(settings: ModelSettings) -> Result<Self, ExtractionError> {
        if settings.api_key.trim().is_empty() {
            return Err(ExtractionError::configuration("model calls require an API key"));
        }
        let http = reqwest::Client::builder()
            .timeout(settings.adapter.timeout())
            .build()?;
        Ok(Self { settings, http })
    }

    pub(crate) fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    fn headers(&self) -> Result<HeaderMap, ExtractionError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.settings.api_key))
            .map_err(|_| ExtractionError::configuration("API key is not a valid header value"))?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if self.settings.provider == ModelProvider::OpenRouter {
            if let Some(value) = self.settings.site_url.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
                headers.insert("HTTP-Referer", value);
            }
            if let Some(value) = self.settings.site_name.as_deref().and_then(|v| HeaderValue::from_str(v).ok()) {
                headers.insert("X-Title", value);
            }
        }
        Ok(headers)
    }

    async fn send(&self, call: &ChatCall<'_>) -> Result<String, ExtractionError> {
        let request = ChatRequest {
            model: &self.settings.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: call.system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: call.user.clone(),
                },
            ],
            temperature: call.temperature,
            response_format: call.json.then_some(ResponseFormat { kind: "json_object" }),
        };

        let response = self
            .http
            .post(self.settings.endpoint())
            .headers(self.headers()?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(ExtractionError::Api {
                status,
                body,
                retry_after_secs,
            });
        }

        let chat: ChatResponse = response.json().await?;
        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ExtractionError::invalid_reply("no content in model response"))
    }

    /// Sends the call, retrying transient failures per the adapter policy
    pub(crate) async fn complete(&self, call: &ChatCall<'_>) -> Result<String, PortError> {
        let max_retries = self.settings.adapter.max_retries;
        let mut attempt = 0;

        loop {
            let error: PortError = match self.send(call).await {
                Ok(reply) => {
                    debug!(attempt, chars = reply.len(), "model reply received");
                    return Ok(reply);
                }
                Err(e) => e.into(),
            };

            if !error.is_transient() || attempt >= max_retries {
                warn!(error = %error, attempt, "model call failed");
                return Err(error);
            }
            attempt += 1;
            let delay = self.settings.adapter.retry_delay(attempt, &error);
            warn!(error = %error, attempt, delay_ms = delay.as_millis() as u64, "transient model failure, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Extractor backed by a language model
#[derive(Debug, Clone)]
pub struct ModelExtractor {
    client: ChatClient,
}

impl ModelExtractor {
    /// Creates the extractor
    ///
    /// # Errors
    ///
    /// Returns `ExtractionError::Configuration` if the API key is empty, or
    /// `ExtractionError::Http` if the HTTP client cannot be built.
    pub fn new(settings: ModelSettings) -> Result<Self, ExtractionError> {
        Ok(Self {
            client: ChatClient::new(settings)?,
        })
    }

    pub fn settings(&self) -> &ModelSettings {
        self.client.settings()
    }
}

/// Builds the user prompt for a schema
pub fn build_prompt(text: &str, schema: &ClaimSchema, max_chars: usize) -> String {
    let document = truncate_chars(text, max_chars);
    let mut prompt = format!(
        "Claim type: {}\n\nDocument text:\n----------------\n{}\n----------------\n\n\
         Extract ONLY the following fields if the document states them:\n",
        schema.claim_type, document
    );
    for spec in &schema.fields {
        prompt.push_str(&format!("- {} ({})\n", spec.name, spec.kind.expected_shape()));
    }
    prompt.push_str(
        "\nReturn a single JSON object with exactly these keys. \
         Use null for any field the document does not clearly contain. \
         Do not guess and do not add other keys or text.",
    );
    prompt
}

/// Reads a model reply as field values
///
/// The reply may be wrapped in a Markdown code fence. Keys outside the
/// schema are dropped; `null` becomes unknown; numbers and booleans are
/// rendered as text.
///
/// # Errors
///
/// Returns `ExtractionError::InvalidReply` unless the reply is a JSON object.
pub fn parse_reply(reply: &str, schema: &ClaimSchema) -> Result<SourceValues, ExtractionError> {
    let body = strip_code_fences(reply);
    let parsed: Value =
        serde_json::from_str(body).map_err(|e| ExtractionError::invalid_reply(format!("not JSON: {e}")))?;
    let Value::Object(object) = parsed else {
        return Err(ExtractionError::invalid_reply("reply is not a JSON object"));
    };

    let mut values = SourceValues::new();
    for spec in &schema.fields {
        let value = match object.get(&spec.name) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(String::from(if *b { "yes" } else { "no" })),
            _ => None,
        };
        values.insert(spec.name.clone(), value);
    }
    for key in object.keys().filter(|k| !schema.contains(k)) {
        debug!(field = %key, "model returned a field outside the schema");
    }
    Ok(values)
}

/// Strips a surrounding Markdown code fence
pub fn strip_code_fences(reply: &str) -> &str {
    reply
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}

impl DomainPort for ModelExtractor {}

#[async_trait]
impl DocumentExtractor for ModelExtractor {
    fn name(&self) -> &str {
        "model"
    }

    #[instrument(skip(self, text, schema), fields(model = %self.settings().model, claim_type = %schema.claim_type))]
    async fn extract(&self, text: &str, schema: &ClaimSchema) -> Result<Extraction, PortError> {
        let call = ChatCall {
            system: SYSTEM_PROMPT,
            user: build_prompt(text, schema, self.settings().max_document_chars),
            temperature: 0.0,
            json: true,
        };
        let reply = self.client.complete(&call).await?;
        let values = parse_reply(&reply, schema)?;
        let extraction = Extraction::new(self.name(), values);
        debug!(known = extraction.known_count(), "model extraction complete");
        Ok(extraction)
    }
}
