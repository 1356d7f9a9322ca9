// importer/src/model_adapters.rs
//!
//! Model Adapters: one interface over the AI providers used for PDF extraction
//!
//! - `ModelAdapter`: common interface, one blocking call per prompt
//! - `OpenAICompatibleAdapter`, `GoogleAdapter`, `AnthropicAdapter`: provider wire formats
//! - `ModelDispatcher`: routes a catalog model to the adapter for its provider
//!
//! Every adapter asks the provider for JSON output and never retries.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::model_catalog::{ModelCatalog, ModelDef};
use crate::question_import::extractors::ExtractionError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

const OPENAI_API_BASE: &str = "https://api.openai.com/v1";
const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";

/// Token usage statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

#[derive(Debug, Clone)]
pub struct LlmGeneration {
    pub response: String,
    pub usage: TokenUsage,
}

/// A prompt split into the system instruction and the user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptRequest {
    pub system: String,
    pub user: String,
    pub max_output_tokens: u32,
}

impl PromptRequest {
    pub fn full_text(&self) -> String {
        format!("{}\n\n{}", self.system, self.user)
    }
}

/// Common interface for all providers
pub trait ModelAdapter: Send + Sync {
    fn generate(
        &self,
        model: &ModelDef,
        api_key: Option<&str>,
        prompt: &PromptRequest,
    ) -> Result<LlmGeneration, ExtractionError>;

    fn can_handle(&self, model: &ModelDef) -> bool;

    fn provider_name(&self) -> &'static str;
}

fn build_agent(timeout_secs: u64) -> ureq::Agent {
    ureq::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
}

fn require_key<'a>(
    api_key: Option<&'a str>,
    model: &ModelDef,
    provider: &str,
) -> Result<&'a str, ExtractionError> {
    api_key.ok_or_else(|| ExtractionError::MissingCredential {
        provider: provider.to_string(),
        model_id: model.id.clone(),
    })
}

fn output_tokens(model: &ModelDef, prompt: &PromptRequest) -> u32 {
    model
        .max_output_tokens
        .map_or(prompt.max_output_tokens, |limit| limit.min(prompt.max_output_tokens))
}

fn is_timeout(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(err) = current {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
            ) {
                return true;
            }
        }
        if err.to_string().to_lowercase().contains("timed out") {
            return true;
        }
        current = err.source();
    }
    false
}

/// Sends the payload and decodes the JSON body, mapping transport and HTTP failures.
fn send_json(
    provider: &str,
    request: ureq::Request,
    payload: &Value,
    timeout_secs: u64,
) -> Result<Value, ExtractionError> {
    let response = match request.send_json(payload) {
        Ok(resp) => resp,
        Err(ureq::Error::Status(code, resp)) => {
            let error_body: Result<Value, _> = resp.into_json();
            let error_msg = match error_body {
                Ok(json) => json["error"]["message"]
                    .as_str()
                    .unwrap_or("Unknown API error")
                    .to_string(),
                Err(_) => format!("HTTP {} error", code),
            };
            return Err(ExtractionError::Provider(format!(
                "{} API error (HTTP {}): {}",
                provider, code, error_msg
            )));
        }
        Err(ureq::Error::Transport(transport)) => {
            if is_timeout(&transport) {
                return Err(ExtractionError::Timeout(timeout_secs));
            }
            return Err(ExtractionError::Provider(format!(
                "Failed to connect to {} API: {}",
                provider, transport
            )));
        }
    };

    response.into_json::<Value>().map_err(|err| {
        if is_timeout(&err) {
            ExtractionError::Timeout(timeout_secs)
        } else {
            ExtractionError::MalformedResponse(format!("{provider} response body: {err}"))
        }
    })
}

fn usage_from(json: &Value, prompt_field: &str, completion_field: &str) -> TokenUsage {
    TokenUsage {
        prompt_tokens: json[prompt_field].as_u64().unwrap_or(0),
        completion_tokens: json[completion_field].as_u64().unwrap_or(0),
    }
}

// ============================================================================
// OpenAI-Compatible Adapter
// ============================================================================

pub struct OpenAICompatibleAdapter {
    api_base: String,
    timeout_secs: u64,
    agent: ureq::Agent,
}

impl OpenAICompatibleAdapter {
    pub fn new(api_base: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout_secs,
            agent: build_agent(timeout_secs),
        }
    }

    pub fn new_openai(timeout_secs: u64) -> Self {
        Self::new(OPENAI_API_BASE, timeout_secs)
    }

    fn payload(model: &ModelDef, prompt: &PromptRequest) -> Value {
        json!({
            "model": model.api_name(),
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user }
            ],
            "max_tokens": output_tokens(model, prompt),
            "temperature": 0.1,
            "response_format": { "type": "json_object" }
        })
    }

    fn response_text(json: &Value) -> Option<String> {
        json["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
    }
}

impl ModelAdapter for OpenAICompatibleAdapter {
    fn generate(
        &self,
        model: &ModelDef,
        api_key: Option<&str>,
        prompt: &PromptRequest,
    ) -> Result<LlmGeneration, ExtractionError> {
        let api_key = require_key(api_key, model, self.provider_name())?;
        let url = format!("{}/chat/completions", self.api_base);
        debug!(model = model.api_name(), %url, "sending chat completion request");

        let request = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", api_key))
            .set("Content-Type", "application/json");
        let json = send_json(
            self.provider_name(),
            request,
            &Self::payload(model, prompt),
            self.timeout_secs,
        )?;

        let response = Self::response_text(&json).ok_or_else(|| {
            ExtractionError::MalformedResponse("No content in OpenAI response".to_string())
        })?;
        Ok(LlmGeneration {
            response,
            usage: usage_from(&json["usage"], "prompt_tokens", "completion_tokens"),
        })
    }

    fn can_handle(&self, model: &ModelDef) -> bool {
        model.provider == "openai"
    }

    fn provider_name(&self) -> &'static str {
        "OpenAI"
    }
}

// ============================================================================
// Google Gemini Adapter
// ============================================================================

pub struct GoogleAdapter {
    api_base: String,
    timeout_secs: u64,
    agent: ureq::Agent,
}

impl GoogleAdapter {
    pub fn new(api_base: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout_secs,
            agent: build_agent(timeout_secs),
        }
    }

    fn payload(model: &ModelDef, prompt: &PromptRequest) -> Value {
        json!({
            "systemInstruction": { "parts": [{ "text": prompt.system }] },
            "contents": [{ "role": "user", "parts": [{ "text": prompt.user }] }],
            "generationConfig": {
                "maxOutputTokens": output_tokens(model, prompt),
                "temperature": 0.1,
                "responseMimeType": "application/json"
            }
        })
    }

    fn response_text(json: &Value) -> Option<String> {
        let parts = json["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        (!text.is_empty()).then_some(text)
    }
}

impl ModelAdapter for GoogleAdapter {
    fn generate(
        &self,
        model: &ModelDef,
        api_key: Option<&str>,
        prompt: &PromptRequest,
    ) -> Result<LlmGeneration, ExtractionError> {
        let api_key = require_key(api_key, model, self.provider_name())?;
        let url = format!("{}/models/{}:generateContent", self.api_base, model.api_name());
        debug!(model = model.api_name(), "sending gemini request");

        let request = self
            .agent
            .post(&url)
            .set("x-goog-api-key", api_key)
            .set("Content-Type", "application/json");
        let json = send_json(
            self.provider_name(),
            request,
            &Self::payload(model, prompt),
            self.timeout_secs,
        )?;

        let response = Self::response_text(&json).ok_or_else(|| {
            ExtractionError::MalformedResponse("No text in Gemini response".to_string())
        })?;
        Ok(LlmGeneration {
            response,
            usage: usage_from(
                &json["usageMetadata"],
                "promptTokenCount",
                "candidatesTokenCount",
            ),
        })
    }

    fn can_handle(&self, model: &ModelDef) -> bool {
        model.provider == "google"
    }

    fn provider_name(&self) -> &'static str {
        "Google Gemini"
    }
}

// ============================================================================
// Anthropic Adapter
// ============================================================================

pub struct AnthropicAdapter {
    api_base: String,
    timeout_secs: u64,
    agent: ureq::Agent,
}

impl AnthropicAdapter {
    pub fn new(api_base: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            timeout_secs,
            agent: build_agent(timeout_secs),
        }
    }

    fn payload(model: &ModelDef, prompt: &PromptRequest) -> Value {
        json!({
            "model": model.api_name(),
            "system": prompt.system,
            "max_tokens": output_tokens(model, prompt),
            "temperature": 0.1,
            "messages": [{ "role": "user", "content": prompt.user }]
        })
    }

    fn response_text(json: &Value) -> Option<String> {
        let blocks = json["content"].as_array()?;
        let text: String = blocks
            .iter()
            .filter(|b| b["type"] == "text")
            .filter_map(|b| b["text"].as_str())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

impl ModelAdapter for AnthropicAdapter {
    fn generate(
        &self,
        model: &ModelDef,
        api_key: Option<&str>,
        prompt: &PromptRequest,
    ) -> Result<LlmGeneration, ExtractionError> {
        let api_key = require_key(api_key, model, self.provider_name())?;
        let url = format!("{}/messages", self.api_base);
        debug!(model = model.api_name(), "sending anthropic request");

        let request = self
            .agent
            .post(&url)
            .set("x-api-key", api_key)
            .set("anthropic-version", "2023-06-01")
            .set("content-type", "application/json");
        let json = send_json(
            self.provider_name(),
            request,
            &Self::payload(model, prompt),
            self.timeout_secs,
        )?;

        let response = Self::response_text(&json).ok_or_else(|| {
            ExtractionError::MalformedResponse("No text in Anthropic response".to_string())
        })?;
        Ok(LlmGeneration {
            response,
            usage: usage_from(&json["usage"], "input_tokens", "output_tokens"),
        })
    }

    fn can_handle(&self, model: &ModelDef) -> bool {
        model.provider == "anthropic"
    }

    fn provider_name(&self) -> &'static str {
        "Anthropic"
    }
}

// ============================================================================
// Model Dispatcher
// ============================================================================

pub struct ModelDispatcher {
    adapters: Vec<Box<dyn ModelAdapter>>,
}

impl ModelDispatcher {
    /// Adapters for every supported provider, honouring `api_base_url` overrides in
    /// the catalog's provider table.
    pub fn new(catalog: &ModelCatalog, timeout_secs: u64) -> Self {
        let base = |provider: &str, default: &str| {
            catalog.api_base_url(provider).unwrap_or(default).to_string()
        };
        let adapters: Vec<Box<dyn ModelAdapter>> = vec![
            Box::new(GoogleAdapter::new(base("google", GOOGLE_API_BASE), timeout_secs)),
            Box::new(OpenAICompatibleAdapter::new(
                base("openai", OPENAI_API_BASE),
                timeout_secs,
            )),
            Box::new(AnthropicAdapter::new(
                base("anthropic", ANTHROPIC_API_BASE),
                timeout_secs,
            )),
        ];
        Self { adapters }
    }

    pub fn with_adapters(adapters: Vec<Box<dyn ModelAdapter>>) -> Self {
        Self { adapters }
    }

    fn adapter_for(&self, model: &ModelDef) -> Option<&dyn ModelAdapter> {
        self.adapters
            .iter()
            .find(|adapter| adapter.can_handle(model))
            .map(|adapter| adapter.as_ref())
    }
}

impl ModelAdapter for ModelDispatcher {
    fn generate(
        &self,
        model: &ModelDef,
        api_key: Option<&str>,
        prompt: &PromptRequest,
    ) -> Result<LlmGeneration, ExtractionError> {
        let adapter = self.adapter_for(model).ok_or_else(|| {
            ExtractionError::Provider(format!(
                "No adapter found for provider '{}' of model '{}'",
                model.provider, model.id
            ))
        })?;
        adapter.generate(model, api_key, prompt)
    }

    fn can_handle(&self, model: &ModelDef) -> bool {
        self.adapter_for(model).is_some()
    }

    fn provider_name(&self) -> &'static str {
        "dispatcher"
    }
}
