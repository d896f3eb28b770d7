//! Minimal OpenAI client for our use-case.
//!
//! We only call chat.completions with a `json_schema` response format and hand the
//! raw JSON text back to the content client, which does its own validation.
//! Calls are instrumented and log model name, latency and token usage (not contents).
//!
//! NOTE: We never log the API key.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};

use crate::errors::{ConfigError, ModelError};
use crate::generation::{GenerationRequest, GenerativeModel};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone)]
pub struct OpenAI {
  client: reqwest::Client,
  api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client from the environment. A missing OPENAI_API_KEY is fatal.
  pub fn from_env() -> Result<Self, ConfigError> {
    let api_key = std::env::var("OPENAI_API_KEY")
      .ok()
      .filter(|k| !k.trim().is_empty())
      .ok_or(ConfigError::MissingApiKey)?;
    let base_url = std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());
    let timeout_secs = match std::env::var("OPENAI_TIMEOUT_SECS") {
      Ok(v) => v
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidEnv { name: "OPENAI_TIMEOUT_SECS", value: v.clone() })?,
      Err(_) => DEFAULT_TIMEOUT_SECS,
    };

    Self::new(api_key, base_url, model, Duration::from_secs(timeout_secs))
  }

  pub fn new(api_key: String, base_url: String, model: String, timeout: Duration) -> Result<Self, ConfigError> {
    if api_key.trim().is_empty() {
      return Err(ConfigError::MissingApiKey);
    }
    let client = reqwest::Client::builder().timeout(timeout).build()?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model })
  }

  /// JSON-schema chat completion. Returns the trimmed message content.
  #[instrument(level = "info", skip(self, request), fields(model = %self.model, schema = request.name))]
  async fn chat_json_schema(&self, request: &GenerationRequest) -> Result<String, ModelError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = build_request(&self.model, request);

    let start = Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "mathquest-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status();
      let body = res.text().await.unwrap_or_default();
      let message = extract_openai_error(&body).unwrap_or(body);
      return Err(ModelError::Http { status: status.as_u16(), message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(elapsed = ?start.elapsed(), prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "OpenAI usage");
    }
    let text = body.choices.into_iter().next()
      .and_then(|c| c.message.content)
      .unwrap_or_default().trim().to_string();

    if text.is_empty() {
      return Err(ModelError::EmptyResponse);
    }
    Ok(text)
  }
}

#[async_trait]
impl GenerativeModel for OpenAI {
  async fn generate_json(&self, request: &GenerationRequest) -> Result<String, ModelError> {
    self.chat_json_schema(request).await
  }

  fn model_name(&self) -> &str {
    &self.model
  }
}

fn build_request(model: &str, request: &GenerationRequest) -> ChatCompletionRequest {
  ChatCompletionRequest {
    model: model.to_string(),
    messages: vec![
      ChatMessageReq { role: "system".into(), content: request.system.clone() },
      ChatMessageReq { role: "user".into(), content: request.prompt.clone() },
    ],
    temperature: request.temperature,
    response_format: ResponseFormat {
      r#type: "json_schema".into(),
      json_schema: JsonSchemaSpec {
        name: request.name.to_string(),
        schema: request.schema.clone(),
        strict: false,
      },
    },
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  response_format: ResponseFormat,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }
#[derive(Serialize)]
struct ResponseFormat {
  #[serde(rename = "type")] r#type: String,
  json_schema: JsonSchemaSpec,
}
#[derive(Serialize)]
struct JsonSchemaSpec { name: String, schema: Value, strict: bool }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from OpenAI error body.
fn extract_openai_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  match serde_json::from_str::<EWrap>(body) {
    Ok(w) => Some(w.error.message),
    Err(_) => None,
  }
}
