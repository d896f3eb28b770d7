//! Test doubles: a scripted model that replays canned replies, and a gated model
//! whose reply is held back until the test releases it.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Notify;

use crate::config::{GenerationTuning, Prompts};
use crate::errors::ModelError;
use crate::generation::{ContentClient, GenerationRequest, GenerativeModel};

/// Replies are consumed in order; once exhausted every call fails with `EmptyResponse`.
pub struct ScriptedModel {
  replies: Mutex<VecDeque<Result<String, ModelError>>>,
  requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedModel {
  pub fn new(replies: Vec<Result<String, ModelError>>) -> Arc<Self> {
    Arc::new(Self { replies: Mutex::new(replies.into()), requests: Mutex::new(Vec::new()) })
  }

  pub fn requests(&self) -> Vec<GenerationRequest> {
    self.requests.lock().unwrap().clone()
  }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
  async fn generate_json(&self, request: &GenerationRequest) -> Result<String, ModelError> {
    self.requests.lock().unwrap().push(request.clone());
    self.replies.lock().unwrap().pop_front().unwrap_or(Err(ModelError::EmptyResponse))
  }

  fn model_name(&self) -> &str {
    "scripted"
  }
}

/// Answers every request with the same reply, but only after `open`.
pub struct GatedModel {
  reply: String,
  entered: Notify,
  gate: Notify,
}

impl GatedModel {
  pub fn new(reply: String) -> Arc<Self> {
    Arc::new(Self { reply, entered: Notify::new(), gate: Notify::new() })
  }

  /// Resolves once a request is waiting at the gate.
  pub async fn entered(&self) {
    self.entered.notified().await
  }

  pub fn open(&self) {
    self.gate.notify_one();
  }
}

#[async_trait]
impl GenerativeModel for GatedModel {
  async fn generate_json(&self, _request: &GenerationRequest) -> Result<String, ModelError> {
    self.entered.notify_one();
    self.gate.notified().await;
    Ok(self.reply.clone())
  }

  fn model_name(&self) -> &str {
    "gated"
  }
}

pub fn client_with(model: Arc<impl GenerativeModel + 'static>) -> ContentClient {
  ContentClient::new(model, Prompts::default(), GenerationTuning::default())
}

/// `n` questions alternating multiple-choice (answer "12" = options[2]) and input (answer 12).
pub fn quiz_json(n: usize) -> String {
  let questions: Vec<_> = (0..n)
    .map(|i| {
      if i % 2 == 0 {
        json!({
          "question": format!("Question {}: Which number is the biggest?", i + 1),
          "type": "multiple-choice",
          "options": ["3", "8", "12", "5"],
          "correctAnswer": "12"
        })
      } else {
        json!({
          "question": format!("Question {}: 5 + 7 = ?", i + 1),
          "type": "input",
          "correctAnswer": "12"
        })
      }
    })
    .collect();
  json!({ "questions": questions }).to_string()
}
