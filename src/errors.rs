//! Error hierarchy.
//!
//! Internal causes (`ModelError`, `GenerationError`) are logged but never shown to the
//! learner; quiz generation collapses every cause into `QuizGenerationFailed`.

use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use thiserror::Error;

use crate::protocol::ErrorOut;

#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("OPENAI_API_KEY is not set; refusing to start without a model credential")]
  MissingApiKey,

  #[error("invalid value for {name}: {value}")]
  InvalidEnv { name: &'static str, value: String },

  #[error("failed to build HTTP client: {0}")]
  HttpClient(#[from] reqwest::Error),
}

/// Failure talking to the external generative model.
#[derive(Error, Debug)]
pub enum ModelError {
  #[error("model transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("model HTTP {status}: {message}")]
  Http { status: u16, message: String },

  #[error("model returned no content")]
  EmptyResponse,
}

/// Why a generated payload was rejected.
#[derive(Error, Debug)]
pub enum GenerationError {
  #[error(transparent)]
  Model(#[from] ModelError),

  #[error("response is not valid JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("malformed response: {0}")]
  MalformedResponse(String),

  #[error("invalid question format at #{index}: {reason}")]
  InvalidQuestionFormat { index: usize, reason: String },

  #[error("unknown question type at #{index}: {found}")]
  UnknownQuestionType { index: usize, found: String },

  #[error("model returned {found} questions instead of {expected}")]
  WrongQuestionCount { expected: usize, found: usize },
}

/// The only quiz-generation failure callers ever see.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Oops! I couldn't create a quiz for {topic}. Please try again in a moment.")]
pub struct QuizGenerationFailed {
  pub topic: String,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
  #[error("cannot {action} while the quiz is {status}")]
  InvalidAction { action: &'static str, status: &'static str },

  #[error("no answer selected yet")]
  NoPendingAnswer,

  #[error("generation result does not belong to the current attempt")]
  StaleGeneration,
}

/// Errors surfaced by HTTP handlers.
#[derive(Error, Debug)]
pub enum ApiError {
  #[error("{0}")]
  BadRequest(String),

  #[error("{0} not found")]
  NotFound(&'static str),

  #[error(transparent)]
  Session(#[from] SessionError),
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match self {
      ApiError::BadRequest(_) | ApiError::Session(SessionError::NoPendingAnswer) => StatusCode::BAD_REQUEST,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::Session(_) => StatusCode::CONFLICT,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    (self.status(), Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn quiz_failure_message_names_the_topic() {
    let e = QuizGenerationFailed { topic: "Measurement".into() };
    assert_eq!(e.to_string(), "Oops! I couldn't create a quiz for Measurement. Please try again in a moment.");
  }

  #[test]
  fn api_errors_map_to_statuses() {
    assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
    assert_eq!(ApiError::NotFound("quiz").status(), StatusCode::NOT_FOUND);
    assert_eq!(ApiError::from(SessionError::NoPendingAnswer).status(), StatusCode::BAD_REQUEST);
    let conflict = ApiError::from(SessionError::InvalidAction { action: "restart", status: "loading" });
    assert_eq!(conflict.status(), StatusCode::CONFLICT);
    assert_eq!(conflict.to_string(), "cannot restart while the quiz is loading");
  }
}
