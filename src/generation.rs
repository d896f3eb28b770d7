//! Content generation: prompt building, structured-output schemas and validation.
//!
//! Two failure policies live side by side here and are kept apart on purpose:
//!   - word problems never fail; any error yields the built-in fallback problem
//!   - quizzes never fall back; any error becomes `QuizGenerationFailed` naming the topic
//!
//! The model reply is parsed into an untyped `serde_json::Value` first and then
//! converted into `QuizQuestion`s by hand. The response schema is a hint to the
//! model, not a guarantee.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info, instrument, warn};

use crate::config::{GenerationTuning, Prompts};
use crate::curriculum::{curriculum_guidance, word_problem_rules};
use crate::domain::{Grade, QuizQuestion, QuizSet, Topic, WordProblem, QUESTIONS_PER_QUIZ, QUIZ_SET_COUNT};
use crate::errors::{GenerationError, ModelError, QuizGenerationFailed};
use crate::seeds::fallback_word_problem;
use crate::util::{fill_template, parse_int, trunc_for_log};

const MULTIPLE_CHOICE: &str = "multiple-choice";
const INPUT: &str = "input";

/// One outbound call to the generative model.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
  /// Schema name, also used as a log field.
  pub name: &'static str,
  pub system: String,
  pub prompt: String,
  /// JSON Schema the reply is constrained to.
  pub schema: Value,
  pub temperature: f32,
}

/// External generative model. Returns the raw JSON text of the reply.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
  async fn generate_json(&self, request: &GenerationRequest) -> Result<String, ModelError>;

  fn model_name(&self) -> &str;
}

#[derive(Clone)]
pub struct ContentClient {
  model: Arc<dyn GenerativeModel>,
  prompts: Prompts,
  tuning: GenerationTuning,
}

impl ContentClient {
  pub fn new(model: Arc<dyn GenerativeModel>, prompts: Prompts, tuning: GenerationTuning) -> Self {
    Self { model, prompts, tuning }
  }

  pub fn model_name(&self) -> &str {
    self.model.model_name()
  }

  pub fn word_problem_request(&self, grade: Grade) -> GenerationRequest {
    let grade_s = grade.to_string();
    let prompt = fill_template(
      &self.prompts.word_problem_template,
      &[("grade", &grade_s), ("grade_rules", word_problem_rules(grade))],
    );
    GenerationRequest {
      name: "word_problem",
      system: self.prompts.system.clone(),
      prompt,
      schema: word_problem_schema(),
      temperature: self.tuning.word_problem_temperature,
    }
  }

  pub fn quiz_request(&self, topic: Topic, set: QuizSet, grade: Grade) -> GenerationRequest {
    let grade_s = grade.to_string();
    let set_s = set.to_string();
    let set_count = QUIZ_SET_COUNT.to_string();
    let question_count = QUESTIONS_PER_QUIZ.to_string();
    let curriculum = curriculum_guidance(topic, set, grade);
    // Grade 2 has no rubric; drop the placeholder's own line instead of leaving it blank.
    let template = if curriculum.is_empty() {
      self.prompts.quiz_template.replace("{curriculum}\n", "")
    } else {
      self.prompts.quiz_template.clone()
    };
    let prompt = fill_template(
      &template,
      &[
        ("grade", &grade_s),
        ("topic", topic.title()),
        ("quiz_set", &set_s),
        ("quiz_set_count", &set_count),
        ("question_count", &question_count),
        ("curriculum", &curriculum),
      ],
    );
    GenerationRequest {
      name: "quiz_questions",
      system: self.prompts.system.clone(),
      prompt,
      schema: quiz_schema(),
      temperature: self.tuning.quiz_temperature,
    }
  }

  /// Never fails: on any error the fallback problem is returned.
  #[instrument(level = "info", skip(self), fields(%grade, model = %self.model.model_name()))]
  pub async fn fetch_word_problem(&self, grade: Grade) -> WordProblem {
    let request = self.word_problem_request(grade);
    let start = Instant::now();
    match self.try_generate(&request).await.and_then(|text| parse_word_problem(&text)) {
      Ok(wp) => {
        info!(target: "generation", elapsed = ?start.elapsed(), answer = wp.answer, "Word problem generated");
        wp
      }
      Err(e) => {
        warn!(target: "generation", elapsed = ?start.elapsed(), error = %e, "Word problem generation failed; serving fallback");
        fallback_word_problem()
      }
    }
  }

  /// Exactly ten validated questions, or `QuizGenerationFailed` naming the topic.
  #[instrument(level = "info", skip(self), fields(%topic, %set, %grade, model = %self.model.model_name()))]
  pub async fn fetch_quiz_questions(
    &self,
    topic: Topic,
    set: QuizSet,
    grade: Grade,
  ) -> Result<Vec<QuizQuestion>, QuizGenerationFailed> {
    let request = self.quiz_request(topic, set, grade);
    let start = Instant::now();
    match self.try_generate(&request).await.and_then(|text| parse_quiz_questions(&text)) {
      Ok(questions) => {
        info!(target: "generation", elapsed = ?start.elapsed(), count = questions.len(), "Quiz questions generated");
        Ok(questions)
      }
      Err(e) => {
        error!(target: "generation", elapsed = ?start.elapsed(), error = %e, "Quiz generation failed");
        Err(QuizGenerationFailed { topic: topic.title().to_string() })
      }
    }
  }

  async fn try_generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
    let text = self.model.generate_json(request).await?;
    debug!(target: "generation", name = request.name, body = %trunc_for_log(&text, 400), "Model reply");
    Ok(text)
  }
}

pub fn word_problem_schema() -> Value {
  json!({
    "type": "object",
    "properties": {
      "problem": { "type": "string", "description": "The text of the word problem." },
      "answer": { "type": "integer", "description": "The numerical solution to the problem." }
    },
    "required": ["problem", "answer"]
  })
}

pub fn quiz_schema() -> Value {
  json!({
    "type": "object",
    "properties": {
      "questions": {
        "type": "array",
        "description": format!("An array of {QUESTIONS_PER_QUIZ} quiz questions."),
        "minItems": QUESTIONS_PER_QUIZ,
        "maxItems": QUESTIONS_PER_QUIZ,
        "items": {
          "type": "object",
          "properties": {
            "question": { "type": "string", "description": "The question text." },
            "type": { "type": "string", "enum": [MULTIPLE_CHOICE, INPUT], "description": "The type of question." },
            "options": {
              "type": "array",
              "description": "An array of 4 possible answers. Only for 'multiple-choice' type.",
              "items": { "type": "string" }
            },
            "correctAnswer": {
              "type": "string",
              "description": "The correct answer. For 'multiple-choice' it's one of the options. For 'input' it's a number as a string."
            }
          },
          "required": ["question", "type", "correctAnswer"]
        }
      }
    },
    "required": ["questions"]
  })
}

/// `{ problem: string, answer: integer }` or `MalformedResponse`.
pub fn parse_word_problem(text: &str) -> Result<WordProblem, GenerationError> {
  let value: Value = serde_json::from_str(text.trim())?;
  let problem = value.get("problem").and_then(Value::as_str).map(str::trim).unwrap_or_default();
  let answer = value.get("answer").and_then(Value::as_i64);
  match answer {
    Some(answer) if !problem.is_empty() => Ok(WordProblem { problem: problem.to_string(), answer }),
    _ => Err(GenerationError::MalformedResponse("word problem needs a text `problem` and an integer `answer`".into())),
  }
}

/// Parses and validates a quiz batch. Accepts `{ "questions": [...] }` or a bare array.
/// Items are checked in order and the first bad one fails the whole batch.
pub fn parse_quiz_questions(text: &str) -> Result<Vec<QuizQuestion>, GenerationError> {
  let value: Value = serde_json::from_str(text.trim())?;
  let raw = match &value {
    Value::Array(items) => items.as_slice(),
    Value::Object(map) => match map.get("questions") {
      Some(Value::Array(items)) => items.as_slice(),
      Some(_) => return Err(GenerationError::MalformedResponse("`questions` is not an array".into())),
      None => &[],
    },
    _ => return Err(GenerationError::MalformedResponse("expected an object or an array".into())),
  };

  let questions = raw
    .iter()
    .enumerate()
    .map(|(index, item)| validate_question(index, item))
    .collect::<Result<Vec<_>, _>>()?;

  if questions.len() != QUESTIONS_PER_QUIZ {
    return Err(GenerationError::WrongQuestionCount { expected: QUESTIONS_PER_QUIZ, found: questions.len() });
  }
  Ok(questions)
}

fn validate_question(index: usize, item: &Value) -> Result<QuizQuestion, GenerationError> {
  let invalid = |reason: &str| GenerationError::InvalidQuestionFormat { index, reason: reason.to_string() };

  let question = item.get("question").and_then(Value::as_str).unwrap_or_default();
  match item.get("type").and_then(Value::as_str) {
    Some(MULTIPLE_CHOICE) => {
      if question.is_empty() {
        return Err(invalid("missing question text"));
      }
      let options = item
        .get("options")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("missing options"))?
        .iter()
        .map(|o| o.as_str().map(str::to_string))
        .collect::<Option<Vec<String>>>()
        .ok_or_else(|| invalid("options must be strings"))?;
      if options.len() < 2 {
        return Err(invalid("fewer than 2 options"));
      }
      let correct_answer = item.get("correctAnswer").and_then(Value::as_str).unwrap_or_default();
      if correct_answer.is_empty() {
        return Err(invalid("missing correctAnswer"));
      }
      if !options.iter().any(|o| o == correct_answer) {
        return Err(invalid("correctAnswer is not one of the options"));
      }
      Ok(QuizQuestion::MultipleChoice {
        question: question.to_string(),
        options,
        correct_answer: correct_answer.to_string(),
      })
    }
    Some(INPUT) => {
      if question.is_empty() {
        return Err(invalid("missing question text"));
      }
      let correct_answer = match item.get("correctAnswer") {
        Some(Value::String(s)) => parse_int(s),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
      }
      .ok_or_else(|| invalid("correctAnswer is not a whole number"))?;
      Ok(QuizQuestion::Input { question: question.to_string(), correct_answer })
    }
    Some(other) => Err(GenerationError::UnknownQuestionType { index, found: other.to_string() }),
    None => Err(GenerationError::UnknownQuestionType {
      index,
      found: item.get("type").map(Value::to_string).unwrap_or_else(|| "<missing>".into()),
    }),
  }
}
