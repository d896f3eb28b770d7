//! Loading generation configuration (prompt templates + tuning) from TOML.
//!
//! Every key is optional; missing keys keep their defaults. Example:
//!
//! ```toml
//! [prompts]
//! system = "You write maths content for young learners. Reply with JSON only."
//!
//! [generation]
//! quiz_temperature = 0.5
//!
//! [sessions]
//! idle_timeout_secs = 900
//! ```

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationTuning,
  #[serde(default)]
  pub sessions: SessionTuning,
}

impl AppConfig {
  pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(s)
  }
}

/// Prompt templates used by the content client.
///
/// Placeholders:
/// - word problem: `{grade}`, `{grade_rules}`
/// - quiz: `{grade}`, `{topic}`, `{quiz_set}`, `{quiz_set_count}`, `{question_count}`, `{curriculum}`
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  pub system: String,
  pub word_problem_template: String,
  pub quiz_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      system: "You are a friendly maths teacher who writes content for young learners in South Africa. Respond ONLY with JSON that matches the requested schema.".into(),
      word_problem_template: "Generate a simple, one-step math word problem for a Grade {grade} student in South Africa. {grade_rules} The context should be relatable to a South African child (e.g., mention local animals like springboks, places, or currency like Rand). The problem must be solvable with a single numerical answer.".into(),
      quiz_template: "Generate a quiz with exactly {question_count} questions for a Grade {grade} student in South Africa, based on the topic: \"{topic}\". This is question set number {quiz_set} out of {quiz_set_count}. Ensure the questions are unique from the other sets and do not repeat content they would contain. The questions should be a mix of multiple-choice and single-number-answer 'input' questions.\n{curriculum}\nFor each question, provide a 'type' field ('multiple-choice' or 'input').\n- For 'multiple-choice', provide 4 'options' and a 'correctAnswer' that matches one of the options exactly.\n- For 'input', provide a 'correctAnswer' which is a whole number formatted as a string. Do not include 'options'.".into(),
    }
  }
}

/// Sampling temperatures per request kind.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationTuning {
  pub word_problem_temperature: f32,
  pub quiz_temperature: f32,
}

impl Default for GenerationTuning {
  fn default() -> Self {
    Self { word_problem_temperature: 0.9, quiz_temperature: 0.7 }
  }
}

/// Eviction of abandoned quiz sessions.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(default)]
pub struct SessionTuning {
  /// Any session untouched for this long is dropped.
  pub idle_timeout_secs: u64,
  /// Finished or errored sessions are dropped sooner.
  pub settled_timeout_secs: u64,
  pub sweep_interval_secs: u64,
}

impl Default for SessionTuning {
  fn default() -> Self {
    Self { idle_timeout_secs: 1800, settled_timeout_secs: 300, sweep_interval_secs: 60 }
  }
}

impl SessionTuning {
  pub fn idle_timeout(&self) -> Duration { Duration::from_secs(self.idle_timeout_secs) }

  pub fn settled_timeout(&self) -> Duration { Duration::from_secs(self.settled_timeout_secs) }

  /// Never zero; `tokio::time::interval` panics on a zero period.
  pub fn sweep_interval(&self) -> Duration { Duration::from_secs(self.sweep_interval_secs.max(1)) }
}

/// Attempt to load `AppConfig` from MATHQUEST_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_app_config_from_env() -> Option<AppConfig> {
  let path = std::env::var("MATHQUEST_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match AppConfig::from_toml_str(&s) {
      Ok(cfg) => {
        info!(target: "mathquest", %path, "Loaded generation config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "mathquest", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mathquest", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
