//! Domain models: grades, quiz sets, topics, learner profile, word problems and quiz questions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::parse_int;

/// Number of distinct quiz sets offered per topic.
pub const QUIZ_SET_COUNT: u8 = 3;

/// Number of questions every generated quiz must contain.
pub const QUESTIONS_PER_QUIZ: usize = 10;

/// School grade of the learner. Only grades with curriculum guidance are accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Grade {
  Two,
  Three,
}

impl Grade {
  pub fn number(self) -> u8 {
    match self {
      Grade::Two => 2,
      Grade::Three => 3,
    }
  }
}

impl Default for Grade {
  fn default() -> Self { Grade::Two }
}

impl TryFrom<u8> for Grade {
  type Error = String;

  fn try_from(n: u8) -> Result<Self, Self::Error> {
    match n {
      2 => Ok(Grade::Two),
      3 => Ok(Grade::Three),
      other => Err(format!("unsupported grade {other} (expected 2 or 3)")),
    }
  }
}

impl From<Grade> for u8 {
  fn from(g: Grade) -> u8 { g.number() }
}

impl fmt::Display for Grade {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.number())
  }
}

/// 1-based index of a quiz set within a topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct QuizSet(u8);

impl QuizSet {
  pub fn index(self) -> u8 { self.0 }

  pub fn all() -> impl Iterator<Item = QuizSet> {
    (1..=QUIZ_SET_COUNT).map(QuizSet)
  }
}

impl TryFrom<u8> for QuizSet {
  type Error = String;

  fn try_from(n: u8) -> Result<Self, Self::Error> {
    if (1..=QUIZ_SET_COUNT).contains(&n) {
      Ok(QuizSet(n))
    } else {
      Err(format!("quiz set {n} out of range (expected 1..={QUIZ_SET_COUNT})"))
    }
  }
}

impl From<QuizSet> for u8 {
  fn from(s: QuizSet) -> u8 { s.0 }
}

impl fmt::Display for QuizSet {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

/// The five curriculum subjects. Closed set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
  Numbers,
  Patterns,
  Geometry,
  Measurement,
  DataHandling,
}

impl Topic {
  pub const ALL: [Topic; 5] = [
    Topic::Numbers,
    Topic::Patterns,
    Topic::Geometry,
    Topic::Measurement,
    Topic::DataHandling,
  ];

  /// Canonical display title, also used verbatim in prompts and error messages.
  pub fn title(self) -> &'static str {
    match self {
      Topic::Numbers => "Numbers, Operations & Relationships",
      Topic::Patterns => "Patterns, Functions & Algebra",
      Topic::Geometry => "Space & Shape (Geometry)",
      Topic::Measurement => "Measurement",
      Topic::DataHandling => "Data Handling",
    }
  }

  /// Dashboard card colour.
  pub fn color(self) -> &'static str {
    match self {
      Topic::Numbers => "blue",
      Topic::Patterns => "green",
      Topic::Geometry => "yellow",
      Topic::Measurement => "red",
      Topic::DataHandling => "purple",
    }
  }

  /// Only the Numbers section offers the word-problem challenge.
  pub fn has_word_problems(self) -> bool {
    matches!(self, Topic::Numbers)
  }
}

impl fmt::Display for Topic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.title())
  }
}

/// Learner profile. Built once from user input and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Profile {
  name: String,
  grade: Grade,
}

impl Profile {
  /// Trims the name; an empty name is rejected.
  pub fn new(name: &str, grade: Grade) -> Result<Self, String> {
    let name = name.trim();
    if name.is_empty() {
      return Err("name must not be empty".into());
    }
    Ok(Self { name: name.to_string(), grade })
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn grade(&self) -> Grade { self.grade }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordProblem {
  pub problem: String,
  pub answer: i64,
}

impl WordProblem {
  pub fn is_correct(&self, answer: &str) -> bool {
    parse_int(answer) == Some(self.answer)
  }
}

/// A validated quiz question. Multiple-choice answers compare as exact strings,
/// input answers compare as integers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum QuizQuestion {
  MultipleChoice {
    question: String,
    options: Vec<String>,
    correct_answer: String,
  },
  Input {
    question: String,
    correct_answer: i64,
  },
}

impl QuizQuestion {
  pub fn is_correct(&self, answer: &str) -> bool {
    match self {
      QuizQuestion::MultipleChoice { correct_answer, .. } => answer == correct_answer,
      QuizQuestion::Input { correct_answer, .. } => parse_int(answer) == Some(*correct_answer),
    }
  }
}
