//! Built-in content used when the model cannot be reached.

use crate::domain::WordProblem;

/// Absolute last-resort word problem. Returned whenever word-problem generation fails.
pub fn fallback_word_problem() -> WordProblem {
  WordProblem {
    problem: "If you have 25 sweets and you get 10 more, how many sweets do you have in total?".into(),
    answer: 35,
  }
}
