//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Learner registration (immutable profile)
//!   - Word problems: generate (never fails) and check an answer
//!   - Quiz sessions: start, answer, advance, restart, exit
//!
//! Quiz generation itself is not awaited here; `start_quiz` and `restart_quiz` return the
//! ticket and the caller decides whether to spawn `AppState::run_generation` or await it.

use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Grade, Profile, QuizSet, Topic};
use crate::errors::ApiError;
use crate::protocol::{to_out, AdvanceOut, ProfileIn, ProfileOut, QuizOut, WordProblemFeedbackOut};
use crate::session::{QuizSession, Ticket};
use crate::state::AppState;

#[instrument(level = "info", skip(state, input), fields(grade = ?input.grade))]
pub async fn register_learner(state: &AppState, input: &ProfileIn) -> Result<ProfileOut, ApiError> {
  let grade = match input.grade {
    Some(n) => Grade::try_from(n).map_err(ApiError::BadRequest)?,
    None => Grade::default(),
  };
  let profile = Profile::new(&input.name, grade).map_err(ApiError::BadRequest)?;
  let id = state.insert_learner(profile.clone()).await;
  info!(target: "mathquest", learner_id = %id, %grade, "Learner registered");
  Ok(ProfileOut::new(id, &profile))
}

pub async fn get_profile(state: &AppState, learner_id: Uuid) -> Result<ProfileOut, ApiError> {
  let learner = state.get_learner(learner_id).await.ok_or(ApiError::NotFound("learner"))?;
  Ok(ProfileOut::new(learner_id, &learner.profile))
}

/// Generates a fresh word problem for the learner's grade and makes it the current one.
#[instrument(level = "info", skip(state), fields(%learner_id))]
pub async fn new_word_problem(state: &AppState, learner_id: Uuid) -> Result<String, ApiError> {
  let learner = state.get_learner(learner_id).await.ok_or(ApiError::NotFound("learner"))?;
  let problem = state.content.fetch_word_problem(learner.profile.grade()).await;
  let text = problem.problem.clone();
  if !state.set_word_problem(learner_id, problem).await {
    return Err(ApiError::NotFound("learner"));
  }
  Ok(text)
}

#[instrument(level = "info", skip(state, answer), fields(%learner_id, answer_len = answer.len()))]
pub async fn check_word_problem(state: &AppState, learner_id: Uuid, answer: &str) -> Result<WordProblemFeedbackOut, ApiError> {
  let learner = state.get_learner(learner_id).await.ok_or(ApiError::NotFound("learner"))?;
  let problem = learner
    .word_problem
    .ok_or_else(|| ApiError::BadRequest("no word problem to check; ask for a new one first".into()))?;
  if answer.trim().is_empty() {
    return Err(ApiError::BadRequest("answer must not be empty".into()));
  }

  let correct = problem.is_correct(answer);
  let feedback = if correct {
    "Correct! Well done!".to_string()
  } else {
    format!("Not quite. The correct answer is {}. Keep trying!", problem.answer)
  };
  info!(target: "quiz", %learner_id, %correct, "Word problem checked");
  Ok(WordProblemFeedbackOut { correct, feedback })
}

/// Opens a new session in `Loading`. The returned ticket identifies its generation request.
#[instrument(level = "info", skip(state), fields(%learner_id, %topic))]
pub async fn start_quiz(state: &AppState, learner_id: Uuid, topic: Topic, quiz_set: u8) -> Result<(QuizOut, Ticket), ApiError> {
  let learner = state.get_learner(learner_id).await.ok_or(ApiError::NotFound("learner"))?;
  let set = QuizSet::try_from(quiz_set).map_err(ApiError::BadRequest)?;
  let (session, ticket) = QuizSession::start(learner_id, topic, set, learner.profile.grade());
  let out = to_out(&session);
  state.insert_quiz(session).await;
  info!(target: "quiz", quiz_id = %ticket.quiz_id, "Quiz started");
  Ok((out, ticket))
}

pub async fn quiz_view(state: &AppState, quiz_id: Uuid) -> Result<QuizOut, ApiError> {
  state.get_quiz(quiz_id).await.map(|s| to_out(&s)).ok_or(ApiError::NotFound("quiz"))
}

#[instrument(level = "debug", skip(state, answer), fields(%quiz_id, answer_len = answer.len()))]
pub async fn set_answer(state: &AppState, quiz_id: Uuid, answer: &str) -> Result<QuizOut, ApiError> {
  state
    .with_quiz(quiz_id, |s| s.set_answer(answer).map(|_| to_out(s)))
    .await
    .ok_or(ApiError::NotFound("quiz"))?
    .map_err(ApiError::from)
}

/// Scores the pending answer. Runs under the session write lock, so a double click
/// scores at most once: the second call finds no pending answer.
#[instrument(level = "info", skip(state), fields(%quiz_id))]
pub async fn advance(state: &AppState, quiz_id: Uuid) -> Result<AdvanceOut, ApiError> {
  let (scored, quiz) = state
    .with_quiz(quiz_id, |s| s.advance().map(|scored| (scored, to_out(s))))
    .await
    .ok_or(ApiError::NotFound("quiz"))??;
  info!(target: "quiz", %quiz_id, correct = scored.correct, finished = scored.finished, "Answer scored");
  Ok(AdvanceOut { correct: scored.correct, quiz })
}

#[instrument(level = "info", skip(state), fields(%quiz_id))]
pub async fn restart_quiz(state: &AppState, quiz_id: Uuid) -> Result<(QuizOut, Ticket), ApiError> {
  let (quiz, ticket) = state
    .with_quiz(quiz_id, |s| s.restart().map(|ticket| (to_out(s), ticket)))
    .await
    .ok_or(ApiError::NotFound("quiz"))??;
  info!(target: "quiz", %quiz_id, attempt = ticket.attempt, "Quiz restarted");
  Ok((quiz, ticket))
}

/// Leaves the quiz from any state and discards the session.
#[instrument(level = "info", skip(state), fields(%quiz_id))]
pub async fn exit_quiz(state: &AppState, quiz_id: Uuid) -> Result<(), ApiError> {
  let from = state
    .with_quiz(quiz_id, |s| {
      let from = s.phase().name();
      s.exit();
      from
    })
    .await
    .ok_or(ApiError::NotFound("quiz"))?;
  if state.remove_quiz(quiz_id).await.is_none() {
    warn!(target: "quiz", %quiz_id, "Quiz vanished while exiting");
  }
  info!(target: "quiz", %quiz_id, %from, "Quiz exited");
  Ok(())
}
