//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Quiz generation is spawned in the background; clients poll `GET /quiz/:id`.

use std::sync::Arc;
use axum::{extract::{Path, State}, http::StatusCode, Json, response::IntoResponse};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::Topic;
use crate::errors::ApiError;
use crate::logic;
use crate::protocol::*;
use crate::session::Ticket;
use crate::state::AppState;

fn spawn_generation(state: &Arc<AppState>, ticket: Ticket) {
  let state = state.clone();
  tokio::spawn(async move {
    state.run_generation(ticket).await;
  });
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info")]
pub async fn http_get_topics() -> impl IntoResponse {
  Json(Topic::ALL.into_iter().map(TopicOut::from).collect::<Vec<_>>())
}

#[instrument(level = "info", skip(state, body), fields(grade = ?body.grade))]
pub async fn http_post_profile(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ProfileIn>,
) -> Result<Json<ProfileOut>, ApiError> {
  logic::register_learner(&state, &body).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_profile(
  State(state): State<Arc<AppState>>,
  Path(learner_id): Path<Uuid>,
) -> Result<Json<ProfileOut>, ApiError> {
  logic::get_profile(&state, learner_id).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_word_problem(
  State(state): State<Arc<AppState>>,
  Path(learner_id): Path<Uuid>,
) -> Result<Json<WordProblemOut>, ApiError> {
  let problem = logic::new_word_problem(&state, learner_id).await?;
  info!(target: "quiz", %learner_id, "HTTP word problem served");
  Ok(Json(WordProblemOut { problem }))
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.answer.len()))]
pub async fn http_post_word_problem_check(
  State(state): State<Arc<AppState>>,
  Path(learner_id): Path<Uuid>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<WordProblemFeedbackOut>, ApiError> {
  logic::check_word_problem(&state, learner_id, &body.answer).await.map(Json)
}

#[instrument(level = "info", skip(state, body), fields(learner_id = %body.learner_id, topic = ?body.topic, quiz_set = body.quiz_set))]
pub async fn http_post_quiz(
  State(state): State<Arc<AppState>>,
  Json(body): Json<StartQuizIn>,
) -> Result<Json<QuizOut>, ApiError> {
  let (quiz, ticket) = logic::start_quiz(&state, body.learner_id, body.topic, body.quiz_set).await?;
  spawn_generation(&state, ticket);
  Ok(Json(quiz))
}

#[instrument(level = "debug", skip(state))]
pub async fn http_get_quiz(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<Uuid>,
) -> Result<Json<QuizOut>, ApiError> {
  logic::quiz_view(&state, quiz_id).await.map(Json)
}

#[instrument(level = "info", skip(state, body), fields(answer_len = body.answer.len()))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<Uuid>,
  Json(body): Json<AnswerIn>,
) -> Result<Json<QuizOut>, ApiError> {
  logic::set_answer(&state, quiz_id, &body.answer).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_advance(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<Uuid>,
) -> Result<Json<AdvanceOut>, ApiError> {
  logic::advance(&state, quiz_id).await.map(Json)
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_restart(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<Uuid>,
) -> Result<Json<QuizOut>, ApiError> {
  let (quiz, ticket) = logic::restart_quiz(&state, quiz_id).await?;
  spawn_generation(&state, ticket);
  Ok(Json(quiz))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_quiz(
  State(state): State<Arc<AppState>>,
  Path(quiz_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  logic::exit_quiz(&state, quiz_id).await?;
  Ok(StatusCode::NO_CONTENT)
}
