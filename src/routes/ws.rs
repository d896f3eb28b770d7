//! WebSocket upgrade + message loop. Each client message is parsed as JSON and
//! forwarded to core logic. Most requests get a single JSON reply; `start_quiz` and
//! `restart` reply with the loading view first and push the resolved view once the
//! spawned generation lands. The loop keeps reading while a generation is in flight.
//! Quizzes a connection opened are exited when it closes.

use std::{collections::HashSet, sync::Arc};
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{info, error, instrument, debug};
use uuid::Uuid;

use crate::errors::ApiError;
use crate::logic;
use crate::protocol::{ClientWsMessage, QuizOut, ServerWsMessage};
use crate::session::Ticket;
use crate::state::AppState;

#[instrument(level = "info", skip(state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "mathquest", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "mathquest", "WebSocket connected");
  let (resolved_tx, mut resolved_rx) = mpsc::unbounded_channel::<ServerWsMessage>();
  let mut opened = HashSet::new();

  loop {
    tokio::select! {
      incoming = socket.recv() => {
        let Some(Ok(msg)) = incoming else { break };
        match msg {
          Message::Text(txt) => {
            let incoming = match serde_json::from_str::<ClientWsMessage>(&txt) {
              Ok(incoming) => incoming,
              Err(e) => {
                let reply = ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) };
                if send(&mut socket, &reply).await.is_err() { break; }
                continue;
              }
            };
            debug!(target: "mathquest", "WS received: {:?}", &incoming);

            let (reply, pending) = handle_client_ws(incoming, &state).await;
            track_quizzes(&mut opened, &reply, pending);
            if send(&mut socket, &reply).await.is_err() { break; }
            if let Some(ticket) = pending {
              spawn_generation(state.clone(), ticket, resolved_tx.clone());
            }
          }
          Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
          Message::Close(_) => break,
          _ => {}
        }
      }
      Some(resolved) = resolved_rx.recv() => {
        if send(&mut socket, &resolved).await.is_err() { break; }
      }
    }
  }

  discard_quizzes(&state, opened).await;
  info!(target: "mathquest", "WebSocket disconnected");
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await.map_err(|e| {
    error!(target: "mathquest", error = %e, "WS send error");
    e
  })
}

/// Runs generation off the receive loop. The resolved view is queued only when the
/// session took the result, so an exited or restarted attempt sends nothing.
fn spawn_generation(state: Arc<AppState>, ticket: Ticket, out: mpsc::UnboundedSender<ServerWsMessage>) -> JoinHandle<()> {
  tokio::spawn(async move {
    if !state.run_generation(ticket).await {
      return;
    }
    if let Ok(quiz) = logic::quiz_view(&state, ticket.quiz_id).await {
      if out.send(ServerWsMessage::Quiz { quiz }).is_err() {
        debug!(target: "mathquest", quiz_id = %ticket.quiz_id, "Connection closed before generation landed");
      }
    }
  })
}

/// Remembers quizzes this connection started and forgets the ones it exited.
fn track_quizzes(opened: &mut HashSet<Uuid>, reply: &ServerWsMessage, pending: Option<Ticket>) {
  if let Some(ticket) = pending {
    opened.insert(ticket.quiz_id);
  }
  if let ServerWsMessage::QuizExited { quiz_id } = reply {
    opened.remove(quiz_id);
  }
}

/// Leaving the page discards its sessions. Quizzes already evicted are skipped.
async fn discard_quizzes(state: &AppState, opened: HashSet<Uuid>) {
  for quiz_id in opened {
    if logic::exit_quiz(state, quiz_id).await.is_ok() {
      info!(target: "quiz", %quiz_id, "Quiz discarded on disconnect");
    }
  }
}

fn quiz_reply(res: Result<(QuizOut, Ticket), ApiError>) -> (ServerWsMessage, Option<Ticket>) {
  match res {
    Ok((quiz, ticket)) => (ServerWsMessage::Quiz { quiz }, Some(ticket)),
    Err(e) => (ServerWsMessage::Error { message: e.to_string() }, None),
  }
}

fn reply<T>(res: Result<T, ApiError>, ok: impl FnOnce(T) -> ServerWsMessage) -> (ServerWsMessage, Option<Ticket>) {
  match res {
    Ok(v) => (ok(v), None),
    Err(e) => (ServerWsMessage::Error { message: e.to_string() }, None),
  }
}

/// Returns the reply and, for requests that entered `Loading`, the ticket to generate for.
#[instrument(level = "info", skip(state))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState) -> (ServerWsMessage, Option<Ticket>) {
  match msg {
    ClientWsMessage::Ping => (ServerWsMessage::Pong, None),

    ClientWsMessage::StartQuiz { learner_id, topic, quiz_set } => {
      quiz_reply(logic::start_quiz(state, learner_id, topic, quiz_set).await)
    }

    ClientWsMessage::QuizState { quiz_id } => {
      reply(logic::quiz_view(state, quiz_id).await, |quiz| ServerWsMessage::Quiz { quiz })
    }

    ClientWsMessage::SetAnswer { quiz_id, answer } => {
      reply(logic::set_answer(state, quiz_id, &answer).await, |quiz| ServerWsMessage::Quiz { quiz })
    }

    ClientWsMessage::Advance { quiz_id } => {
      reply(logic::advance(state, quiz_id).await, |out| ServerWsMessage::AnswerResult { correct: out.correct, quiz: out.quiz })
    }

    ClientWsMessage::Restart { quiz_id } => quiz_reply(logic::restart_quiz(state, quiz_id).await),

    ClientWsMessage::ExitQuiz { quiz_id } => {
      reply(logic::exit_quiz(state, quiz_id).await, |_| ServerWsMessage::QuizExited { quiz_id })
    }

    ClientWsMessage::NewWordProblem { learner_id } => {
      reply(logic::new_word_problem(state, learner_id).await, |problem| ServerWsMessage::WordProblem { problem })
    }

    ClientWsMessage::CheckWordProblem { learner_id, answer } => {
      reply(logic::check_word_problem(state, learner_id, &answer).await, |fb| {
        ServerWsMessage::WordProblemFeedback { correct: fb.correct, feedback: fb.feedback }
      })
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::protocol::{ProfileIn, QuizView};
  use crate::testing::{client_with, quiz_json, GatedModel, ScriptedModel};

  async fn start(state: &AppState, topic: crate::domain::Topic) -> Ticket {
    let learner = logic::register_learner(state, &ProfileIn { name: "Kagiso".into(), grade: Some(3) }).await.unwrap();
    let msg = ClientWsMessage::StartQuiz { learner_id: learner.learner_id, topic, quiz_set: 2 };
    handle_client_ws(msg, state).await.1.expect("ticket for loading quiz")
  }

  #[tokio::test]
  async fn start_quiz_hands_back_a_ticket_and_generation_resolves_it() {
    let state = AppState::new(client_with(ScriptedModel::new(vec![Ok(quiz_json(10))])));
    let learner = logic::register_learner(&state, &ProfileIn { name: "Naledi".into(), grade: Some(2) }).await.unwrap();

    let msg = ClientWsMessage::StartQuiz { learner_id: learner.learner_id, topic: crate::domain::Topic::Measurement, quiz_set: 1 };
    let (reply, pending) = handle_client_ws(msg, &state).await;
    assert!(matches!(reply, ServerWsMessage::Quiz { quiz: QuizOut { view: QuizView::Loading, .. } }));
    let ticket = pending.expect("ticket for loading quiz");

    state.run_generation(ticket).await;
    let (reply, pending) = handle_client_ws(ClientWsMessage::QuizState { quiz_id: ticket.quiz_id }, &state).await;
    assert!(pending.is_none());
    assert!(matches!(reply, ServerWsMessage::Quiz { quiz: QuizOut { view: QuizView::Presenting { .. }, .. } }));
  }

  #[tokio::test]
  async fn exit_is_answered_while_generation_is_pending() {
    let model = GatedModel::new(quiz_json(10));
    let state = Arc::new(AppState::new(client_with(model.clone())));
    let ticket = start(&state, crate::domain::Topic::Numbers).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let generation = spawn_generation(state.clone(), ticket, tx);
    model.entered().await;

    let (reply, _) = handle_client_ws(ClientWsMessage::Ping, &state).await;
    assert!(matches!(reply, ServerWsMessage::Pong));
    let (reply, _) = handle_client_ws(ClientWsMessage::ExitQuiz { quiz_id: ticket.quiz_id }, &state).await;
    assert!(matches!(reply, ServerWsMessage::QuizExited { quiz_id } if quiz_id == ticket.quiz_id));
    assert!(!generation.is_finished());

    model.open();
    generation.await.unwrap();
    assert!(rx.try_recv().is_err());
    assert!(state.get_quiz(ticket.quiz_id).await.is_none());
  }

  #[tokio::test]
  async fn resolved_view_is_pushed_when_generation_lands() {
    let model = GatedModel::new(quiz_json(10));
    let state = Arc::new(AppState::new(client_with(model.clone())));
    let ticket = start(&state, crate::domain::Topic::DataHandling).await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    model.open();
    spawn_generation(state.clone(), ticket, tx).await.unwrap();
    match rx.try_recv() {
      Ok(ServerWsMessage::Quiz { quiz }) => {
        assert_eq!(quiz.quiz_id, ticket.quiz_id);
        assert!(matches!(quiz.view, QuizView::Presenting { number: 1, .. }));
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test]
  async fn closing_the_connection_discards_its_quizzes() {
    let state = AppState::new(client_with(ScriptedModel::new(vec![])));
    let kept = start(&state, crate::domain::Topic::Patterns).await;
    let exited = start(&state, crate::domain::Topic::Geometry).await;

    let mut opened = HashSet::new();
    track_quizzes(&mut opened, &ServerWsMessage::Pong, Some(kept));
    track_quizzes(&mut opened, &ServerWsMessage::Pong, Some(exited));
    let (reply, pending) = handle_client_ws(ClientWsMessage::ExitQuiz { quiz_id: exited.quiz_id }, &state).await;
    track_quizzes(&mut opened, &reply, pending);
    assert_eq!(opened, HashSet::from([kept.quiz_id]));

    discard_quizzes(&state, opened).await;
    assert!(state.quizzes.read().await.is_empty());
  }

  #[tokio::test]
  async fn errors_become_error_messages() {
    let state = AppState::new(client_with(ScriptedModel::new(vec![])));
    let (reply, pending) = handle_client_ws(ClientWsMessage::Advance { quiz_id: uuid::Uuid::new_v4() }, &state).await;
    assert!(pending.is_none());
    match reply {
      ServerWsMessage::Error { message } => assert_eq!(message, "quiz not found"),
      other => panic!("unexpected {other:?}"),
    }
  }
}
