//! Application state: learner profiles, live quiz sessions and the content client.
//!
//! This module owns:
//!   - the learner store (immutable profile + the learner's current word problem)
//!   - the quiz session store, keyed by quiz id
//!   - the content client (model + prompts)
//!
//! Locks are never held across a model call: callers read what they need, drop the
//! guard, await the model, then re-lock to apply the result.
//!
//! Sessions a learner walks away from are evicted by a periodic sweep.

use std::{collections::HashMap, sync::Arc};

use tokio::{sync::RwLock, task::JoinHandle, time::Instant};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::config::{load_app_config_from_env, AppConfig, SessionTuning};
use crate::domain::{Profile, WordProblem};
use crate::errors::{ConfigError, SessionError};
use crate::generation::ContentClient;
use crate::openai::OpenAI;
use crate::session::{Phase, QuizSession, Ticket};

#[derive(Clone, Debug)]
pub struct Learner {
    pub profile: Profile,
    /// Replaced on every new request; gone when a new one is generated.
    pub word_problem: Option<WordProblem>,
}

#[derive(Clone)]
pub struct AppState {
    pub learners: Arc<RwLock<HashMap<Uuid, Learner>>>,
    pub quizzes: Arc<RwLock<HashMap<Uuid, QuizSession>>>,
    pub content: ContentClient,
    pub sessions: SessionTuning,
}

impl AppState {
    pub fn new(content: ContentClient) -> Self {
        Self {
            learners: Arc::new(RwLock::new(HashMap::new())),
            quizzes: Arc::new(RwLock::new(HashMap::new())),
            content,
            sessions: SessionTuning::default(),
        }
    }

    /// Build state from env: load config, construct the model client (fails without a key).
    #[instrument(level = "info", skip_all)]
    pub fn from_env() -> Result<Self, ConfigError> {
        let cfg = load_app_config_from_env().unwrap_or_default();
        let AppConfig { prompts, generation, sessions } = cfg;

        let openai = OpenAI::from_env()?;
        let base_url = openai.base_url.clone();
        let content = ContentClient::new(Arc::new(openai), prompts, generation);
        info!(target: "mathquest", %base_url, model = %content.model_name(), "OpenAI enabled.");
        Ok(Self { sessions, ..Self::new(content) })
    }

    #[instrument(level = "debug", skip(self, profile), fields(name = %profile.name(), grade = %profile.grade()))]
    pub async fn insert_learner(&self, profile: Profile) -> Uuid {
        let id = Uuid::new_v4();
        self.learners.write().await.insert(id, Learner { profile, word_problem: None });
        id
    }

    pub async fn get_learner(&self, id: Uuid) -> Option<Learner> {
        self.learners.read().await.get(&id).cloned()
    }

    /// Stores the learner's current word problem. Returns false for an unknown learner.
    pub async fn set_word_problem(&self, id: Uuid, problem: WordProblem) -> bool {
        match self.learners.write().await.get_mut(&id) {
            Some(learner) => {
                learner.word_problem = Some(problem);
                true
            }
            None => false,
        }
    }

    pub async fn insert_quiz(&self, session: QuizSession) {
        self.quizzes.write().await.insert(session.id(), session);
    }

    pub async fn get_quiz(&self, id: Uuid) -> Option<QuizSession> {
        self.quizzes.read().await.get(&id).cloned()
    }

    /// Runs `f` on the session under the write lock and marks it active. `None` if the quiz is gone.
    pub async fn with_quiz<T>(&self, id: Uuid, f: impl FnOnce(&mut QuizSession) -> T) -> Option<T> {
        let mut quizzes = self.quizzes.write().await;
        quizzes.get_mut(&id).map(|s| {
            s.touch();
            f(s)
        })
    }

    pub async fn remove_quiz(&self, id: Uuid) -> Option<QuizSession> {
        self.quizzes.write().await.remove(&id)
    }

    /// Drops sessions idle past their timeout as of `now`. Returns how many went.
    pub async fn sweep_idle_quizzes(&self, now: Instant) -> usize {
        let idle = self.sessions.idle_timeout();
        let settled = self.sessions.settled_timeout();
        let mut quizzes = self.quizzes.write().await;
        let before = quizzes.len();
        quizzes.retain(|id, s| {
            let quiet = now.saturating_duration_since(s.last_active());
            let keep = quiet < if s.is_settled() { settled } else { idle };
            if !keep {
                debug!(target: "quiz", quiz_id = %id, status = s.phase().name(), ?quiet, "Evicting idle quiz");
            }
            keep
        });
        before - quizzes.len()
    }

    /// Background task running `sweep_idle_quizzes` every `sweep_interval`.
    pub fn spawn_session_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let state = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(state.sessions.sweep_interval());
            loop {
                ticker.tick().await;
                let evicted = state.sweep_idle_quizzes(Instant::now()).await;
                if evicted > 0 {
                    info!(target: "quiz", evicted, "Idle quiz sessions evicted");
                }
            }
        })
    }

    /// Fetches questions for `ticket` and applies them if the attempt is still current.
    /// Returns whether the session took the result. A ticket that is already stale
    /// never reaches the model.
    #[instrument(level = "info", skip(self), fields(quiz_id = %ticket.quiz_id, attempt = ticket.attempt))]
    pub async fn run_generation(&self, ticket: Ticket) -> bool {
        let Some(session) = self.get_quiz(ticket.quiz_id).await else {
            debug!(target: "quiz", "Quiz gone before generation started");
            return false;
        };
        if session.ticket() != ticket || !matches!(session.phase(), Phase::Loading) {
            debug!(target: "quiz", status = session.phase().name(), "Skipped generation for a stale ticket");
            return false;
        }

        let result = self
            .content
            .fetch_quiz_questions(session.topic(), session.quiz_set(), session.grade())
            .await;

        let applied = self.with_quiz(ticket.quiz_id, |s| s.apply_generation(ticket, result)).await;
        match applied {
            Some(Ok(())) => {
                info!(target: "quiz", "Generation applied");
                true
            }
            Some(Err(SessionError::StaleGeneration)) | None => {
                debug!(target: "quiz", "Discarded generation result for an abandoned attempt");
                false
            }
            Some(Err(e)) => {
                debug!(target: "quiz", error = %e, "Generation result not applied");
                false
            }
        }
    }
}
