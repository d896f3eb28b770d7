//! Quiz session state machine.
//!
//! ```text
//!   Loading ──ok──▶ Presenting ──advance (last)──▶ Finished ──restart──▶ Loading
//!      │                 ▲  │                          │
//!      └──err──▶ Errored  └──┘ advance (not last)       └──exit──▶ Exited
//! ```
//!
//! Every generation request carries a `Ticket` (quiz id + attempt). Restart and exit
//! bump the attempt, so a reply that arrives for an older attempt is refused with
//! `SessionError::StaleGeneration` instead of overwriting the newer state.

use tokio::time::Instant;
use uuid::Uuid;

use crate::domain::{Grade, QuizQuestion, QuizSet, Topic};
use crate::errors::{QuizGenerationFailed, SessionError};

const NO_QUESTIONS_MESSAGE: &str = "No quiz questions available right now. Please try again later.";

/// Identity of one generation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket {
    pub quiz_id: Uuid,
    pub attempt: u32,
}

#[derive(Clone, Debug)]
pub enum Phase {
    Loading,
    Presenting(Round),
    Finished(Summary),
    Errored { message: String },
    Exited,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Loading => "loading",
            Phase::Presenting(_) => "presenting",
            Phase::Finished(_) => "finished",
            Phase::Errored { .. } => "errored",
            Phase::Exited => "exited",
        }
    }
}

/// Working data while questions are being presented.
#[derive(Clone, Debug)]
pub struct Round {
    questions: Vec<QuizQuestion>,
    index: usize,
    score: usize,
    pending: Option<String>,
}

impl Round {
    pub fn current(&self) -> &QuizQuestion {
        &self.questions[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn total(&self) -> usize {
        self.questions.len()
    }

    pub fn score(&self) -> usize {
        self.score
    }

    pub fn pending(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.questions.len()
    }
}

/// Final result shown on the summary page.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Summary {
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
}

impl Summary {
    pub fn new(score: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            ((score as f64 / total as f64) * 100.0).round() as u32
        };
        Self { score, total, percentage }
    }

    pub fn message(&self) -> &'static str {
        if self.percentage > 80 {
            "Excellent work! You're a math star!"
        } else if self.percentage > 50 {
            "Great job! You're getting it!"
        } else {
            "Good try! Keep practicing!"
        }
    }
}

/// Outcome of scoring one answer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scored {
    pub correct: bool,
    pub finished: bool,
}

#[derive(Clone, Debug)]
pub struct QuizSession {
    id: Uuid,
    learner_id: Uuid,
    topic: Topic,
    quiz_set: QuizSet,
    grade: Grade,
    attempt: u32,
    phase: Phase,
    last_active: Instant,
}

impl QuizSession {
    /// New session in `Loading`, with the ticket for its first generation request.
    pub fn start(learner_id: Uuid, topic: Topic, quiz_set: QuizSet, grade: Grade) -> (Self, Ticket) {
        let session = Self {
            id: Uuid::new_v4(),
            learner_id,
            topic,
            quiz_set,
            grade,
            attempt: 0,
            phase: Phase::Loading,
            last_active: Instant::now(),
        };
        let ticket = session.ticket();
        (session, ticket)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn learner_id(&self) -> Uuid {
        self.learner_id
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    pub fn quiz_set(&self) -> QuizSet {
        self.quiz_set
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn ticket(&self) -> Ticket {
        Ticket { quiz_id: self.id, attempt: self.attempt }
    }

    /// Last time the learner or a generation result touched this session.
    pub fn last_active(&self) -> Instant {
        self.last_active
    }

    pub fn touch(&mut self) {
        self.last_active = Instant::now();
    }

    /// Finished, errored and exited sessions have nothing left to wait for.
    pub fn is_settled(&self) -> bool {
        matches!(self.phase, Phase::Finished(_) | Phase::Errored { .. } | Phase::Exited)
    }

    /// Applies a finished generation request. Only the current attempt, while loading, is accepted.
    pub fn apply_generation(
        &mut self,
        ticket: Ticket,
        result: Result<Vec<QuizQuestion>, QuizGenerationFailed>,
    ) -> Result<(), SessionError> {
        if ticket != self.ticket() || !matches!(self.phase, Phase::Loading) {
            return Err(SessionError::StaleGeneration);
        }
        self.phase = match result {
            Ok(questions) if questions.is_empty() => Phase::Errored { message: NO_QUESTIONS_MESSAGE.into() },
            Ok(questions) => Phase::Presenting(Round { questions, index: 0, score: 0, pending: None }),
            Err(e) => Phase::Errored { message: e.to_string() },
        };
        Ok(())
    }

    /// Replaces the pending answer. An empty value clears it.
    pub fn set_answer(&mut self, value: &str) -> Result<(), SessionError> {
        let round = self.round_mut("answer")?;
        round.pending = if value.is_empty() { None } else { Some(value.to_string()) };
        Ok(())
    }

    /// Scores the pending answer and moves to the next question or to `Finished`.
    pub fn advance(&mut self) -> Result<Scored, SessionError> {
        let round = self.round_mut("advance")?;
        let answer = round.pending.take().ok_or(SessionError::NoPendingAnswer)?;
        let correct = round.current().is_correct(&answer);
        if correct {
            round.score += 1;
        }

        if !round.is_last() {
            round.index += 1;
            return Ok(Scored { correct, finished: false });
        }

        let summary = Summary::new(round.score, round.total());
        self.phase = Phase::Finished(summary);
        Ok(Scored { correct, finished: true })
    }

    /// From `Finished` only: drop the old batch and go back to `Loading` for a fresh one.
    pub fn restart(&mut self) -> Result<Ticket, SessionError> {
        if !matches!(self.phase, Phase::Finished(_)) {
            return Err(SessionError::InvalidAction { action: "restart", status: self.phase.name() });
        }
        self.attempt += 1;
        self.phase = Phase::Loading;
        Ok(self.ticket())
    }

    /// Leave the quiz from any state. Outstanding generation replies become stale.
    pub fn exit(&mut self) {
        self.attempt += 1;
        self.phase = Phase::Exited;
    }

    fn round_mut(&mut self, action: &'static str) -> Result<&mut Round, SessionError> {
        match &mut self.phase {
            Phase::Presenting(round) => Ok(round),
            other => Err(SessionError::InvalidAction { action, status: other.name() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::parse_quiz_questions;
    use crate::testing::quiz_json;

    fn started() -> (QuizSession, Ticket) {
        let set = QuizSet::try_from(1).unwrap();
        QuizSession::start(Uuid::new_v4(), Topic::Numbers, set, Grade::Two)
    }

    fn presenting() -> QuizSession {
        let (mut s, t) = started();
        s.apply_generation(t, Ok(parse_quiz_questions(&quiz_json(10)).unwrap())).unwrap();
        s
    }

    fn round(s: &QuizSession) -> &Round {
        match s.phase() {
            Phase::Presenting(r) => r,
            other => panic!("expected presenting, got {}", other.name()),
        }
    }

    /// Answers every question; `correct` decides per index.
    fn play(s: &mut QuizSession, correct: impl Fn(usize) -> bool) {
        for i in 0..10 {
            s.set_answer(if correct(i) { "12" } else { "3" }).unwrap();
            s.advance().unwrap();
        }
    }

    #[test]
    fn loading_then_presenting_starts_from_zero() {
        let (s, _) = started();
        assert_eq!(s.phase().name(), "loading");
        let s = presenting();
        let r = round(&s);
        assert_eq!((r.index(), r.score(), r.total()), (0, 0, 10));
        assert!(r.pending().is_none());
    }

    #[test]
    fn multiple_choice_correct_answer_scores_and_advances() {
        let mut s = presenting();
        let option = match round(&s).current() {
            QuizQuestion::MultipleChoice { options, .. } => options[2].clone(),
            other => panic!("unexpected {other:?}"),
        };
        s.set_answer(&option).unwrap();
        let scored = s.advance().unwrap();
        assert_eq!(scored, Scored { correct: true, finished: false });
        let r = round(&s);
        assert_eq!((r.index(), r.score()), (1, 1));
        assert!(r.pending().is_none());
    }

    #[test]
    fn input_answers_need_integer_equality() {
        for (answer, expected) in [("12", true), ("12.0", false), ("abc", false)] {
            let mut s = presenting();
            s.set_answer("12").unwrap();
            s.advance().unwrap();
            s.set_answer(answer).unwrap();
            assert_eq!(s.advance().unwrap().correct, expected, "answer {answer:?}");
            assert_eq!(round(&s).score(), 1 + expected as usize);
        }
    }

    #[test]
    fn pending_answer_is_overwritten_and_required() {
        let mut s = presenting();
        assert_eq!(s.advance(), Err(SessionError::NoPendingAnswer));
        s.set_answer("3").unwrap();
        s.set_answer("12").unwrap();
        assert_eq!(round(&s).pending(), Some("12"));
        s.set_answer("").unwrap();
        assert_eq!(s.advance(), Err(SessionError::NoPendingAnswer));
        assert_eq!(round(&s).index(), 0);
    }

    #[test]
    fn second_advance_without_new_answer_does_not_double_score() {
        let mut s = presenting();
        s.set_answer("12").unwrap();
        s.advance().unwrap();
        assert_eq!(s.advance(), Err(SessionError::NoPendingAnswer));
        assert_eq!(round(&s).score(), 1);
    }

    #[test]
    fn summary_tiers() {
        for (n, pct, msg) in [
            (10, 100, "Excellent work! You're a math star!"),
            (6, 60, "Great job! You're getting it!"),
            (4, 40, "Good try! Keep practicing!"),
        ] {
            let mut s = presenting();
            play(&mut s, |i| i < n);
            match s.phase() {
                Phase::Finished(summary) => {
                    assert_eq!((summary.score, summary.total, summary.percentage), (n, 10, pct));
                    assert_eq!(summary.message(), msg);
                }
                other => panic!("expected finished, got {}", other.name()),
            }
        }
        assert_eq!(Summary::new(0, 0).percentage, 0);
        assert_eq!(Summary::new(2, 3).percentage, 67);
    }

    #[test]
    fn failed_generation_is_errored_with_topic_message() {
        let (mut s, t) = started();
        s.apply_generation(t, Err(QuizGenerationFailed { topic: Topic::Numbers.title().into() })).unwrap();
        match s.phase() {
            Phase::Errored { message } => assert!(message.contains("Numbers, Operations & Relationships")),
            other => panic!("expected errored, got {}", other.name()),
        }
        assert!(matches!(s.set_answer("1"), Err(SessionError::InvalidAction { status: "errored", .. })));
        assert!(s.restart().is_err());
    }

    #[test]
    fn empty_batch_is_errored() {
        let (mut s, t) = started();
        s.apply_generation(t, Ok(vec![])).unwrap();
        assert_eq!(s.phase().name(), "errored");
    }

    #[test]
    fn restart_requires_finished_and_issues_new_ticket() {
        let mut s = presenting();
        assert!(matches!(s.restart(), Err(SessionError::InvalidAction { action: "restart", status: "presenting" })));
        let first = s.ticket();
        play(&mut s, |_| true);
        let second = s.restart().unwrap();
        assert_ne!(first, second);
        assert_eq!(s.phase().name(), "loading");

        // The old request resolving late must not clobber the new attempt.
        assert_eq!(s.apply_generation(first, Ok(vec![])), Err(SessionError::StaleGeneration));
        assert_eq!(s.phase().name(), "loading");

        s.apply_generation(second, Ok(parse_quiz_questions(&quiz_json(10)).unwrap())).unwrap();
        let r = round(&s);
        assert_eq!((r.index(), r.score()), (0, 0));
    }

    #[test]
    fn exit_invalidates_outstanding_requests() {
        let (mut s, t) = started();
        s.exit();
        assert_eq!(s.phase().name(), "exited");
        assert_eq!(s.apply_generation(t, Ok(vec![])), Err(SessionError::StaleGeneration));
    }

    #[test]
    fn result_for_other_session_is_refused() {
        let (mut a, _) = started();
        let (_, other) = started();
        assert_eq!(a.apply_generation(other, Ok(vec![])), Err(SessionError::StaleGeneration));
    }
}
