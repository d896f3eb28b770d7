//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.
//! Correct answers never leave the server.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Profile, QuizQuestion, QuizSet, Topic};
use crate::session::{Phase, QuizSession};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    StartQuiz {
        #[serde(rename = "learnerId")]
        learner_id: Uuid,
        topic: Topic,
        #[serde(rename = "quizSet")]
        quiz_set: u8,
    },
    QuizState {
        #[serde(rename = "quizId")]
        quiz_id: Uuid,
    },
    SetAnswer {
        #[serde(rename = "quizId")]
        quiz_id: Uuid,
        answer: String,
    },
    Advance {
        #[serde(rename = "quizId")]
        quiz_id: Uuid,
    },
    Restart {
        #[serde(rename = "quizId")]
        quiz_id: Uuid,
    },
    ExitQuiz {
        #[serde(rename = "quizId")]
        quiz_id: Uuid,
    },
    NewWordProblem {
        #[serde(rename = "learnerId")]
        learner_id: Uuid,
    },
    CheckWordProblem {
        #[serde(rename = "learnerId")]
        learner_id: Uuid,
        answer: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Quiz {
        quiz: QuizOut,
    },
    AnswerResult {
        correct: bool,
        quiz: QuizOut,
    },
    QuizExited {
        #[serde(rename = "quizId")]
        quiz_id: Uuid,
    },
    WordProblem {
        problem: String,
    },
    WordProblemFeedback {
        correct: bool,
        feedback: String,
    },
    Error {
        message: String,
    },
}

/// Question as shown to the learner: text and, for multiple-choice, the options.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum QuestionOut {
    MultipleChoice { question: String, options: Vec<String> },
    Input { question: String },
}

impl From<&QuizQuestion> for QuestionOut {
    fn from(q: &QuizQuestion) -> Self {
        match q {
            QuizQuestion::MultipleChoice { question, options, .. } => {
                QuestionOut::MultipleChoice { question: question.clone(), options: options.clone() }
            }
            QuizQuestion::Input { question, .. } => QuestionOut::Input { question: question.clone() },
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum QuizView {
    Loading,
    #[serde(rename_all = "camelCase")]
    Presenting {
        question: QuestionOut,
        /// 1-based, for "Question n of total".
        number: usize,
        total: usize,
        score: usize,
        pending_answer: Option<String>,
        can_advance: bool,
        is_last: bool,
    },
    Finished {
        score: usize,
        total: usize,
        percentage: u32,
        message: String,
    },
    Errored {
        message: String,
    },
    Exited,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizOut {
    pub quiz_id: Uuid,
    pub learner_id: Uuid,
    pub topic: Topic,
    pub topic_title: &'static str,
    pub quiz_set: u8,
    #[serde(flatten)]
    pub view: QuizView,
}

/// Convert the internal session to the public DTO.
pub fn to_out(s: &QuizSession) -> QuizOut {
    let view = match s.phase() {
        Phase::Loading => QuizView::Loading,
        Phase::Presenting(round) => QuizView::Presenting {
            question: round.current().into(),
            number: round.index() + 1,
            total: round.total(),
            score: round.score(),
            pending_answer: round.pending().map(str::to_string),
            can_advance: round.pending().is_some(),
            is_last: round.is_last(),
        },
        Phase::Finished(summary) => QuizView::Finished {
            score: summary.score,
            total: summary.total,
            percentage: summary.percentage,
            message: summary.message().to_string(),
        },
        Phase::Errored { message } => QuizView::Errored { message: message.clone() },
        Phase::Exited => QuizView::Exited,
    };
    QuizOut {
        quiz_id: s.id(),
        learner_id: s.learner_id(),
        topic: s.topic(),
        topic_title: s.topic().title(),
        quiz_set: s.quiz_set().index(),
        view,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicOut {
    pub id: Topic,
    pub title: &'static str,
    pub color: &'static str,
    pub word_problems: bool,
    pub quiz_sets: Vec<u8>,
}

impl From<Topic> for TopicOut {
    fn from(t: Topic) -> Self {
        TopicOut {
            id: t,
            title: t.title(),
            color: t.color(),
            word_problems: t.has_word_problems(),
            quiz_sets: QuizSet::all().map(QuizSet::index).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProfileIn {
    pub name: String,
    /// Defaults to grade 2 when omitted.
    #[serde(default)]
    pub grade: Option<u8>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileOut {
    pub learner_id: Uuid,
    pub name: String,
    pub grade: u8,
}

impl ProfileOut {
    pub fn new(learner_id: Uuid, p: &Profile) -> Self {
        Self { learner_id, name: p.name().to_string(), grade: p.grade().number() }
    }
}

#[derive(Debug, Serialize)]
pub struct WordProblemOut {
    pub problem: String,
}

#[derive(Debug, Deserialize)]
pub struct AnswerIn {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct WordProblemFeedbackOut {
    pub correct: bool,
    pub feedback: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartQuizIn {
    pub learner_id: Uuid,
    pub topic: Topic,
    pub quiz_set: u8,
}

#[derive(Debug, Serialize)]
pub struct AdvanceOut {
    pub correct: bool,
    pub quiz: QuizOut,
}

#[derive(Debug, Serialize)]
pub struct ErrorOut {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Grade;
    use crate::generation::parse_quiz_questions;
    use crate::testing::quiz_json;

    #[test]
    fn presenting_view_hides_the_answer() {
        let (mut s, t) = QuizSession::start(Uuid::new_v4(), Topic::Numbers, QuizSet::try_from(2).unwrap(), Grade::Two);
        s.apply_generation(t, Ok(parse_quiz_questions(&quiz_json(10)).unwrap())).unwrap();
        let json = serde_json::to_value(to_out(&s)).unwrap();
        assert_eq!(json["status"], "presenting");
        assert_eq!(json["quizSet"], 2);
        assert_eq!(json["topicTitle"], "Numbers, Operations & Relationships");
        assert_eq!(json["question"]["type"], "multiple-choice");
        assert_eq!(json["question"]["options"][2], "12");
        assert!(json["question"].get("correctAnswer").is_none());
        assert_eq!(json["number"], 1);
        assert_eq!(json["canAdvance"], false);
    }

    #[test]
    fn loading_view_is_just_a_status() {
        let (s, _) = QuizSession::start(Uuid::new_v4(), Topic::Measurement, QuizSet::try_from(1).unwrap(), Grade::Three);
        let json = serde_json::to_value(to_out(&s)).unwrap();
        assert_eq!(json["status"], "loading");
        assert_eq!(json["topic"], "measurement");
    }

    #[test]
    fn client_messages_parse() {
        let id = Uuid::new_v4();
        let raw = format!(r#"{{"type":"start_quiz","learnerId":"{id}","topic":"data_handling","quizSet":3}}"#);
        match serde_json::from_str::<ClientWsMessage>(&raw).unwrap() {
            ClientWsMessage::StartQuiz { learner_id, topic, quiz_set } => {
                assert_eq!((learner_id, topic, quiz_set), (id, Topic::DataHandling, 3));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(serde_json::from_str::<ClientWsMessage>(r#"{"type":"ping"}"#), Ok(ClientWsMessage::Ping)));
    }
}
