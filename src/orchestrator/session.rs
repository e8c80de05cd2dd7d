//! Per-user learning sessions (active lesson and active quiz)

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::agent::{Lesson, Quiz};

/// Why a learning-flow step was refused. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("skill must not be empty")]
    BlankSkill,

    #[error("no answers provided")]
    NoAnswers,

    #[error("no active lesson for user '{0}', start a lesson first")]
    NoActiveLesson(String),

    #[error("no active quiz for user '{0}', complete a lesson or generate a quiz first")]
    NoActiveQuiz(String),
}

impl SessionError {
    /// True for malformed input, false for a missing session step
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, SessionError::BlankSkill | SessionError::NoAnswers)
    }
}

/// A lesson being read, with the time it was served
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveLesson {
    pub lesson: Lesson,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
struct Session {
    lesson: Option<ActiveLesson>,
    quiz: Option<Quiz>,
}

/// Session map keyed by user id
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new session around `lesson`, discarding any previous lesson or quiz
    pub async fn begin_lesson(&self, user_id: &str, lesson: Lesson, started_at: DateTime<Utc>) {
        let session = Session {
            lesson: Some(ActiveLesson { lesson, started_at }),
            quiz: None,
        };
        self.sessions.write().await.insert(user_id.to_string(), session);
    }

    pub async fn lesson(&self, user_id: &str) -> Option<ActiveLesson> {
        self.sessions
            .read()
            .await
            .get(user_id)
            .and_then(|s| s.lesson.clone())
    }

    /// Swap `expected` for `quiz` in one step.
    ///
    /// Returns false and leaves the session alone when the active lesson is no
    /// longer `expected` (completed elsewhere or replaced by a newer lesson).
    pub async fn finish_lesson(&self, user_id: &str, expected: &ActiveLesson, quiz: Quiz) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(user_id) {
            Some(session) if session.lesson.as_ref() == Some(expected) => {
                session.lesson = None;
                session.quiz = Some(quiz);
                true
            }
            _ => false,
        }
    }

    pub async fn set_quiz(&self, user_id: &str, quiz: Quiz) {
        self.sessions
            .write()
            .await
            .entry(user_id.to_string())
            .or_default()
            .quiz = Some(quiz);
    }

    pub async fn quiz(&self, user_id: &str) -> Option<Quiz> {
        self.sessions
            .read()
            .await
            .get(user_id)
            .and_then(|s| s.quiz.clone())
    }

    /// Remove and return the active quiz
    pub async fn take_quiz(&self, user_id: &str) -> Option<Quiz> {
        self.sessions
            .write()
            .await
            .get_mut(user_id)
            .and_then(|s| s.quiz.take())
    }
}
