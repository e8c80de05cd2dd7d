//! Learning flow orchestration
//!
//! `SkillBuilder` ties the generation agents to the progress tracker and the
//! gamification ledger: start a lesson, complete it and receive a quiz, then
//! submit answers to be graded. Each user has at most one active lesson and
//! one active quiz at a time.

pub mod session;

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::agent::{CompletionService, Lesson, LessonAgent, Quiz, QuizAgent, QuizResult};
use crate::config::LearningConfig;
use crate::gamification::{Achievement, AchievementId, GamificationLedger, UserStats};
use crate::progress::{recommendation, ProgressTracker, UserSkillProgress};
use crate::agent::lesson::RECENT_TITLES_IN_PROMPT;
use crate::types::Difficulty;

pub use session::{ActiveLesson, SessionError, SessionStore};

/// Lessons finished faster than this unlock the speed achievement
pub const SPEED_LIMIT: Duration = Duration::from_secs(3 * 60);
/// Skills with a completed lesson needed for the polyglot achievement
pub const POLYGLOT_SKILLS: usize = 3;

/// Result of completing a lesson
#[derive(Debug, Clone, Serialize)]
pub struct LessonCompletion {
    pub lesson_title: String,
    pub skill: String,
    pub time_spent_secs: u64,
    pub progress: UserSkillProgress,
    pub stats: UserStats,
    pub new_achievements: Vec<Achievement>,
    /// Now the user's active quiz
    pub quiz: Quiz,
}

/// Result of submitting quiz answers
#[derive(Debug, Clone, Serialize)]
pub struct QuizOutcome {
    pub skill: String,
    pub lesson_title: String,
    pub result: QuizResult,
    pub progress: UserSkillProgress,
    pub mastery_level: f64,
    pub recommendation: String,
    pub new_achievements: Vec<Achievement>,
    pub stats: UserStats,
}

/// Drives the learning flow for every user
pub struct SkillBuilder {
    tracker: Arc<ProgressTracker>,
    ledger: Arc<GamificationLedger>,
    sessions: SessionStore,
    lessons: LessonAgent,
    quizzes: QuizAgent,
    lesson_duration: u32,
}

impl SkillBuilder {
    pub fn new(completion: Arc<dyn CompletionService>, learning: &LearningConfig) -> Self {
        Self::with_stores(
            completion,
            learning,
            Arc::new(ProgressTracker::new()),
            Arc::new(GamificationLedger::new()),
        )
    }

    /// Build around existing stores
    pub fn with_stores(
        completion: Arc<dyn CompletionService>,
        learning: &LearningConfig,
        tracker: Arc<ProgressTracker>,
        ledger: Arc<GamificationLedger>,
    ) -> Self {
        Self {
            tracker,
            ledger,
            sessions: SessionStore::new(),
            lessons: LessonAgent::new(completion.clone(), learning.default_lesson_duration),
            quizzes: QuizAgent::new(completion, learning.max_quiz_questions),
            lesson_duration: learning.default_lesson_duration,
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    pub fn ledger(&self) -> &GamificationLedger {
        &self.ledger
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Generate a lesson and make it the user's active lesson.
    ///
    /// The lesson targets the tracker's current difficulty unless `difficulty`
    /// overrides it, and the prompt lists the user's most recent lesson titles.
    pub async fn start_lesson(
        &self,
        user_id: &str,
        skill: &str,
        difficulty: Option<Difficulty>,
    ) -> Result<Lesson, SessionError> {
        let skill = skill.trim();
        if skill.is_empty() {
            return Err(SessionError::BlankSkill);
        }

        let progress = self.tracker.get_or_create(user_id, skill).await;
        let difficulty = difficulty.unwrap_or(progress.current_difficulty);
        let recent = progress.recent_lessons(RECENT_TITLES_IN_PROMPT);

        let lesson = self.lessons.generate(skill, difficulty, &recent).await;
        self.sessions.begin_lesson(user_id, lesson.clone(), Utc::now()).await;

        info!("User '{}' started lesson '{}' ({})", user_id, lesson.title, difficulty);
        Ok(lesson)
    }

    /// Finish the active lesson, update progress and stats, and generate its quiz.
    ///
    /// The quiz is generated before anything is recorded. If the call is
    /// dropped while waiting on the model, or the lesson was replaced in the
    /// meantime, the session, tracker and ledger are left as they were.
    pub async fn complete_lesson(&self, user_id: &str) -> Result<LessonCompletion, SessionError> {
        let active = self
            .sessions
            .lesson(user_id)
            .await
            .ok_or_else(|| SessionError::NoActiveLesson(user_id.to_string()))?;
        let time_spent = (Utc::now() - active.started_at).to_std().unwrap_or_default();

        let current = self.tracker.get_or_create(user_id, &active.lesson.skill).await;
        let quiz = self.quizzes.generate(&active.lesson, &current).await;
        if !self.sessions.finish_lesson(user_id, &active, quiz.clone()).await {
            warn!("Lesson '{}' for '{}' is no longer active", active.lesson.title, user_id);
            return Err(SessionError::NoActiveLesson(user_id.to_string()));
        }

        let lesson = active.lesson;
        let progress = self
            .tracker
            .record_lesson(user_id, &lesson.skill, &lesson.title, time_spent)
            .await;
        self.ledger.record_lesson(user_id).await;

        let mut new_achievements = Vec::new();
        if time_spent < SPEED_LIMIT {
            new_achievements.extend(self.ledger.unlock(user_id, AchievementId::Speed).await);
        }
        if self.tracker.skills_learned(user_id).await >= POLYGLOT_SKILLS {
            new_achievements.extend(self.ledger.unlock(user_id, AchievementId::Polyglot).await);
        }
        new_achievements.extend(
            self.ledger
                .check_achievements(user_id, &progress.enhanced())
                .await,
        );

        info!(
            "User '{}' completed '{}' in {}s",
            user_id,
            lesson.title,
            time_spent.as_secs()
        );

        Ok(LessonCompletion {
            lesson_title: lesson.title,
            skill: lesson.skill,
            time_spent_secs: time_spent.as_secs(),
            progress,
            stats: self.ledger.get_or_create(user_id).await,
            new_achievements: new_achievements.into_iter().cloned().collect(),
            quiz,
        })
    }

    /// Generate a quiz for a lesson known only by title and make it the active quiz
    pub async fn generate_quiz(
        &self,
        user_id: &str,
        skill: &str,
        lesson_title: &str,
    ) -> Result<Quiz, SessionError> {
        let skill = skill.trim();
        if skill.is_empty() {
            return Err(SessionError::BlankSkill);
        }

        let progress = self.tracker.get_or_create(user_id, skill).await;
        let title = match lesson_title.trim() {
            "" => format!("Introduction to {}", skill),
            title => title.to_string(),
        };
        let lesson = Lesson::stand_in(skill, &title, progress.current_difficulty, self.lesson_duration);

        let quiz = self.quizzes.generate(&lesson, &progress).await;
        self.sessions.set_quiz(user_id, quiz.clone()).await;
        Ok(quiz)
    }

    /// Grade answers against the active quiz and record the result
    pub async fn submit_quiz(&self, user_id: &str, answers: &[String]) -> Result<QuizOutcome, SessionError> {
        if answers.is_empty() {
            return Err(SessionError::NoAnswers);
        }
        let quiz = self
            .sessions
            .take_quiz(user_id)
            .await
            .ok_or_else(|| SessionError::NoActiveQuiz(user_id.to_string()))?;

        let result = quiz.grade(answers);
        let progress = match self
            .tracker
            .record_quiz_score(user_id, &quiz.skill, result.score)
            .await
        {
            Ok(progress) => progress,
            Err(e) => {
                warn!("Quiz score for '{}' not recorded: {}", user_id, e);
                self.tracker.get_or_create(user_id, &quiz.skill).await
            }
        };
        self.ledger.record_quiz(user_id, result.correct, result.total).await;

        let enhanced = progress.enhanced();
        let new_achievements = self.ledger.check_achievements(user_id, &enhanced).await;

        info!(
            "User '{}' scored {}/{} on '{}'",
            user_id, result.correct, result.total, quiz.lesson_title
        );

        Ok(QuizOutcome {
            recommendation: recommendation(&progress),
            skill: quiz.skill,
            lesson_title: quiz.lesson_title,
            result,
            mastery_level: enhanced.mastery_level,
            progress,
            new_achievements: new_achievements.into_iter().cloned().collect(),
            stats: self.ledger.get_or_create(user_id).await,
        })
    }

    /// Record use of voice narration
    pub async fn record_narration(&self, user_id: &str) -> Option<Achievement> {
        self.ledger
            .unlock(user_id, AchievementId::Explorer)
            .await
            .cloned()
    }
}
