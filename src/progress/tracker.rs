//! Per-(user, skill) progress store
//!
//! Records lesson completions and quiz scores and moves the difficulty tier
//! up or down once enough scores have been collected.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::mastery::EnhancedUserSkillProgress;
use crate::types::Difficulty;

/// Scores required before the difficulty may change
pub const MIN_SCORES_FOR_ADJUSTMENT: usize = 3;
/// Average at or above which the learner is promoted
pub const PROMOTION_THRESHOLD: f64 = 0.8;
/// Average below which the learner is demoted
pub const DEMOTION_THRESHOLD: f64 = 0.6;

/// Errors raised by progress updates
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgressError {
    #[error("quiz score {0} is outside the range 0.0..=1.0")]
    ScoreOutOfRange(f64),
}

/// Learning state for one user on one skill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSkillProgress {
    pub user_id: String,
    pub skill: String,
    pub lessons_completed: u32,
    /// Quiz results as fractions in 0.0..=1.0, oldest first
    pub quiz_scores: Vec<f64>,
    pub current_difficulty: Difficulty,
    pub last_activity: Option<DateTime<Utc>>,
    /// Titles of completed lessons, oldest first
    #[serde(default)]
    pub lesson_history: Vec<String>,
    /// Time spent on each completed lesson
    #[serde(default)]
    pub time_spent: Vec<Duration>,
}

impl UserSkillProgress {
    pub fn new(user_id: impl Into<String>, skill: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            skill: skill.into(),
            lessons_completed: 0,
            quiz_scores: Vec::new(),
            current_difficulty: Difficulty::Beginner,
            last_activity: None,
            lesson_history: Vec::new(),
            time_spent: Vec::new(),
        }
    }

    /// Mean of all quiz scores, 0.0 when none are recorded
    pub fn average_score(&self) -> f64 {
        if self.quiz_scores.is_empty() {
            0.0
        } else {
            self.quiz_scores.iter().sum::<f64>() / self.quiz_scores.len() as f64
        }
    }

    /// Append a score and re-evaluate the difficulty tier.
    ///
    /// Returns the new tier when it changed. Scores outside `0.0..=1.0`
    /// (including NaN) are rejected and leave the record untouched.
    pub fn add_quiz_score(&mut self, score: f64) -> Result<Option<Difficulty>, ProgressError> {
        validate_score(score)?;
        self.quiz_scores.push(score);

        if self.quiz_scores.len() < MIN_SCORES_FOR_ADJUSTMENT {
            return Ok(None);
        }

        let average = self.average_score();
        let next = if average >= PROMOTION_THRESHOLD {
            self.current_difficulty.promote()
        } else if average < DEMOTION_THRESHOLD {
            self.current_difficulty.demote()
        } else {
            self.current_difficulty
        };

        if next == self.current_difficulty {
            return Ok(None);
        }
        self.current_difficulty = next;
        Ok(Some(next))
    }

    fn complete_lesson(&mut self, title: Option<&str>, time_spent: Option<Duration>, at: DateTime<Utc>) {
        self.lessons_completed += 1;
        self.last_activity = Some(at);
        if let Some(title) = title {
            self.lesson_history.push(title.to_string());
        }
        if let Some(spent) = time_spent {
            self.time_spent.push(spent);
        }
    }

    /// The last `n` completed lesson titles, oldest first
    pub fn recent_lessons(&self, n: usize) -> Vec<String> {
        let start = self.lesson_history.len().saturating_sub(n);
        self.lesson_history[start..].to_vec()
    }

    /// Snapshot on the 0-100 scale with a freshly computed mastery level
    pub fn enhanced(&self) -> EnhancedUserSkillProgress {
        EnhancedUserSkillProgress::from_progress(self)
    }
}

fn validate_score(score: f64) -> Result<(), ProgressError> {
    if score.is_finite() && (0.0..=1.0).contains(&score) {
        Ok(())
    } else {
        Err(ProgressError::ScoreOutOfRange(score))
    }
}

/// Recommendation tier derived from lesson count and quiz average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationTier {
    NotStarted,
    Excelling,
    Progressing,
    Struggling,
}

impl RecommendationTier {
    pub fn for_progress(progress: &UserSkillProgress) -> Self {
        let average = progress.average_score();
        if progress.lessons_completed == 0 {
            RecommendationTier::NotStarted
        } else if average >= PROMOTION_THRESHOLD {
            RecommendationTier::Excelling
        } else if average >= DEMOTION_THRESHOLD {
            RecommendationTier::Progressing
        } else {
            RecommendationTier::Struggling
        }
    }

    pub fn message(&self, skill: &str) -> String {
        match self {
            RecommendationTier::NotStarted => format!(
                "🎯 Ready to start your {} journey! Begin with your first lesson.",
                skill
            ),
            RecommendationTier::Excelling => format!(
                "🌟 Excellent work! You're mastering {}. Ready for the next challenge?",
                skill
            ),
            RecommendationTier::Progressing => format!(
                "📈 Good progress! Keep practicing {} to build confidence.",
                skill
            ),
            RecommendationTier::Struggling => format!(
                "💪 Don't give up! Review the {} concepts and try again. Practice makes perfect!",
                skill
            ),
        }
    }
}

/// Recommendation text for a progress record
pub fn recommendation(progress: &UserSkillProgress) -> String {
    RecommendationTier::for_progress(progress).message(&progress.skill)
}

type ProgressKey = (String, String);

fn key(user_id: &str, skill: &str) -> ProgressKey {
    (user_id.to_string(), skill.to_string())
}

/// In-memory progress store keyed by (user, skill).
///
/// Every operation holds the map lock only for its in-memory update, so each
/// call is atomic for its key.
#[derive(Default)]
pub struct ProgressTracker {
    records: RwLock<HashMap<ProgressKey, UserSkillProgress>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a record, inserting a fresh one on first reference
    pub async fn get_or_create(&self, user_id: &str, skill: &str) -> UserSkillProgress {
        if let Some(existing) = self.get(user_id, skill).await {
            return existing;
        }
        let mut records = self.records.write().await;
        records
            .entry(key(user_id, skill))
            .or_insert_with(|| {
                debug!("Tracking new skill '{}' for user '{}'", skill, user_id);
                UserSkillProgress::new(user_id, skill)
            })
            .clone()
    }

    /// Look up a record without inserting
    pub async fn get(&self, user_id: &str, skill: &str) -> Option<UserSkillProgress> {
        self.records.read().await.get(&key(user_id, skill)).cloned()
    }

    /// Count a completed lesson and stamp the activity time
    pub async fn record_lesson_completed(&self, user_id: &str, skill: &str) -> UserSkillProgress {
        self.update_lesson(user_id, skill, None, None).await
    }

    /// Count a completed lesson, remembering its title and time spent
    pub async fn record_lesson(
        &self,
        user_id: &str,
        skill: &str,
        title: &str,
        time_spent: Duration,
    ) -> UserSkillProgress {
        self.update_lesson(user_id, skill, Some(title), Some(time_spent)).await
    }

    async fn update_lesson(
        &self,
        user_id: &str,
        skill: &str,
        title: Option<&str>,
        time_spent: Option<Duration>,
    ) -> UserSkillProgress {
        let mut records = self.records.write().await;
        let progress = records
            .entry(key(user_id, skill))
            .or_insert_with(|| UserSkillProgress::new(user_id, skill));
        progress.complete_lesson(title, time_spent, Utc::now());
        debug!(
            "User '{}' completed lesson {} of '{}'",
            user_id, progress.lessons_completed, skill
        );
        progress.clone()
    }

    /// Append a quiz score (fraction in 0.0..=1.0) and adjust difficulty
    pub async fn record_quiz_score(
        &self,
        user_id: &str,
        skill: &str,
        score: f64,
    ) -> Result<UserSkillProgress, ProgressError> {
        validate_score(score)?;

        let mut records = self.records.write().await;
        let progress = records
            .entry(key(user_id, skill))
            .or_insert_with(|| UserSkillProgress::new(user_id, skill));

        if let Some(difficulty) = progress.add_quiz_score(score)? {
            info!(
                "Difficulty for '{}' on '{}' is now {} (average {:.2})",
                user_id,
                skill,
                difficulty,
                progress.average_score()
            );
        }
        Ok(progress.clone())
    }

    /// All records of one user, sorted by skill
    pub async fn skills_for(&self, user_id: &str) -> Vec<UserSkillProgress> {
        let records = self.records.read().await;
        let mut skills: Vec<UserSkillProgress> = records
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        skills.sort_by(|a, b| a.skill.cmp(&b.skill));
        skills
    }

    /// Number of distinct skills in which the user has completed at least one lesson
    pub async fn skills_learned(&self, user_id: &str) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|p| p.user_id == user_id && p.lessons_completed > 0)
            .count()
    }

    /// Every record, sorted by user then skill
    pub async fn all(&self) -> Vec<UserSkillProgress> {
        let records = self.records.read().await;
        let mut all: Vec<UserSkillProgress> = records.values().cloned().collect();
        all.sort_by(|a, b| (&a.user_id, &a.skill).cmp(&(&b.user_id, &b.skill)));
        all
    }

    /// Last `n` lesson titles for a (user, skill) pair, oldest first
    pub async fn recent_lessons(&self, user_id: &str, skill: &str, n: usize) -> Vec<String> {
        self.get(user_id, skill)
            .await
            .map(|p| p.recent_lessons(n))
            .unwrap_or_default()
    }

    /// Enhanced snapshot for a (user, skill) pair, creating the record if needed
    pub async fn enhanced(&self, user_id: &str, skill: &str) -> EnhancedUserSkillProgress {
        self.get_or_create(user_id, skill).await.enhanced()
    }
}
