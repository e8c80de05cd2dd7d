//! Mastery snapshots on the 0-100 scale

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::tracker::UserSkillProgress;
use crate::types::Difficulty;

/// A quiz score counted as perfect
pub const PERFECT_SCORE: f64 = 100.0;

const CONSISTENCY_POINTS_PER_SCORE: f64 = 5.0;
const CONSISTENCY_CAP: f64 = 20.0;
const LESSON_POINTS: f64 = 2.0;
const LESSON_CAP: f64 = 10.0;

/// Progress snapshot with percentage scores and a derived mastery level.
///
/// `mastery_level` is recomputed from the other fields; it is never the
/// source of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancedUserSkillProgress {
    pub user_id: String,
    pub skill: String,
    pub lessons_completed: u32,
    /// Quiz results in 0.0..=100.0, oldest first
    pub quiz_scores: Vec<f64>,
    pub time_spent: Vec<Duration>,
    pub current_difficulty: Difficulty,
    pub mastery_level: f64,
}

impl EnhancedUserSkillProgress {
    pub fn new(user_id: impl Into<String>, skill: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            skill: skill.into(),
            lessons_completed: 0,
            quiz_scores: Vec::new(),
            time_spent: Vec::new(),
            current_difficulty: Difficulty::Beginner,
            mastery_level: 0.0,
        }
    }

    /// Build from a tracker record, scaling fractional scores to percentages
    pub fn from_progress(progress: &UserSkillProgress) -> Self {
        let mut enhanced = Self {
            user_id: progress.user_id.clone(),
            skill: progress.skill.clone(),
            lessons_completed: progress.lessons_completed,
            quiz_scores: progress.quiz_scores.iter().map(|s| s * 100.0).collect(),
            time_spent: progress.time_spent.clone(),
            current_difficulty: progress.current_difficulty,
            mastery_level: 0.0,
        };
        enhanced.refresh_mastery();
        enhanced
    }

    pub fn with_scores(mut self, scores: Vec<f64>) -> Self {
        self.quiz_scores = scores;
        self.refresh_mastery();
        self
    }

    pub fn with_lessons(mut self, lessons_completed: u32) -> Self {
        self.lessons_completed = lessons_completed;
        self.refresh_mastery();
        self
    }

    /// Mean percentage score, 0.0 when none are recorded
    pub fn average_score(&self) -> f64 {
        if self.quiz_scores.is_empty() {
            0.0
        } else {
            self.quiz_scores.iter().sum::<f64>() / self.quiz_scores.len() as f64
        }
    }

    /// `min(100, avg + min(5 * scores, 20) + min(2 * lessons, 10))`
    pub fn calculate_mastery(&self) -> f64 {
        let consistency =
            (CONSISTENCY_POINTS_PER_SCORE * self.quiz_scores.len() as f64).min(CONSISTENCY_CAP);
        let lessons = (LESSON_POINTS * self.lessons_completed as f64).min(LESSON_CAP);
        (self.average_score() + consistency + lessons).min(100.0)
    }

    pub fn refresh_mastery(&mut self) -> f64 {
        self.mastery_level = self.calculate_mastery();
        self.mastery_level
    }

    pub fn perfect_scores(&self) -> usize {
        self.quiz_scores.iter().filter(|s| is_perfect(**s)).count()
    }

    pub fn has_perfect_score(&self) -> bool {
        self.quiz_scores.iter().any(|s| is_perfect(*s))
    }

    pub fn total_time_spent(&self) -> Duration {
        self.time_spent.iter().sum()
    }
}

fn is_perfect(score: f64) -> bool {
    (score - PERFECT_SCORE).abs() < 1e-9
}
