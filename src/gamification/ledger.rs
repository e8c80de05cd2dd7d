//! Per-user points, levels, streaks and achievements

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::achievements::{Achievement, AchievementId};
use crate::progress::EnhancedUserSkillProgress;

/// Bonus awarded once per unlocked achievement
pub const ACHIEVEMENT_BONUS: i64 = 50;
pub const POINTS_PER_LEVEL: i64 = 100;
pub const MAX_LEVEL: u32 = 10;
/// Points for each completed lesson
pub const LESSON_POINTS: i64 = 10;
/// Points for each correctly answered question
pub const CORRECT_ANSWER_POINTS: i64 = 5;
/// Extra points when every question of a quiz is right
pub const PERFECT_QUIZ_BONUS: i64 = 20;
pub const STREAK_GOAL_DAYS: u32 = 7;

/// Level for a point total: `min(10, points / 100 + 1)`, never below 1
pub fn level_for_points(points: i64) -> u32 {
    let level = points.div_euclid(POINTS_PER_LEVEL) + 1;
    level.clamp(1, MAX_LEVEL as i64) as u32
}

type Rule = fn(&UserStats, &EnhancedUserSkillProgress) -> bool;

/// Achievements evaluated by `check_achievements`, in evaluation order.
/// Polyglot, speed and explorer are unlocked by the caller through `unlock`.
const RULES: &[(AchievementId, Rule)] = &[
    (AchievementId::FirstSteps, |s, _| s.total_lessons >= 1),
    (AchievementId::QuizMaster, |_, p| p.has_perfect_score()),
    (AchievementId::Persistent, |s, _| s.total_lessons >= 5),
    (AchievementId::Scholar, |s, _| s.total_lessons >= 10),
    (AchievementId::Expert, |s, _| s.total_lessons >= 20),
    (AchievementId::Perfectionist, |_, p| p.perfect_scores() >= 5),
    (AchievementId::Consistent, |s, _| s.streak_days >= STREAK_GOAL_DAYS),
];

/// Gamification state for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: String,
    pub total_points: i64,
    pub level: u32,
    /// Unlocked achievements in unlock order
    pub achievements: Vec<AchievementId>,
    pub streak_days: u32,
    pub last_active_day: Option<NaiveDate>,
    pub total_lessons: u32,
    /// Quiz questions answered
    pub total_quizzes: u32,
    pub correct_answers: u32,
}

impl UserStats {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            total_points: 0,
            level: 1,
            achievements: Vec::new(),
            streak_days: 0,
            last_active_day: None,
            total_lessons: 0,
            total_quizzes: 0,
            correct_answers: 0,
        }
    }

    /// Add points and recompute the level. Returns true on level-up.
    pub fn add_points(&mut self, delta: i64) -> bool {
        let previous = self.level;
        self.total_points += delta;
        self.level = level_for_points(self.total_points);
        self.level > previous
    }

    /// Percentage of answered questions that were correct
    pub fn accuracy(&self) -> f64 {
        if self.total_quizzes == 0 {
            0.0
        } else {
            self.correct_answers as f64 / self.total_quizzes as f64 * 100.0
        }
    }

    pub fn has(&self, id: AchievementId) -> bool {
        self.achievements.contains(&id)
    }

    /// Unlock an achievement once, awarding the bonus.
    /// Returns the catalog entry only when it was newly unlocked.
    pub fn unlock(&mut self, id: AchievementId) -> Option<&'static Achievement> {
        if self.has(id) {
            return None;
        }
        self.achievements.push(id);
        self.add_points(ACHIEVEMENT_BONUS);
        Some(id.achievement())
    }

    /// Evaluate the rule list against these stats and a progress snapshot.
    ///
    /// Returns exactly the newly unlocked achievements, in rule order.
    pub fn check_achievements(
        &mut self,
        progress: &EnhancedUserSkillProgress,
    ) -> Vec<&'static Achievement> {
        let due: Vec<AchievementId> = RULES
            .iter()
            .filter(|(id, rule)| !self.has(*id) && rule(self, progress))
            .map(|(id, _)| *id)
            .collect();

        due.into_iter().filter_map(|id| self.unlock(id)).collect()
    }

    /// Update the daily streak for activity on `day`
    pub fn touch_streak(&mut self, day: NaiveDate) {
        self.streak_days = match self.last_active_day {
            Some(last) if last == day => self.streak_days.max(1),
            Some(last) if last.succ_opt() == Some(day) => self.streak_days + 1,
            Some(last) if last > day => return,
            _ => 1,
        };
        self.last_active_day = Some(day);
    }

    pub fn record_lesson(&mut self, day: NaiveDate) {
        self.total_lessons += 1;
        self.add_points(LESSON_POINTS);
        self.touch_streak(day);
    }

    pub fn record_quiz(&mut self, correct: u32, total: u32, day: NaiveDate) {
        let correct = correct.min(total);
        self.total_quizzes += total;
        self.correct_answers += correct;

        let mut points = CORRECT_ANSWER_POINTS * correct as i64;
        if total > 0 && correct == total {
            points += PERFECT_QUIZ_BONUS;
        }
        self.add_points(points);
        self.touch_streak(day);
    }
}

/// In-memory ledger keyed by user id
#[derive(Default)]
pub struct GamificationLedger {
    stats: RwLock<HashMap<String, UserStats>>,
}

impl GamificationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up stats, inserting a fresh record on first reference
    pub async fn get_or_create(&self, user_id: &str) -> UserStats {
        if let Some(stats) = self.stats.read().await.get(user_id) {
            return stats.clone();
        }
        self.update(user_id, |stats| stats.clone()).await
    }

    /// Replace a user's stats wholesale
    pub async fn insert(&self, stats: UserStats) {
        self.stats.write().await.insert(stats.user_id.clone(), stats);
    }

    /// Apply `f` to a user's stats under the write lock
    async fn update<R>(&self, user_id: &str, f: impl FnOnce(&mut UserStats) -> R) -> R {
        let mut all = self.stats.write().await;
        let stats = all
            .entry(user_id.to_string())
            .or_insert_with(|| UserStats::new(user_id));
        f(stats)
    }

    pub async fn add_points(&self, user_id: &str, delta: i64) -> UserStats {
        self.update(user_id, |stats| {
            if stats.add_points(delta) {
                info!("User '{}' reached level {}", user_id, stats.level);
            }
            stats.clone()
        })
        .await
    }

    pub async fn accuracy(&self, user_id: &str) -> f64 {
        self.get_or_create(user_id).await.accuracy()
    }

    pub async fn check_achievements(
        &self,
        user_id: &str,
        progress: &EnhancedUserSkillProgress,
    ) -> Vec<&'static Achievement> {
        let unlocked = self
            .update(user_id, |stats| stats.check_achievements(progress))
            .await;
        for achievement in &unlocked {
            info!("User '{}' unlocked achievement '{}'", user_id, achievement.id);
        }
        unlocked
    }

    /// Unlock an achievement that is driven by the caller (polyglot, speed, explorer)
    pub async fn unlock(&self, user_id: &str, id: AchievementId) -> Option<&'static Achievement> {
        let unlocked = self.update(user_id, |stats| stats.unlock(id)).await;
        if unlocked.is_some() {
            info!("User '{}' unlocked achievement '{}'", user_id, id);
        }
        unlocked
    }

    /// Register activity on `day` without awarding points
    pub async fn touch_streak(&self, user_id: &str, day: NaiveDate) -> u32 {
        self.update(user_id, |stats| {
            stats.touch_streak(day);
            stats.streak_days
        })
        .await
    }

    pub async fn record_lesson(&self, user_id: &str) -> UserStats {
        let today = Utc::now().date_naive();
        self.update(user_id, |stats| {
            stats.record_lesson(today);
            debug!("User '{}' has {} lessons, {} points", user_id, stats.total_lessons, stats.total_points);
            stats.clone()
        })
        .await
    }

    pub async fn record_quiz(&self, user_id: &str, correct: u32, total: u32) -> UserStats {
        let today = Utc::now().date_naive();
        self.update(user_id, |stats| {
            stats.record_quiz(correct, total, today);
            stats.clone()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn ids(unlocked: &[&'static Achievement]) -> Vec<AchievementId> {
        unlocked.iter().map(|a| a.id).collect()
    }

    #[test]
    fn test_new_stats() {
        let stats = UserStats::new("test_user");
        assert_eq!(stats.total_points, 0);
        assert_eq!(stats.level, 1);
        assert!(stats.achievements.is_empty());
        assert_eq!(stats.accuracy(), 0.0);
    }

    #[test]
    fn test_add_points_levels() {
        let mut stats = UserStats::new("u");
        assert!(!stats.add_points(50));
        assert_eq!(stats.level, 1);

        assert!(stats.add_points(100));
        assert_eq!(stats.total_points, 150);
        assert_eq!(stats.level, 2);

        stats.add_points(1850);
        assert_eq!(stats.total_points, 2000);
        assert_eq!(stats.level, 10);
    }

    #[test]
    fn test_negative_points_floor_level() {
        let mut stats = UserStats::new("u");
        stats.add_points(250);
        assert_eq!(stats.level, 3);
        stats.add_points(-400);
        assert_eq!(stats.total_points, -150);
        assert_eq!(stats.level, 1);
    }

    #[test]
    fn test_accuracy() {
        let mut stats = UserStats::new("u");
        stats.total_quizzes = 10;
        stats.correct_answers = 8;
        assert_eq!(stats.accuracy(), 80.0);
    }

    #[test]
    fn test_no_activity_unlocks_nothing() {
        let mut stats = UserStats::new("u");
        let progress = EnhancedUserSkillProgress::new("u", "Python");
        assert!(stats.check_achievements(&progress).is_empty());
        assert_eq!(stats.total_points, 0);
    }

    #[test]
    fn test_first_steps_awards_bonus() {
        let mut stats = UserStats::new("u");
        stats.total_lessons = 1;
        let progress = EnhancedUserSkillProgress::new("u", "Python");

        let unlocked = stats.check_achievements(&progress);
        assert_eq!(ids(&unlocked), vec![AchievementId::FirstSteps]);
        assert_eq!(stats.total_points, ACHIEVEMENT_BONUS);
        assert!(stats.has(AchievementId::FirstSteps));
    }

    #[test]
    fn test_check_is_idempotent() {
        let mut stats = UserStats::new("u");
        stats.total_lessons = 5;
        let progress = EnhancedUserSkillProgress::new("u", "Python").with_scores(vec![100.0]);

        let first = stats.check_achievements(&progress);
        assert_eq!(
            ids(&first),
            vec![AchievementId::FirstSteps, AchievementId::QuizMaster, AchievementId::Persistent]
        );
        let points = stats.total_points;

        assert!(stats.check_achievements(&progress).is_empty());
        assert_eq!(stats.total_points, points);
    }

    #[test]
    fn test_twenty_lessons_unlocks_all_counts() {
        let mut stats = UserStats::new("u");
        stats.total_lessons = 20;
        let progress = EnhancedUserSkillProgress::new("u", "Python");

        let unlocked = ids(&stats.check_achievements(&progress));
        assert!(unlocked.contains(&AchievementId::Persistent));
        assert!(unlocked.contains(&AchievementId::Scholar));
        assert!(unlocked.contains(&AchievementId::Expert));
        assert_eq!(stats.achievements.iter().filter(|a| **a == AchievementId::Expert).count(), 1);
    }

    #[test]
    fn test_lesson_counts_without_first_steps_fixture() {
        // First steps already held: only the count milestones are new
        let mut stats = UserStats::new("u");
        stats.achievements = vec![AchievementId::FirstSteps];
        stats.total_lessons = 20;
        let progress = EnhancedUserSkillProgress::new("u", "Python");

        let unlocked = ids(&stats.check_achievements(&progress));
        assert_eq!(
            unlocked,
            vec![AchievementId::Persistent, AchievementId::Scholar, AchievementId::Expert]
        );
        assert_eq!(stats.total_points, 3 * ACHIEVEMENT_BONUS);
    }

    #[test]
    fn test_perfectionist_needs_five_perfect_scores() {
        let mut stats = UserStats::new("u");
        let four = EnhancedUserSkillProgress::new("u", "Python")
            .with_scores(vec![100.0, 100.0, 100.0, 100.0, 90.0]);
        let unlocked = ids(&stats.check_achievements(&four));
        assert_eq!(unlocked, vec![AchievementId::QuizMaster]);

        let five = four.with_scores(vec![100.0, 100.0, 100.0, 100.0, 100.0, 90.0]);
        let unlocked = ids(&stats.check_achievements(&five));
        assert_eq!(unlocked, vec![AchievementId::Perfectionist]);
    }

    #[test]
    fn test_consistent_streak() {
        let mut stats = UserStats::new("u");
        stats.streak_days = 7;
        let progress = EnhancedUserSkillProgress::new("u", "Python");
        assert_eq!(ids(&stats.check_achievements(&progress)), vec![AchievementId::Consistent]);
    }

    #[test]
    fn test_bonus_can_level_up() {
        let mut stats = UserStats::new("u");
        stats.add_points(60);
        stats.total_lessons = 1;
        let progress = EnhancedUserSkillProgress::new("u", "Python");
        stats.check_achievements(&progress);
        assert_eq!(stats.total_points, 110);
        assert_eq!(stats.level, 2);
    }

    #[test]
    fn test_unlock_is_one_time() {
        let mut stats = UserStats::new("u");
        assert!(stats.unlock(AchievementId::Explorer).is_some());
        assert!(stats.unlock(AchievementId::Explorer).is_none());
        assert_eq!(stats.total_points, ACHIEVEMENT_BONUS);
    }

    #[test]
    fn test_streak_rules() {
        let mut stats = UserStats::new("u");
        stats.touch_streak(day(1));
        assert_eq!(stats.streak_days, 1);
        stats.touch_streak(day(1));
        assert_eq!(stats.streak_days, 1);
        stats.touch_streak(day(2));
        stats.touch_streak(day(3));
        assert_eq!(stats.streak_days, 3);
        // Gap resets
        stats.touch_streak(day(5));
        assert_eq!(stats.streak_days, 1);
        // Out-of-order activity is ignored
        stats.touch_streak(day(4));
        assert_eq!(stats.streak_days, 1);
        assert_eq!(stats.last_active_day, Some(day(5)));
    }

    #[test]
    fn test_record_quiz_points() {
        let mut stats = UserStats::new("u");
        stats.record_quiz(3, 3, day(1));
        assert_eq!(stats.total_points, 3 * CORRECT_ANSWER_POINTS + PERFECT_QUIZ_BONUS);
        stats.record_quiz(1, 4, day(1));
        assert_eq!(stats.total_quizzes, 7);
        assert_eq!(stats.correct_answers, 4);
    }

    #[tokio::test]
    async fn test_ledger_get_or_create_is_stable() {
        let ledger = GamificationLedger::new();
        let stats = ledger.get_or_create("new_user").await;
        assert_eq!(stats.level, 1);

        ledger.add_points("new_user", 100).await;
        assert_eq!(ledger.get_or_create("new_user").await.total_points, 100);
    }

    #[tokio::test]
    async fn test_ledger_check_achievements() {
        let ledger = GamificationLedger::new();
        let mut seeded = UserStats::new("u");
        seeded.total_lessons = 10;
        ledger.insert(seeded).await;

        let progress = EnhancedUserSkillProgress::new("u", "Python");
        let unlocked = ledger.check_achievements("u", &progress).await;
        assert_eq!(unlocked.len(), 3);
        assert!(ledger.check_achievements("u", &progress).await.is_empty());
        assert_eq!(ledger.get_or_create("u").await.total_points, 150);
    }

    #[tokio::test]
    async fn test_ledger_record_lesson() {
        let ledger = GamificationLedger::new();
        let stats = ledger.record_lesson("u").await;
        assert_eq!(stats.total_lessons, 1);
        assert_eq!(stats.total_points, LESSON_POINTS);
        assert_eq!(stats.streak_days, 1);
    }

    #[tokio::test]
    async fn test_ledger_touch_streak() {
        let ledger = GamificationLedger::new();
        assert_eq!(ledger.touch_streak("u", day(1)).await, 1);
        assert_eq!(ledger.touch_streak("u", day(2)).await, 2);
        assert_eq!(ledger.touch_streak("u", day(2)).await, 2);
        assert_eq!(ledger.touch_streak("u", day(5)).await, 1);
        assert_eq!(ledger.get_or_create("u").await.total_points, 0);
    }
}
