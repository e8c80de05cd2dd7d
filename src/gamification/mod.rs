//! Points, levels, streaks and achievements
//!
//! The ledger keeps one `UserStats` record per user. Achievements are taken
//! from a fixed catalog and each one is unlocked at most once per user.

pub mod achievements;
pub mod ledger;

pub use achievements::{Achievement, AchievementId, CATALOG};
pub use ledger::{level_for_points, GamificationLedger, UserStats, ACHIEVEMENT_BONUS};
