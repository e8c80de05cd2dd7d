//! Learning progress tracking
//!
//! This module provides:
//! - Per-(user, skill) progress records with adaptive difficulty
//! - Recommendation tiers derived from lesson count and quiz average
//! - Enhanced snapshots carrying a derived 0-100 mastery level

pub mod tracker;
pub mod mastery;

pub use tracker::{
    recommendation, ProgressError, ProgressTracker, RecommendationTier, UserSkillProgress,
};
pub use mastery::EnhancedUserSkillProgress;
