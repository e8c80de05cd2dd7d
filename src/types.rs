//! Shared types used across modules
//!
//! This module contains types that are used by the tracker, the generation
//! agents and the HTTP layer alike.

use serde::{Deserialize, Serialize};

/// Difficulty tier governing lesson and quiz generation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    /// One step up, saturating at advanced
    pub fn promote(self) -> Self {
        match self {
            Difficulty::Beginner => Difficulty::Intermediate,
            Difficulty::Intermediate | Difficulty::Advanced => Difficulty::Advanced,
        }
    }

    /// One step down, saturating at beginner
    pub fn demote(self) -> Self {
        match self {
            Difficulty::Advanced => Difficulty::Intermediate,
            Difficulty::Intermediate | Difficulty::Beginner => Difficulty::Beginner,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }

    /// Parse from a case-insensitive name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Some(Difficulty::Beginner),
            "intermediate" => Some(Difficulty::Intermediate),
            "advanced" => Some(Difficulty::Advanced),
            _ => None,
        }
    }

    /// Capitalized label for display
    pub fn title(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Skills offered out of the box. Any free-text skill is accepted as well.
pub const PREDEFINED_SKILLS: &[&str] = &[
    "Python Programming",
    "Spanish Language",
    "Public Speaking",
    "Data Science",
    "Machine Learning",
    "JavaScript",
    "Project Management",
    "Digital Marketing",
    "Creative Writing",
    "Photography",
];
