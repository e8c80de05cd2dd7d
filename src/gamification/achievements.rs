//! Static achievement catalog

use serde::{Deserialize, Serialize};

/// Identifier of a catalog achievement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AchievementId {
    FirstSteps,
    QuizMaster,
    Persistent,
    Scholar,
    Expert,
    Polyglot,
    Perfectionist,
    Speed,
    Consistent,
    Explorer,
}

impl AchievementId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AchievementId::FirstSteps => "first_steps",
            AchievementId::QuizMaster => "quiz_master",
            AchievementId::Persistent => "persistent",
            AchievementId::Scholar => "scholar",
            AchievementId::Expert => "expert",
            AchievementId::Polyglot => "polyglot",
            AchievementId::Perfectionist => "perfectionist",
            AchievementId::Speed => "speed",
            AchievementId::Consistent => "consistent",
            AchievementId::Explorer => "explorer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        CATALOG.iter().map(|a| a.id).find(|id| id.as_str() == s)
    }

    /// Catalog entry for this id
    pub fn achievement(&self) -> &'static Achievement {
        // The catalog lists every variant in declaration order
        &CATALOG[*self as usize]
    }
}

impl std::fmt::Display for AchievementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named milestone with a one-time point bonus
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Achievement {
    pub id: AchievementId,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub unlock_condition: &'static str,
}

/// Every achievement, in `AchievementId` declaration order
pub const CATALOG: &[Achievement] = &[
    Achievement {
        id: AchievementId::FirstSteps,
        name: "First Steps",
        description: "Complete your first lesson",
        icon: "👣",
        unlock_condition: "Complete 1 lesson",
    },
    Achievement {
        id: AchievementId::QuizMaster,
        name: "Quiz Master",
        description: "Score 100% on a quiz",
        icon: "🧠",
        unlock_condition: "Get a perfect quiz score",
    },
    Achievement {
        id: AchievementId::Persistent,
        name: "Persistent Learner",
        description: "Complete 5 lessons",
        icon: "📚",
        unlock_condition: "Complete 5 lessons",
    },
    Achievement {
        id: AchievementId::Scholar,
        name: "Scholar",
        description: "Complete 10 lessons",
        icon: "🎓",
        unlock_condition: "Complete 10 lessons",
    },
    Achievement {
        id: AchievementId::Expert,
        name: "Expert",
        description: "Complete 20 lessons",
        icon: "🏆",
        unlock_condition: "Complete 20 lessons",
    },
    Achievement {
        id: AchievementId::Polyglot,
        name: "Polyglot",
        description: "Learn 3 different skills",
        icon: "🌍",
        unlock_condition: "Start lessons in 3 skills",
    },
    Achievement {
        id: AchievementId::Perfectionist,
        name: "Perfectionist",
        description: "Get 5 perfect quiz scores",
        icon: "💯",
        unlock_condition: "Score 100% on 5 quizzes in one skill",
    },
    Achievement {
        id: AchievementId::Speed,
        name: "Speed Learner",
        description: "Complete a lesson in under 3 minutes",
        icon: "⚡",
        unlock_condition: "Finish a lesson in less than 3 minutes",
    },
    Achievement {
        id: AchievementId::Consistent,
        name: "Consistent",
        description: "Maintain a 7-day learning streak",
        icon: "🔥",
        unlock_condition: "Learn on 7 consecutive days",
    },
    Achievement {
        id: AchievementId::Explorer,
        name: "Explorer",
        description: "Try voice narration",
        icon: "🎧",
        unlock_condition: "Use voice narration once",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_matches_ids() {
        assert_eq!(CATALOG.len(), 10);
        for (index, achievement) in CATALOG.iter().enumerate() {
            assert_eq!(achievement.id as usize, index);
            assert_eq!(achievement.id.achievement(), achievement);
        }
    }

    #[test]
    fn test_parse_round_trips_ids() {
        for achievement in CATALOG {
            assert_eq!(AchievementId::parse(achievement.id.as_str()), Some(achievement.id));
        }
        assert_eq!(AchievementId::parse("unknown"), None);
    }

    #[test]
    fn test_serializes_snake_case() {
        let json = serde_json::to_value(AchievementId::FirstSteps.achievement()).unwrap();
        assert_eq!(json["id"], "first_steps");
        assert_eq!(json["name"], "First Steps");
    }
}
