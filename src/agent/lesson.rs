//! Micro-lesson generation

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use super::llm::{parse_json, ChatMessage, CompletionService, GenerationError};
use crate::types::Difficulty;

const SYSTEM_PROMPT: &str =
    "You are an expert educator creating micro-lessons. Always respond with valid JSON.";
const LESSON_MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.7;
/// Previous lesson titles included in the prompt
pub const RECENT_TITLES_IN_PROMPT: usize = 3;
const FALLBACK_DURATION_MINUTES: u32 = 3;

/// A generated micro-lesson
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub title: String,
    pub content: String,
    pub skill: String,
    pub difficulty: Difficulty,
    pub duration_minutes: u32,
    pub key_concepts: Vec<String>,
}

impl Lesson {
    /// Lesson served when generation fails
    pub fn fallback(skill: &str, difficulty: Difficulty) -> Self {
        Self {
            title: format!("Introduction to {}", skill),
            content: format!(
                "Let's start learning about {}. This is a fundamental skill that can help you grow professionally and personally.",
                skill
            ),
            skill: skill.to_string(),
            difficulty,
            duration_minutes: FALLBACK_DURATION_MINUTES,
            key_concepts: vec![
                "basics".to_string(),
                "fundamentals".to_string(),
                "getting started".to_string(),
            ],
        }
    }

    /// Minimal lesson used when a quiz is requested for a title alone
    pub fn stand_in(skill: &str, title: &str, difficulty: Difficulty, duration_minutes: u32) -> Self {
        Self {
            title: title.to_string(),
            content: format!("This is content for {}", title),
            skill: skill.to_string(),
            difficulty,
            duration_minutes,
            key_concepts: Vec::new(),
        }
    }
}

/// Shape of the model's lesson JSON
#[derive(Debug, Deserialize)]
struct LessonPayload {
    title: String,
    content: String,
    #[serde(default)]
    duration_minutes: Option<u32>,
    #[serde(default)]
    key_concepts: Vec<String>,
}

/// Generates lessons through a completion service
#[derive(Clone)]
pub struct LessonAgent {
    completion: Arc<dyn CompletionService>,
    default_duration: u32,
}

impl LessonAgent {
    pub fn new(completion: Arc<dyn CompletionService>, default_duration: u32) -> Self {
        Self { completion, default_duration }
    }

    /// Generate a lesson, falling back to a fixed introduction on any failure
    pub async fn generate(&self, skill: &str, difficulty: Difficulty, recent_titles: &[String]) -> Lesson {
        match self.try_generate(skill, difficulty, recent_titles).await {
            Ok(lesson) => {
                debug!("Generated lesson '{}' for {}", lesson.title, skill);
                lesson
            }
            Err(e) => {
                warn!("Lesson generation for '{}' failed, using fallback: {}", skill, e);
                Lesson::fallback(skill, difficulty)
            }
        }
    }

    async fn try_generate(
        &self,
        skill: &str,
        difficulty: Difficulty,
        recent_titles: &[String],
    ) -> Result<Lesson, GenerationError> {
        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(lesson_prompt(skill, difficulty, recent_titles, self.default_duration)),
        ];
        let text = self
            .completion
            .complete(messages, LESSON_MAX_TOKENS, TEMPERATURE)
            .await?;
        let payload: LessonPayload = parse_json(&text)?;

        if payload.title.trim().is_empty() || payload.content.trim().is_empty() {
            return Err(GenerationError::Invalid("lesson title or content is empty".to_string()));
        }

        Ok(Lesson {
            title: payload.title.trim().to_string(),
            content: payload.content,
            skill: skill.to_string(),
            difficulty,
            duration_minutes: payload.duration_minutes.unwrap_or(self.default_duration),
            key_concepts: payload.key_concepts,
        })
    }
}

fn lesson_prompt(skill: &str, difficulty: Difficulty, recent_titles: &[String], duration: u32) -> String {
    let start = recent_titles.len().saturating_sub(RECENT_TITLES_IN_PROMPT);
    let previous = if recent_titles.is_empty() {
        String::new()
    } else {
        format!("\nPrevious lessons covered: {}", recent_titles[start..].join(", "))
    };

    format!(
        r#"Create a concise, engaging micro-lesson for the skill: {skill}
Difficulty level: {difficulty}{previous}

Requirements:
- Lesson should be about {duration} minutes to read
- Include practical examples
- Focus on one key concept
- Make it actionable
- Include 3-5 key takeaways

Format your response as JSON with these fields:
{{
    "title": "Lesson title",
    "content": "Main lesson content (200-400 words)",
    "duration_minutes": {duration},
    "key_concepts": ["concept1", "concept2", "concept3"]
}}"#
    )
}
