//! Agent module - lesson and quiz generation through a chat-completion API

pub mod lesson;
pub mod llm;
pub mod quiz;

use std::sync::Arc;
use tracing::warn;

use crate::config::LlmConfig;
pub use lesson::{Lesson, LessonAgent};
pub use llm::{ChatMessage, CompletionClient, CompletionService, GenerationError, OfflineCompletion};
pub use quiz::{Question, QuestionResult, Quiz, QuizAgent, QuizResult};

/// Completion service for the configured provider.
///
/// An incomplete configuration is not fatal: an offline service is returned
/// and every lesson or quiz falls back to its fixed content.
pub fn completion_service(config: &LlmConfig) -> Arc<dyn CompletionService> {
    match CompletionClient::from_config(config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            warn!("LLM unavailable, serving fallback content: {}", e);
            Arc::new(OfflineCompletion::new(e.to_string()))
        }
    }
}
