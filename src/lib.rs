//! SkillSprout - AI-powered microlearning
//!
//! A microlearning service with:
//! - Lesson and quiz generation through an OpenAI-compatible chat-completion API
//! - Per-user, per-skill progress tracking with adaptive difficulty
//! - Points, levels, streaks and achievements
//! - JSON HTTP endpoints and an interactive terminal mode
//!
//! # Example
//!
//! ```ignore
//! use skillsprout::{agent::completion_service, Config, SkillBuilder};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load()?;
//!     let builder = SkillBuilder::new(completion_service(&config.llm), &config.learning);
//!     let lesson = builder.start_lesson("learner", "Python Programming", None).await?;
//!     println!("{}", lesson.title);
//!     Ok(())
//! }
//! ```

pub mod types;
pub mod progress;
pub mod gamification;
pub mod agent;
pub mod orchestrator;
pub mod config;
pub mod server;
pub mod cli;

pub use agent::{CompletionService, GenerationError, Lesson, LessonAgent, Question, Quiz, QuizAgent};
pub use config::Config;
pub use gamification::{Achievement, AchievementId, GamificationLedger, UserStats};
pub use orchestrator::{SessionError, SkillBuilder};
pub use progress::{EnhancedUserSkillProgress, ProgressTracker, UserSkillProgress};
pub use server::{router, start as start_server, ServerState};
pub use types::Difficulty;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get the library info
pub fn info() -> String {
    format!("{} v{} - AI-powered microlearning", NAME, VERSION)
}
