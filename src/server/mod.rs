//! Web server module exposing the learning flow as JSON endpoints

pub mod http;

use anyhow::{Context, Result};
use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::agent::completion_service;
use crate::config::Config;
use crate::orchestrator::SkillBuilder;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<Config>,
    pub builder: Arc<SkillBuilder>,
}

impl ServerState {
    /// State backed by the configured completion provider
    pub fn from_config(config: Config) -> Self {
        let completion = completion_service(&config.llm);
        let builder = SkillBuilder::new(completion, &config.learning);
        Self {
            config: Arc::new(config),
            builder: Arc::new(builder),
        }
    }
}

/// Build the application router
pub fn router(state: ServerState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    Router::new()
        .route("/", get(http::root_handler))
        .route("/health", get(http::health_handler))
        .route("/mcp/skills", get(http::skills_handler))
        .route("/mcp/achievements", get(http::achievements_handler))
        .route("/mcp/lesson/generate", post(http::generate_lesson_handler))
        .route("/mcp/lesson/complete", post(http::complete_lesson_handler))
        .route("/mcp/quiz/generate", post(http::generate_quiz_handler))
        .route("/mcp/quiz/submit", post(http::submit_quiz_handler))
        .route("/mcp/progress/{user_id}", get(http::progress_handler))
        .route("/mcp/stats/{user_id}", get(http::stats_handler))
        .route("/mcp/narration", post(http::narration_handler))
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server
pub async fn start(config: Config) -> Result<()> {
    config.validate()?;
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let llm_ready = config.llm.is_configured();

    let app = router(ServerState::from_config(config));

    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("     SkillSprout Server Starting");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("✓ Server binding to: {}", addr);
    if llm_ready {
        println!("✓ LLM provider configured");
    } else {
        println!("⚠ LLM provider not configured, serving fallback lessons");
        println!("  Tip: set AZURE_OPENAI_ENDPOINT, AZURE_OPENAI_KEY and AZURE_OPENAI_LLM_DEPLOYMENT");
    }
    println!();
    println!("🚀 Listening on http://{}", addr);
    println!();

    info!("Serving on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
