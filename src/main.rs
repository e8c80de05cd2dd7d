//! SkillSprout - AI-powered microlearning
//!
//! Adaptive lessons and quizzes from the terminal or over HTTP.

use clap::Parser;
use skillsprout::cli::{self, Cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli.load_config()?;

    // RUST_LOG wins; otherwise the configured level (warn by default)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .init();

    cli::run(cli, config).await
}
