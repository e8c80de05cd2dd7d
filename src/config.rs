//! Configuration management
//!
//! Settings come from `config.toml` in the project config directory when it
//! exists, then environment variables (and `.env`) override them.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::agent::llm::{DEFAULT_API_VERSION, DEFAULT_TIMEOUT_SECS};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Chat-completion provider
    #[serde(default)]
    pub llm: LlmConfig,
    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Lesson and quiz sizing
    #[serde(default)]
    pub learning: LearningConfig,
    /// Default tracing directive when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            server: ServerConfig::default(),
            learning: LearningConfig::default(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "azure" for an Azure OpenAI deployment, "openai" for any
    /// OpenAI-compatible base URL with bearer auth
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Azure resource endpoint or provider base URL
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Never written back to disk
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Azure deployment name
    #[serde(default = "default_deployment")]
    pub deployment: Option<String>,
    /// Model name sent to OpenAI-compatible providers
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "azure".to_string()
}

fn default_api_version() -> String {
    DEFAULT_API_VERSION.to_string()
}

fn default_deployment() -> Option<String> {
    Some("gpt-4.1".to_string())
}

fn default_model() -> String {
    "gpt-4.1".to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            endpoint: None,
            api_key: None,
            api_version: default_api_version(),
            deployment: default_deployment(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map(str::trim).unwrap_or_default().is_empty()
}

impl LlmConfig {
    pub fn is_azure(&self) -> bool {
        !self.provider.eq_ignore_ascii_case("openai")
    }

    /// Problems that prevent calling the provider. Empty when usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if is_blank(&self.endpoint) {
            problems.push("missing endpoint (AZURE_OPENAI_ENDPOINT)".to_string());
        }
        if is_blank(&self.api_key) {
            problems.push("missing API key (AZURE_OPENAI_KEY)".to_string());
        }
        if self.is_azure() {
            if is_blank(&self.deployment) {
                problems.push("missing deployment (AZURE_OPENAI_LLM_DEPLOYMENT)".to_string());
            }
        } else if self.model.trim().is_empty() {
            problems.push("missing model (AZURE_OPENAI_LLM_MODEL)".to_string());
        }
        problems
    }

    pub fn is_configured(&self) -> bool {
        self.validate().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout applied by the HTTP layer
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_request_timeout_secs() -> u64 {
    90
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Upper bound on questions kept from a generated quiz
    #[serde(default = "default_max_quiz_questions")]
    pub max_quiz_questions: usize,
    /// Lesson length requested from the model, in minutes
    #[serde(default = "default_lesson_duration")]
    pub default_lesson_duration: u32,
}

fn default_max_quiz_questions() -> usize {
    5
}

fn default_lesson_duration() -> u32 {
    5
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            max_quiz_questions: default_max_quiz_questions(),
            default_lesson_duration: default_lesson_duration(),
        }
    }
}

/// Strip surrounding whitespace and any double quotes from an env value
fn clean_env_value(raw: &str) -> String {
    raw.replace('"', "").trim().to_string()
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!("Ignoring {}: '{}' is not a valid value", name, value);
            None
        }
    }
}

impl Config {
    /// Load from the default config path (if present), then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = config_path()?;
        let mut config = if path.exists() {
            Self::load_from(&path)?
        } else {
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    /// Parse a TOML file without environment overrides
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Write the configuration as TOML. The API key is never written.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, contents).context("Failed to write config file")?;
        Ok(())
    }

    /// Settings the server cannot run with.
    ///
    /// A request must be allowed to outlive the model call it waits on,
    /// otherwise slow generations are cut off by the HTTP layer.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.server.request_timeout_secs > self.llm.timeout_secs,
            "server.request_timeout_secs ({}s) must be greater than llm.timeout_secs ({}s)",
            self.server.request_timeout_secs,
            self.llm.timeout_secs
        );
        Ok(())
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| {
            lookup(name)
                .map(|raw| clean_env_value(&raw))
                .filter(|value| !value.is_empty())
        };

        if let Some(endpoint) = get("AZURE_OPENAI_ENDPOINT") {
            self.llm.endpoint = Some(endpoint);
        }
        if let Some(key) = get("AZURE_OPENAI_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(version) = get("AZURE_OPENAI_API_VERSION") {
            self.llm.api_version = version;
        }
        if let Some(deployment) = get("AZURE_OPENAI_LLM_DEPLOYMENT") {
            self.llm.deployment = Some(deployment);
        }
        if let Some(model) = get("AZURE_OPENAI_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(n) = get("MAX_QUIZ_QUESTIONS").and_then(|v| parse_env("MAX_QUIZ_QUESTIONS", &v)) {
            self.learning.max_quiz_questions = n;
        }
        if let Some(n) = get("DEFAULT_LESSON_DURATION").and_then(|v| parse_env("DEFAULT_LESSON_DURATION", &v)) {
            self.learning.default_lesson_duration = n;
        }
        if let Some(port) = get("MCP_PORT").and_then(|v| parse_env("MCP_PORT", &v)) {
            self.server.port = port;
        }
        if let Some(level) = get("LOG_LEVEL") {
            self.log_level = level.to_lowercase();
        }
    }
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    let base = directories::ProjectDirs::from("com", "skillsprout", "skillsprout")
        .context("Failed to get project directories")?;
    Ok(base.config_dir().join("config.toml"))
}

fn mask(secret: &Option<String>) -> &'static str {
    if is_blank(secret) {
        "not set"
    } else {
        "set"
    }
}

/// Show current configuration
pub fn show_config(config: &Config) -> Result<()> {
    let path = config_path()?;

    println!("Configuration ({})", path.display());
    println!();
    println!("[llm]");
    println!("  provider:     {}", config.llm.provider);
    println!("  endpoint:     {}", config.llm.endpoint.as_deref().unwrap_or("not set"));
    println!("  api key:      {}", mask(&config.llm.api_key));
    println!("  api version:  {}", config.llm.api_version);
    println!("  deployment:   {}", config.llm.deployment.as_deref().unwrap_or("not set"));
    println!("  model:        {}", config.llm.model);
    println!("  timeout:      {}s", config.llm.timeout_secs);
    println!();
    println!("[server]");
    println!("  address:      {}:{}", config.server.host, config.server.port);
    println!("  timeout:      {}s", config.server.request_timeout_secs);
    println!();
    println!("[learning]");
    println!("  max quiz questions:      {}", config.learning.max_quiz_questions);
    println!("  default lesson duration: {} min", config.learning.default_lesson_duration);
    println!();
    println!("log_level: {}", config.log_level);

    if let Err(e) = config.validate() {
        println!("\n❌ {}", e);
    }

    let problems = config.llm.validate();
    if problems.is_empty() {
        println!("\n✅ LLM provider configured");
    } else {
        println!("\n⚠️  LLM provider incomplete, fallback lessons will be served:");
        for problem in problems {
            println!("   - {}", problem);
        }
    }

    Ok(())
}
