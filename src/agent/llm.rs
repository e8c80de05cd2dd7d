//! Chat-completion client (Azure OpenAI deployments and OpenAI-compatible providers)

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::LlmConfig;

pub const DEFAULT_API_VERSION: &str = "2024-12-01-preview";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Errors from a generation round-trip. Callers replace these with fallback content.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("LLM provider is not configured: {0}")]
    NotConfigured(String),

    #[error("request to LLM provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("LLM response contained no message content")]
    EmptyResponse,

    #[error("failed to parse model output: {0}")]
    Parse(String),

    #[error("model output failed validation: {0}")]
    Invalid(String),
}

/// How the API key is presented to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `api-key: <key>` (Azure OpenAI)
    ApiKeyHeader,
    /// `Authorization: Bearer <key>`
    Bearer,
}

/// Where and how to send chat-completion requests
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Full chat-completions URL, including any query string
    pub url: String,
    pub api_key: String,
    /// Sent as `model` in the request body. Azure routes by deployment instead.
    pub model: Option<String>,
    pub auth: AuthStyle,
}

impl ProviderConfig {
    /// Azure OpenAI deployment endpoint
    pub fn azure(endpoint: &str, api_key: String, deployment: &str, api_version: &str) -> Self {
        Self {
            url: format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
            api_key,
            model: None,
            auth: AuthStyle::ApiKeyHeader,
        }
    }

    /// Any provider exposing `{base_url}/chat/completions` with bearer auth
    pub fn openai_compatible(base_url: &str, api_key: String, model: impl Into<String>) -> Self {
        Self {
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            model: Some(model.into()),
            auth: AuthStyle::Bearer,
        }
    }

    /// Build from the `[llm]` config section
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let problems = config.validate();
        if !problems.is_empty() {
            return Err(GenerationError::NotConfigured(problems.join("; ")));
        }

        let api_key = config.api_key.clone().unwrap_or_default();
        let endpoint = config.endpoint.as_deref().unwrap_or_default();
        if config.is_azure() {
            let deployment = config.deployment.as_deref().unwrap_or_default();
            Ok(Self::azure(endpoint, api_key, deployment, &config.api_version))
        } else {
            Ok(Self::openai_compatible(endpoint, api_key, config.model.clone()))
        }
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }
}

/// Completion collaborator used by the lesson and quiz agents
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f32,
}

/// reqwest-backed chat-completion client
#[derive(Clone)]
pub struct CompletionClient {
    client: Arc<Client>,
    provider: ProviderConfig,
}

impl CompletionClient {
    pub fn new(provider: ProviderConfig, timeout: Duration) -> Result<Self, GenerationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client: Arc::new(client), provider })
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let provider = ProviderConfig::from_config(config)?;
        Self::new(provider, Duration::from_secs(config.timeout_secs))
    }

    pub fn provider(&self) -> &ProviderConfig {
        &self.provider
    }
}

#[async_trait]
impl CompletionService for CompletionClient {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, GenerationError> {
        let request = ChatRequest {
            model: self.provider.model.as_deref(),
            messages: &messages,
            max_tokens,
            temperature,
        };

        let builder = self.client.post(&self.provider.url);
        let builder = match self.provider.auth {
            AuthStyle::ApiKeyHeader => builder.header("api-key", &self.provider.api_key),
            AuthStyle::Bearer => builder.bearer_auth(&self.provider.api_key),
        };
        let response = builder.json(&request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenerationError::Api { status: status.as_u16(), body });
        }

        // Parse as raw Value first; providers differ in the content shape
        let raw: Value = response.json().await?;
        let content = message_content(&raw).ok_or(GenerationError::EmptyResponse)?;
        debug!("LLM returned {} bytes of content", content.len());
        Ok(content)
    }
}

/// Completion service used when no provider is configured; every call fails
/// so the agents serve their fallback content.
#[derive(Debug, Clone, Default)]
pub struct OfflineCompletion {
    reason: String,
}

impl OfflineCompletion {
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into() }
    }
}

#[async_trait]
impl CompletionService for OfflineCompletion {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        _max_tokens: u32,
        _temperature: f32,
    ) -> Result<String, GenerationError> {
        Err(GenerationError::NotConfigured(self.reason.clone()))
    }
}

/// Extract `choices[0].message.content`, handling both string content and
/// arrays of `{"type": "text", "text": ..}` parts.
pub fn message_content(response: &Value) -> Option<String> {
    let content = response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|arr| arr.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|msg| msg.get("content"))?;

    let text = match content {
        Value::String(s) => s.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("text"))
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => return None,
    };

    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Slice the JSON object out of model output, dropping markdown fences and
/// any prose around it.
pub fn extract_json(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Extract and deserialize a JSON object from model output
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, GenerationError> {
    let json = extract_json(text)
        .ok_or_else(|| GenerationError::Parse("no JSON object in model output".to_string()))?;
    serde_json::from_str(json).map_err(|e| GenerationError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_azure_url() {
        let provider = ProviderConfig::azure(
            "https://example.openai.azure.com/",
            "key".to_string(),
            "gpt-4o",
            DEFAULT_API_VERSION,
        );
        assert_eq!(
            provider.url,
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-12-01-preview"
        );
        assert_eq!(provider.auth, AuthStyle::ApiKeyHeader);
        assert!(provider.model.is_none());
    }

    #[test]
    fn test_openai_compatible_url() {
        let provider =
            ProviderConfig::openai_compatible("https://api.example.com/v1", "key".to_string(), "gpt-4o-mini");
        assert_eq!(provider.url, "https://api.example.com/v1/chat/completions");
        assert_eq!(provider.auth, AuthStyle::Bearer);
        assert_eq!(provider.model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_request_omits_missing_model() {
        let messages = vec![ChatMessage::user("hi")];
        let request = ChatRequest { model: None, messages: &messages, max_tokens: 10, temperature: 0.7 };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("model").is_none());
        assert_eq!(value["messages"][0]["role"], "user");
    }

    #[test]
    fn test_message_content_string() {
        let response = json!({"choices": [{"message": {"content": "Hello world"}}]});
        assert_eq!(message_content(&response), Some("Hello world".to_string()));
    }

    #[test]
    fn test_message_content_parts() {
        let response = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "Hello "},
            {"type": "text", "text": "world"}
        ]}}]});
        assert_eq!(message_content(&response), Some("Hello world".to_string()));
    }

    #[test]
    fn test_message_content_missing() {
        assert_eq!(message_content(&json!({"choices": []})), None);
        assert_eq!(message_content(&json!({"choices": [{"message": {"content": null}}]})), None);
        assert_eq!(message_content(&json!({"choices": [{"message": {"content": "  "}}]})), None);
    }

    #[test]
    fn test_extract_json_from_fences() {
        let text = "```json\n{\"title\": \"Loops\"}\n```";
        assert_eq!(extract_json(text), Some("{\"title\": \"Loops\"}"));

        let text = "Here you go: {\"a\": {\"b\": 1}} Enjoy!";
        assert_eq!(extract_json(text), Some("{\"a\": {\"b\": 1}}"));

        assert_eq!(extract_json("no json here"), None);
        assert_eq!(extract_json("} backwards {"), None);
    }

    #[test]
    fn test_parse_json_errors() {
        #[derive(Debug, Deserialize)]
        struct Title {
            #[allow(dead_code)]
            title: String,
        }
        assert!(parse_json::<Title>("{\"title\": \"ok\"}").is_ok());
        assert!(matches!(parse_json::<Title>("{\"other\": 1}"), Err(GenerationError::Parse(_))));
        assert!(matches!(parse_json::<Title>("plain text"), Err(GenerationError::Parse(_))));
    }

    #[tokio::test]
    async fn test_offline_completion_fails() {
        let offline = OfflineCompletion::new("missing endpoint");
        let result = offline.complete(vec![ChatMessage::user("hi")], 10, 0.7).await;
        assert!(matches!(result, Err(GenerationError::NotConfigured(reason)) if reason == "missing endpoint"));
    }
}
