use std::time::Duration;

use async_trait::async_trait;
use routerag_core::{LlmConfig, RouteragError, API_KEY_ENV};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use routerag_answer::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "What was your GPA?".into(),
/// };
/// assert!(matches!(msg.role, Role::User));
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    /// Role of the message sender.
    pub role: Role,
    /// Text content of the message.
    pub content: String,
}

/// Role in the chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System-level instructions.
    System,
    /// User input.
    User,
}

/// Text completion seam used by the answer pipeline.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Complete a conversation made of one system and one user message.
    async fn complete(&self, system: &str, user: &str) -> Result<String, RouteragError>;
}

/// OpenAI-compatible chat completions client.
///
/// Works with any provider that exposes `{base_url}/chat/completions`:
/// OpenAI, Ollama, vLLM, LiteLLM, etc.
///
/// # Examples
///
/// ```
/// use routerag_core::LlmConfig;
/// use routerag_answer::llm::LlmClient;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let client = LlmClient::new(&config).unwrap();
/// assert_eq!(client.model(), "gpt-4o-mini");
/// ```
pub struct LlmClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    config: LlmConfig,
}

impl std::fmt::Debug for LlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmClient")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl LlmClient {
    /// Create a new LLM client from configuration.
    ///
    /// The API key comes from `llm.api_key`, falling back to `OPENAI_API_KEY`.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Config`] if no API key is available, or
    /// [`RouteragError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, RouteragError> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| {
                RouteragError::Config(format!(
                    "LLM API key not found: set llm.api_key in .routerag.toml or {API_KEY_ENV}"
                ))
            })?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| RouteragError::Llm(format!("failed to create HTTP client: {e}")))?;
        let base_url = config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();
        Ok(Self {
            client,
            api_key,
            base_url,
            config: config.clone(),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn request_body(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
        })
    }

    /// Send a chat completion request and return the text response.
    ///
    /// # Errors
    ///
    /// Returns [`RouteragError::Llm`] on HTTP errors or response parsing failures.
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String, RouteragError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.config.model, messages = messages.len(), "sending chat request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(messages))
            .send()
            .await
            .map_err(|e| RouteragError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            error!(%status, "chat completion request failed");
            return Err(RouteragError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RouteragError::Llm(format!("failed to parse response: {e}")))?;

        extract_content(&response_body)
    }
}

#[async_trait]
impl Completer for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, RouteragError> {
        let messages = [
            ChatMessage {
                role: Role::System,
                content: system.to_string(),
            },
            ChatMessage {
                role: Role::User,
                content: user.to_string(),
            },
        ];
        self.chat(&messages).await
    }
}

fn extract_content(body: &serde_json::Value) -> Result<String, RouteragError> {
    body.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|c| c.trim().to_string())
        .ok_or_else(|| RouteragError::Llm(format!("unexpected response structure: {body}")))
}
