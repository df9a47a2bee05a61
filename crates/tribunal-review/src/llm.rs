use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tribunal_core::{LlmConfig, TribunalError};

use crate::provider::{AnalysisProvider, StageRequest};

/// A message in a chat conversation with the LLM.
///
/// # Examples
///
/// ```
/// use tribunal_review::llm::{ChatMessage, Role};
///
/// let msg = ChatMessage {
///     role: Role::User,
///     content: "Review this change".into(),
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
    /// Assistant response.
    Assistant,
}

/// Analysis provider backed by an OpenAI-compatible chat completions API.
///
/// Works with any host exposing `{base_url}/chat/completions`: OpenAI,
/// Gemini's OpenAI endpoint, Ollama, vLLM, LiteLLM. Everything it needs is
/// taken from the [`LlmConfig`] given at construction.
///
/// # Examples
///
/// ```
/// use tribunal_core::LlmConfig;
/// use tribunal_review::llm::LlmProvider;
///
/// let config = LlmConfig {
///     api_key: Some("test-key".into()),
///     ..LlmConfig::default()
/// };
/// let provider = LlmProvider::new(&config).unwrap();
/// assert_eq!(provider.model(), "gemini-2.5-flash");
/// ```
pub struct LlmProvider {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmProvider {
    /// Create a provider from configuration.
    ///
    /// The HTTP client carries no timeout of its own; the pipeline bounds
    /// each call with the stage timeout.
    ///
    /// # Errors
    ///
    /// Returns [`TribunalError::Llm`] if the HTTP client cannot be built.
    pub fn new(config: &LlmConfig) -> Result<Self, TribunalError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| TribunalError::Llm(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Return the model name from the configuration.
    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Full chat completions endpoint for the configured provider.
    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.resolved_base_url())
    }

    /// Send a chat completion request and return the text response.
    ///
    /// # Errors
    ///
    /// Returns [`TribunalError::Llm`] on HTTP errors or response parsing failures.
    pub async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String, TribunalError> {
        let url = self.endpoint();

        let body = serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
        });

        let mut request = self.client.post(&url);
        if let Some(api_key) = &self.config.api_key {
            request = request.bearer_auth(api_key);
        }

        debug!(%url, model = %self.config.model, "sending chat completion request");
        let response = request
            .json(&body)
            .send()
            .await
            .map_err(|e| TribunalError::Llm(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(TribunalError::Llm(format!(
                "LLM API error {status}: {body_text}"
            )));
        }

        let response_body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TribunalError::Llm(format!("failed to parse response: {e}")))?;

        extract_content(&response_body)
    }
}

fn extract_content(response_body: &serde_json::Value) -> Result<String, TribunalError> {
    response_body
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            TribunalError::Llm(format!("unexpected response structure: {response_body}"))
        })
}

/// Chat messages for one stage: instructions as the system turn, context
/// as the user turn.
pub fn stage_messages(request: &StageRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: Role::System,
            content: request.instructions.clone(),
        },
        ChatMessage {
            role: Role::User,
            content: request.context.clone(),
        },
    ]
}

#[async_trait]
impl AnalysisProvider for LlmProvider {
    async fn analyze(&self, request: &StageRequest) -> Result<String, TribunalError> {
        self.chat(stage_messages(request)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_follows_provider() {
        let gemini = LlmProvider::new(&LlmConfig::default()).unwrap();
        assert_eq!(
            gemini.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions"
        );

        let local = LlmProvider::new(&LlmConfig {
            base_url: Some("http://localhost:8000/v1/".into()),
            ..LlmConfig::default()
        })
        .unwrap();
        assert_eq!(local.endpoint(), "http://localhost:8000/v1/chat/completions");
    }

    #[test]
    fn model_returns_config_model() {
        let config = LlmConfig {
            model: "gpt-4o-mini".into(),
            ..LlmConfig::default()
        };
        let provider = LlmProvider::new(&config).unwrap();
        assert_eq!(provider.model(), "gpt-4o-mini");
    }

    #[test]
    fn stage_messages_split_instructions_and_context() {
        let request = StageRequest {
            stage: "logic".into(),
            instructions: "Find bugs.".into(),
            context: "diff here".into(),
        };
        let messages = stage_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "Find bugs.");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "diff here");

        let json = serde_json::to_value(&messages[0]).unwrap();
        assert_eq!(json["role"], "system");
    }

    #[test]
    fn content_extracted_from_first_choice() {
        let body = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "No issues." } }]
        });
        assert_eq!(extract_content(&body).unwrap(), "No issues.");

        let err = extract_content(&serde_json::json!({ "error": "quota" })).unwrap_err();
        assert!(matches!(err, TribunalError::Llm(_)));
    }
}
