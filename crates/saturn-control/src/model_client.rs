//! Model-call collaborator.
//!
//! The orchestrator hands a [`ModelClient`] the ordered prompt and the agent's
//! model configuration and gets back the reply text with token counts. Failures
//! and timeouts surface as `ControlError::LlmProvider`; nothing here ever
//! substitutes a reply.

use std::time::Duration;

use async_trait::async_trait;
use saturn_store::{MessageRole, ModelConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ControlError, Result};

/// One entry of the model input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMessage {
    /// Author role.
    pub role: MessageRole,
    /// Text content.
    pub content: String,
}

impl ModelMessage {
    /// Create a message.
    #[must_use]
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// The model's answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelReply {
    /// Reply text.
    pub text: String,
    /// Input tokens billed by the provider.
    pub tokens_in: u64,
    /// Output tokens billed by the provider.
    pub tokens_out: u64,
}

/// Trait for model providers.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a reply for the ordered `messages`.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::LlmProvider` if the provider fails or times out.
    async fn call(&self, messages: &[ModelMessage], config: &ModelConfig) -> Result<ModelReply>;
}

fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Offline provider that echoes the latest user message.
///
/// Token counts are whitespace word counts, never below one.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoModelClient;

#[async_trait]
impl ModelClient for EchoModelClient {
    async fn call(&self, messages: &[ModelMessage], _config: &ModelConfig) -> Result<ModelReply> {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map_or("", |m| m.content.as_str());

        let text = format!("Echo: {last_user}");
        Ok(ModelReply {
            tokens_in: word_count(last_user).max(1),
            tokens_out: word_count(&text).max(1),
            text,
        })
    }
}

/// Client for an OpenAI-compatible chat completions endpoint.
#[derive(Debug, Clone)]
pub struct HttpModelClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpModelClient {
    /// Create a new model client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Provider base URL (e.g., "https://api.openai.com")
    /// * `api_key` - Bearer token sent with every request, if any
    /// * `timeout` - Upper bound on a single completion request
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created.
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self::with_client(client, base_url, api_key)
    }

    /// Create a new model client with a custom reqwest client.
    #[must_use]
    pub fn with_client(
        client: reqwest::Client,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Get the base URL of the provider.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Request body for a chat completion.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ModelMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
}

#[async_trait]
impl ModelClient for HttpModelClient {
    async fn call(&self, messages: &[ModelMessage], config: &ModelConfig) -> Result<ModelReply> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let request = CompletionRequest {
            model: &config.model,
            messages,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ControlError::LlmProvider(format!("model request timed out: {e}"))
            } else {
                ControlError::LlmProvider(format!("model request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                model = %config.model,
                body = %body,
                "Model provider returned an error"
            );
            return Err(ControlError::LlmProvider(format!(
                "provider returned status {status}"
            )));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| ControlError::LlmProvider(format!("invalid provider response: {e}")))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ControlError::LlmProvider("provider returned no choices".into()))?;

        let (tokens_in, tokens_out) = completion.usage.map_or_else(
            || {
                let prompt: u64 = messages.iter().map(|m| word_count(&m.content)).sum();
                (prompt.max(1), word_count(&text).max(1))
            },
            |u| (u.prompt_tokens, u.completion_tokens),
        );

        tracing::debug!(model = %config.model, tokens_in, tokens_out, "Model call completed");

        Ok(ModelReply {
            text,
            tokens_in,
            tokens_out,
        })
    }
}
