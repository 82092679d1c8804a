//! Remote completion client
//!
//! Asks an OpenAI-compatible chat-completions endpoint whether a post shows a
//! trait. The worker only needs [`CompletionClient`]; [`OpenAiClient`] is the
//! HTTP implementation.

use crate::error::ScoringError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("traitscore/", env!("CARGO_PKG_VERSION"));

/// Source of one-word completions
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Send `prompt` as a single user message and return the completion text
    async fn complete(&self, prompt: &str) -> Result<String, ScoringError>;
}

/// Prompt asking whether `content` displays `trait_name`
pub fn build_prompt(trait_name: &str, content: &str) -> String {
    format!(
        "Does the text explicitly display {}? Reply with yes or no only. One word response.\n\n{}",
        trait_name, content
    )
}

/// Any answer containing "yes" (case-insensitive) scores 1, anything else 0
pub fn interpret_answer(answer: &str) -> u8 {
    u8::from(answer.to_lowercase().contains("yes"))
}

/// Request settings for [`OpenAiClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub api_base: String,
    pub model: String,
    pub max_completion_tokens: u32,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-5-nano".to_string(),
            max_completion_tokens: 10,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Chat-completions client bound to one API key
pub struct OpenAiClient {
    http_client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_completion_tokens: u32,
}

impl OpenAiClient {
    pub fn new(api_key: String, settings: &ClientSettings) -> Result<Self, ScoringError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| ScoringError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/chat/completions", settings.api_base.trim_end_matches('/')),
            api_key,
            model: settings.model.clone(),
            max_completion_tokens: settings.max_completion_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, ScoringError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_completion_tokens: self.max_completion_tokens,
        };

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ScoringError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScoringError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScoringError::Parse(e.to_string()))?;

        let text = completion.first_text().ok_or(ScoringError::EmptyResponse)?;
        debug!(answer = %text, "Completion received");
        Ok(text)
    }
}

// ============================================================================
// Chat Completions Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn first_text(self) -> Option<String> {
        self.choices.into_iter().next()?.message.content
    }
}
