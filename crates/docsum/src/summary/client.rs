//! Clients for the remote summarization API.
//!
//! The worker only sees the [`Summarizer`] trait. [`ChatCompletionsSummarizer`]
//! talks to any OpenAI-compatible `/chat/completions` endpoint; DeepSeek is the
//! default.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Longest slice of an error response body kept in [`SummarizerError::Api`].
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Debug, Error)]
pub enum SummarizerError {
    #[error("failed to reach summarization API: {0}")]
    Transport(String),

    #[error("summarization API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("malformed summarization response: {0}")]
    InvalidResponse(String),

    #[error("summarization timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone)]
pub struct SummaryRequest {
    /// Document text, already truncated to the content budget.
    pub content: String,
    /// Upper bound on summary length, in characters.
    pub max_length: usize,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: SummaryRequest) -> Result<String, SummarizerError>;
}

pub struct ChatCompletionsSummarizer {
    http: Client,
    api_url: String,
    model: String,
    api_key: SecretString,
    timeout: Duration,
}

impl ChatCompletionsSummarizer {
    pub fn new(
        api_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
    ) -> Result<Self, SummarizerError> {
        let http = Client::builder()
            .user_agent(concat!("docsum/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| SummarizerError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            model: model.into(),
            api_key,
            timeout,
        })
    }
}

fn system_prompt(max_length: usize) -> String {
    format!(
        "You are a professional document summarization assistant. Write a concise summary \
         of the following content in no more than {max_length} characters, highlighting \
         the most important information."
    )
}

fn truncate_body(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl Summarizer for ChatCompletionsSummarizer {
    async fn summarize(&self, request: SummaryRequest) -> Result<String, SummarizerError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt(request.max_length) },
                { "role": "user", "content": request.content },
            ],
            "max_tokens": request.max_length,
        });

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    SummarizerError::Timeout(self.timeout)
                } else {
                    SummarizerError::Transport(error.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SummarizerError::Api {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let body: ChatResponse = response.json().await.map_err(|error| {
            SummarizerError::InvalidResponse(format!("failed to decode response: {error}"))
        })?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SummarizerError::InvalidResponse("response has no choices".into()))?;

        Ok(content.trim().to_string())
    }
}
