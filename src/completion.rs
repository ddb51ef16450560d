//! OpenAI-compatible chat-completion client.
//!
//! Posts `{model, messages}` to `{base_url}/chat/completions` with a
//! per-call bearer credential and returns `choices[0].message.content`.
//!
//! # Error Mapping
//!
//! | Condition | Error |
//! |-----------|-------|
//! | HTTP 401 / 403 | `AuthenticationFailed` |
//! | HTTP 429 | `RateLimited` |
//! | client timeout | `GenerationTimeout` |
//! | other status, transport error, missing content | `GenerationFailed` |
//!
//! The client never retries; see [`crate::ask::ask_with_retry`].

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use csv_rag_core::error::RagError;
use csv_rag_core::generate::{ChatMessage, CompletionClient};

use crate::config::GenerationConfig;

pub struct ChatCompletionClient {
    base_url: String,
    model: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionClient {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl CompletionClient for ChatCompletionClient {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        credential: &str,
    ) -> csv_rag_core::Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "sending chat completion");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(credential.trim())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(status_error(status, body_text));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RagError::GenerationTimeout(self.timeout_secs)
            } else {
                RagError::GenerationFailed {
                    status: Some(status.as_u16()),
                    message: format!("invalid completion response: {}", e),
                }
            }
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::GenerationFailed {
                status: Some(status.as_u16()),
                message: "completion response had no message content".to_string(),
            })
    }
}

impl ChatCompletionClient {
    fn transport_error(&self, e: reqwest::Error) -> RagError {
        if e.is_timeout() {
            RagError::GenerationTimeout(self.timeout_secs)
        } else {
            RagError::GenerationFailed {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            }
        }
    }
}

fn status_error(status: StatusCode, body: String) -> RagError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RagError::AuthenticationFailed(format!("{}: {}", status, body))
        }
        StatusCode::TOO_MANY_REQUESTS => RagError::RateLimited(format!("{}: {}", status, body)),
        _ => RagError::GenerationFailed {
            status: Some(status.as_u16()),
            message: body,
        },
    }
}
