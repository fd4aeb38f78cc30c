//! LocalProviderD: an Ollama-compatible local chat+embedding provider.
//! Requires no API key; `base_url` defaults to the conventional local
//! Ollama port.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::adapters::llm::retry::RetryPolicy;
use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::ports::llm_provider::{ChatOptions, ChatProvider, EmbedOptions};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_EMBED_MODEL: &str = "llama3";

pub struct LocalProviderD {
    http: reqwest::Client,
    base_url: String,
    default_model: String,
    default_embed_model: String,
    retry: RetryPolicy,
}

impl LocalProviderD {
    pub fn new(base_url: Option<String>) -> TaskWingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| TaskWingError::Fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_model: DEFAULT_MODEL.to_string(),
            default_embed_model: DEFAULT_EMBED_MODEL.to_string(),
            retry: RetryPolicy::default(),
        })
    }
}

#[async_trait]
impl ChatProvider for LocalProviderD {
    fn name(&self) -> &'static str {
        "local_d"
    }

    async fn chat(&self, system: &str, user: &str, opts: &ChatOptions) -> TaskWingResult<String> {
        let request = ChatRequest {
            model: opts.model.clone().unwrap_or_else(|| self.default_model.clone()),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            stream: false,
        };

        let response = self
            .retry
            .execute(|| async {
                let response = self
                    .http
                    .post(format!("{}/api/chat", self.base_url))
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| TaskWingError::Transient(format!("local provider unreachable: {e}")))?;

                let status = response.status();
                if status.is_server_error() {
                    return Err(TaskWingError::Transient(format!("local provider returned {status}")));
                }
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(TaskWingError::Fatal(format!("local provider returned {status}: {body}")));
                }
                response
                    .json::<ChatResponse>()
                    .await
                    .map_err(|e| TaskWingError::Fatal(format!("failed to parse local provider response: {e}")))
            })
            .await?;

        Ok(response.message.content)
    }

    fn supports_embed(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str, opts: &EmbedOptions) -> TaskWingResult<Vec<f32>> {
        let request = EmbedRequest {
            model: opts.model.clone().unwrap_or_else(|| self.default_embed_model.clone()),
            prompt: text.to_string(),
        };

        let response = self
            .retry
            .execute(|| async {
                let response = self
                    .http
                    .post(format!("{}/api/embeddings", self.base_url))
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| TaskWingError::Transient(format!("local provider unreachable: {e}")))?;

                let status = response.status();
                if status.is_server_error() {
                    return Err(TaskWingError::Transient(format!("local provider returned {status}")));
                }
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(TaskWingError::Fatal(format!("local provider returned {status}: {body}")));
                }
                response
                    .json::<EmbedResponse>()
                    .await
                    .map_err(|e| TaskWingError::Fatal(format!("failed to parse local provider embed response: {e}")))
            })
            .await?;

        Ok(response.embedding)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Message,
}

#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertises_embed_support_without_api_key() {
        let provider = LocalProviderD::new(None).unwrap();
        assert!(provider.supports_embed());
    }
}
