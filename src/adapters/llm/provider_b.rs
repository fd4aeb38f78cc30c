//! CloudProviderB: an OpenAI chat-completions-shaped provider. Supports both
//! chat and `Embed` via the `/v1/embeddings` endpoint, grounded in the
//! teacher's `adapters::embeddings::openai` adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::adapters::llm::retry::{RequestRateLimiter, RetryPolicy};
use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::ports::llm_provider::{ChatOptions, ChatProvider, EmbedOptions};

const DEFAULT_BASE_URL: &str = "https://api.provider-b.example.com/v1";
const DEFAULT_CHAT_MODEL: &str = "provider-b-chat";
const DEFAULT_EMBED_MODEL: &str = "provider-b-embed";

pub struct CloudProviderB {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    default_chat_model: String,
    default_embed_model: String,
    retry: RetryPolicy,
    rate_limiter: RequestRateLimiter,
}

impl CloudProviderB {
    pub fn new(api_key: String, base_url: Option<String>) -> TaskWingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| TaskWingError::Fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_chat_model: DEFAULT_CHAT_MODEL.to_string(),
            default_embed_model: DEFAULT_EMBED_MODEL.to_string(),
            retry: RetryPolicy::default(),
            rate_limiter: RequestRateLimiter::per_second(10),
        })
    }

    fn classify_status(status: reqwest::StatusCode) -> Option<TaskWingError> {
        if status == reqwest::StatusCode::UNAUTHORIZED {
            Some(TaskWingError::Auth("provider-b rejected credentials".to_string()))
        } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Some(TaskWingError::Transient(format!("provider-b returned {status}")))
        } else {
            None
        }
    }
}

#[async_trait]
impl ChatProvider for CloudProviderB {
    fn name(&self) -> &'static str {
        "cloud_b"
    }

    async fn chat(&self, system: &str, user: &str, opts: &ChatOptions) -> TaskWingResult<String> {
        self.rate_limiter.acquire().await;
        let request = ChatRequest {
            model: opts.model.clone().unwrap_or_else(|| self.default_chat_model.clone()),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
        };

        let response = self
            .retry
            .execute(|| async {
                let response = self
                    .http
                    .post(format!("{}/chat/completions", self.base_url))
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| TaskWingError::Transient(format!("provider-b request failed: {e}")))?;

                let status = response.status();
                if let Some(err) = Self::classify_status(status) {
                    return Err(err);
                }
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(TaskWingError::Fatal(format!("provider-b returned {status}: {body}")));
                }
                response
                    .json::<ChatResponse>()
                    .await
                    .map_err(|e| TaskWingError::Fatal(format!("failed to parse provider-b response: {e}")))
            })
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| TaskWingError::Fatal("provider-b returned no choices".to_string()))
    }

    fn supports_embed(&self) -> bool {
        true
    }

    async fn embed(&self, text: &str, opts: &EmbedOptions) -> TaskWingResult<Vec<f32>> {
        self.rate_limiter.acquire().await;
        let request = EmbeddingRequest {
            model: opts.model.clone().unwrap_or_else(|| self.default_embed_model.clone()),
            input: text.to_string(),
        };

        let response = self
            .retry
            .execute(|| async {
                let response = self
                    .http
                    .post(format!("{}/embeddings", self.base_url))
                    .bearer_auth(&self.api_key)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| TaskWingError::Transient(format!("provider-b embed request failed: {e}")))?;

                let status = response.status();
                if let Some(err) = Self::classify_status(status) {
                    return Err(err);
                }
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(TaskWingError::Fatal(format!("provider-b returned {status}: {body}")));
                }
                response
                    .json::<EmbeddingResponse>()
                    .await
                    .map_err(|e| TaskWingError::Fatal(format!("failed to parse provider-b embed response: {e}")))
            })
            .await?;

        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| TaskWingError::Fatal("provider-b returned an empty embedding".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    model: String,
    input: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertises_embed_support() {
        let provider = CloudProviderB::new("key".to_string(), None).unwrap();
        assert!(provider.supports_embed());
    }
}
