//! CloudProviderA: an Anthropic Messages-API-shaped chat provider.
//! Chat only; does not implement `Embed`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::adapters::llm::retry::{RequestRateLimiter, RetryPolicy};
use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::ports::llm_provider::{ChatOptions, ChatProvider};

const DEFAULT_BASE_URL: &str = "https://api.provider-a.example.com";
const DEFAULT_MODEL: &str = "provider-a-large";

pub struct CloudProviderA {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
    retry: RetryPolicy,
    rate_limiter: RequestRateLimiter,
}

impl CloudProviderA {
    pub fn new(api_key: String, base_url: Option<String>) -> TaskWingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| TaskWingError::Fatal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            default_model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
            rate_limiter: RequestRateLimiter::per_second(5),
        })
    }

    async fn send(&self, request: &MessageRequest) -> TaskWingResult<MessageResponse> {
        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(request)
            .send()
            .await
            .map_err(|e| TaskWingError::Transient(format!("provider-a request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TaskWingError::Auth("provider-a rejected credentials".to_string()));
        }
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(TaskWingError::Transient(format!("provider-a returned {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TaskWingError::Fatal(format!("provider-a returned {status}: {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| TaskWingError::Fatal(format!("failed to parse provider-a response: {e}")))
    }
}

#[async_trait]
impl ChatProvider for CloudProviderA {
    fn name(&self) -> &'static str {
        "cloud_a"
    }

    async fn chat(&self, system: &str, user: &str, opts: &ChatOptions) -> TaskWingResult<String> {
        self.rate_limiter.acquire().await;
        let request = MessageRequest {
            model: opts.model.clone().unwrap_or_else(|| self.default_model.clone()),
            system: system.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: user.to_string(),
            }],
            max_tokens: opts.max_tokens.unwrap_or(4096),
            temperature: opts.temperature,
        };

        let response = self.retry.execute(|| self.send(&request)).await?;
        response
            .content
            .into_iter()
            .next()
            .map(|b| b.text)
            .ok_or_else(|| TaskWingError::Fatal("provider-a returned an empty response".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    system: String,
    messages: Vec<Message>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn does_not_advertise_embed_support() {
        let provider = CloudProviderA::new("key".to_string(), None).unwrap();
        assert!(!provider.supports_embed());
    }
}
