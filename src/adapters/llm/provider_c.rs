//! CloudProviderC: a Gemini `generateContent`-shaped chat provider. Chat
//! only; does not implement `Embed`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::adapters::llm::retry::{RequestRateLimiter, RetryPolicy};
use crate::domain::error::{TaskWingError, TaskWingResult};
use crate::domain::ports::llm_provider::{ChatOptions, ChatProvider};

const DEFAULT_BASE_URL: &str = "https://api.provider-c.example.com/v1beta";
const DEFAULT_MODEL: &str = "provider-c-pro";

pub struct CloudProviderC {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    default_model: String,
    retry: RetryPolicy,
    rate_limiter: RequestRateLimiter,
}

impl CloudProviderC {
    pub fn new(api_key: String, base_url: Option<String>) -> TaskWingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(90))
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
}

#[async_trait]
impl ChatProvider for CloudProviderC {
    fn name(&self) -> &'static str {
        "cloud_c"
    }

    async fn chat(&self, system: &str, user: &str, opts: &ChatOptions) -> TaskWingResult<String> {
        self.rate_limiter.acquire().await;
        let model = opts.model.clone().unwrap_or_else(|| self.default_model.clone());
        let request = GenerateContentRequest {
            system_instruction: Content {
                parts: vec![Part { text: system.to_string() }],
            },
            contents: vec![Content {
                parts: vec![Part { text: user.to_string() }],
            }],
            generation_config: GenerationConfig {
                temperature: opts.temperature,
                max_output_tokens: opts.max_tokens,
            },
        };

        let response = self
            .retry
            .execute(|| async {
                let response = self
                    .http
                    .post(format!("{}/models/{}:generateContent", self.base_url, model))
                    .query(&[("key", self.api_key.as_str())])
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| TaskWingError::Transient(format!("provider-c request failed: {e}")))?;

                let status = response.status();
                if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
                    return Err(TaskWingError::Auth("provider-c rejected credentials".to_string()));
                }
                if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    return Err(TaskWingError::Transient(format!("provider-c returned {status}")));
                }
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    return Err(TaskWingError::Fatal(format!("provider-c returned {status}: {body}")));
                }
                response
                    .json::<GenerateContentResponse>()
                    .await
                    .map_err(|e| TaskWingError::Fatal(format!("failed to parse provider-c response: {e}")))
            })
            .await?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| TaskWingError::Fatal("provider-c returned no candidates".to_string()))
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    system_instruction: Content,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "maxOutputTokens")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}
