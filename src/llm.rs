use crate::config::AppConfig;
use crate::types::{PostsmithError, Result};
use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// One completion request against the model boundary. Components build these;
/// they never touch the wire format.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Seam for the hosted model API. Production code uses [`OpenAiClient`];
/// tests script a [`MockLlmClient`].
#[async_trait]
pub trait LlmClient: Send + Sync {
    fn client_name(&self) -> String;

    /// Run one blocking completion and return the generated text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}

// Wire types for the OpenAI-compatible chat completions endpoint. Responses
// are deserialized strictly right after the call; nothing downstream sees
// untyped payloads.

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    max_retries: u32,
    retry_delay_secs: u64,
}

impl OpenAiClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.api_base_url.clone(),
            max_retries: config.max_retries,
            retry_delay_secs: config.retry_delay_secs,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    async fn send_once(&self, request: &ChatCompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(request)
            .send()
            .await?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                let body = response.text().await.unwrap_or_default();
                return Err(PostsmithError::Auth(format!("HTTP {}: {}", status, body)));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let seconds = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(self.retry_delay_secs);
                return Err(PostsmithError::RateLimited { seconds });
            }
            s if !s.is_success() => {
                let body = response.text().await.unwrap_or_default();
                return Err(PostsmithError::ExternalService(format!(
                    "HTTP {}: {}",
                    status, body
                )));
            }
            _ => {}
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            PostsmithError::MalformedResponse(format!("completion body did not parse: {}", e))
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| {
                PostsmithError::MalformedResponse("completion had no choices".to_string())
            })?;

        if text.trim().is_empty() {
            return Err(PostsmithError::MalformedResponse(
                "completion text was empty".to_string(),
            ));
        }

        Ok(text)
    }
}

fn is_retryable(error: &PostsmithError) -> bool {
    match error {
        PostsmithError::RateLimited { .. } | PostsmithError::ExternalService(_) => true,
        PostsmithError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
        _ => false,
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn client_name(&self) -> String {
        format!("OpenAI-compatible ({})", self.base_url)
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let wire_request = ChatCompletionRequest {
            model: request.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: request.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt.clone(),
                },
            ],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let mut backoff: ExponentialBackoff<backoff::SystemClock> = ExponentialBackoff {
            current_interval: Duration::from_secs(self.retry_delay_secs),
            initial_interval: Duration::from_secs(self.retry_delay_secs),
            max_interval: Duration::from_secs(self.retry_delay_secs.max(1) * 16),
            multiplier: 2.0,
            max_elapsed_time: None,
            ..Default::default()
        };

        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            debug!(
                "calling {} (model={}, attempt={})",
                self.completions_url(),
                request.model,
                attempt + 1
            );

            match self.send_once(&wire_request).await {
                Ok(text) => return Ok(text),
                Err(e) if is_retryable(&e) && attempt < self.max_retries => {
                    let delay = match &e {
                        PostsmithError::RateLimited { seconds } => Duration::from_secs(*seconds),
                        _ => backoff.next_backoff().unwrap_or(Duration::from_secs(1)),
                    };
                    warn!(
                        "attempt {} failed ({}), retrying in {:?}",
                        attempt + 1,
                        e,
                        delay
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            PostsmithError::ExternalService("request failed with no recorded error".to_string())
        }))
    }
}

/// Scripted model for tests: replies are popped in order, then a fallback is
/// reused. Optionally fails the first N calls to exercise retry paths.
pub struct MockLlmClient {
    replies: std::sync::Mutex<std::collections::VecDeque<String>>,
    fallback: String,
    fail_first: std::sync::Mutex<u32>,
    pub calls: std::sync::Mutex<Vec<ChatRequest>>,
}

impl MockLlmClient {
    pub fn new(fallback: impl Into<String>) -> Self {
        Self {
            replies: std::sync::Mutex::new(std::collections::VecDeque::new()),
            fallback: fallback.into(),
            fail_first: std::sync::Mutex::new(0),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn with_replies<I, S>(mut self, replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.replies = std::sync::Mutex::new(replies.into_iter().map(Into::into).collect());
        self
    }

    pub fn failing_first(self, count: u32) -> Self {
        *self.fail_first.lock().unwrap() = count;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    fn client_name(&self) -> String {
        "mock".to_string()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.calls.lock().unwrap().push(request.clone());

        {
            let mut remaining = self.fail_first.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(PostsmithError::ExternalService(
                    "scripted failure".to_string(),
                ));
            }
        }

        let next = self.replies.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| self.fallback.clone()))
    }
}
