//! Text-completion boundary and its HTTP implementation.
//!
//! [`HttpTextClient`] retries transient transport failures inside a single
//! `complete` call, per [`TextClientConfig::max_retries`]. That is the
//! client's own policy toward its service; callers see one completion or one
//! error and never re-run the request themselves.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::TextClientConfig;
use crate::error::{TextError, TextResult};

/// Upper bound on one backoff sleep.
const MAX_RETRY_DELAY: std::time::Duration = std::time::Duration::from_secs(5);

/// Opaque text-completion service.
#[async_trait]
pub trait TextCompletion: Send + Sync {
    /// Complete `prompt`, producing at most roughly `max_tokens` tokens.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> TextResult<String>;
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    prompt: &'a str,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    text: String,
}

/// JSON-over-HTTP completion client.
#[derive(Debug, Clone)]
pub struct HttpTextClient {
    client: Client,
    config: TextClientConfig,
}

impl HttpTextClient {
    pub fn new(config: TextClientConfig) -> TextResult<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TextClientConfig {
        &self.config
    }

    async fn attempt(&self, prompt: &str, max_tokens: u32) -> TextResult<String> {
        let mut request = self
            .client
            .post(self.config.endpoint.clone())
            .json(&CompletionRequest { prompt, max_tokens });
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TextError::Timeout(self.config.timeout)
            } else {
                TextError::Request(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TextError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| TextError::invalid_response(e.to_string()))?;
        let text = body.text.trim();
        if text.is_empty() {
            return Err(TextError::EmptyCompletion);
        }
        Ok(text.to_string())
    }

    /// Backoff before retry number `attempt` (1-based).
    fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        self.config
            .retry_base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            .min(MAX_RETRY_DELAY)
    }
}

#[async_trait]
impl TextCompletion for HttpTextClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> TextResult<String> {
        let mut attempt = 0u32;
        loop {
            match self.attempt(prompt, max_tokens).await {
                Ok(text) => {
                    debug!(chars = text.len(), attempts = attempt + 1, "Text completion received");
                    return Ok(text);
                }
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for_attempt(attempt);
                    warn!(attempt, ?delay, error = %e, "Text completion failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Completion source that always answers with the same text.
#[derive(Debug, Clone)]
pub struct StaticCompletion {
    text: String,
}

impl StaticCompletion {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl TextCompletion for StaticCompletion {
    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> TextResult<String> {
        Ok(self.text.clone())
    }
}
