use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::ProxyError;
use crate::metrics::{UPSTREAM_FAILURES, UPSTREAM_RETRIES};
use crate::models::{ChatRequest, ChatResponse};
use crate::prompts::TaskPrompt;

/// How many times to try the provider and how long to wait in between.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(15),
        }
    }
}

impl RetryPolicy {
    // wait after the given (zero based) failed attempt: base * 2^attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Client for the chat-completions provider.
pub struct UpstreamClient {
    client: Client,
    url: String,
    api_key: String,
    policy: RetryPolicy,
}

impl UpstreamClient {
    pub fn new(client: Client, url: String, api_key: String, policy: RetryPolicy) -> Self {
        Self {
            client,
            url,
            api_key,
            policy,
        }
    }

    /// Runs one chat completion and returns the first choice's text.
    ///
    /// 429 responses and transport failures are retried with exponential
    /// backoff up to `max_attempts`. Any other non-success status fails
    /// straight away.
    pub async fn complete(&self, prompt: &TaskPrompt) -> Result<String, ProxyError> {
        let request = ChatRequest::from(prompt);
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error = ProxyError::Internal("upstream was never called".to_string());

        for attempt in 0..attempts {
            let result = self
                .client
                .post(&self.url)
                .bearer_auth(&self.api_key)
                .timeout(self.policy.attempt_timeout)
                .json(&request)
                .send()
                .await;

            match result {
                Ok(res) if res.status() == StatusCode::TOO_MANY_REQUESTS => {
                    last_error = ProxyError::Upstream {
                        status: res.status().as_u16(),
                        details: error_details(res).await,
                    };
                    tracing::warn!(attempt = attempt + 1, model = %request.model, "upstream rate limited");
                }
                Ok(res) if !res.status().is_success() => {
                    let status = res.status().as_u16();
                    tracing::warn!(status, model = %request.model, "upstream rejected request");
                    UPSTREAM_FAILURES.inc();
                    return Err(ProxyError::Upstream {
                        status,
                        details: error_details(res).await,
                    });
                }
                // body read failures are transport failures too
                Ok(res) => match res.bytes().await {
                    Ok(body) => return first_choice(&body),
                    Err(e) => {
                        tracing::warn!(attempt = attempt + 1, error = %e, "upstream body read failed");
                        last_error = ProxyError::Network(e.to_string());
                    }
                },
                Err(e) => {
                    tracing::warn!(attempt = attempt + 1, error = %e, "upstream request failed");
                    last_error = ProxyError::Network(e.to_string());
                }
            }

            if attempt + 1 < attempts {
                let delay = self.policy.backoff(attempt);
                UPSTREAM_RETRIES.inc();
                tracing::info!(?delay, next_attempt = attempt + 2, "retrying upstream call");
                sleep(delay).await;
            }
        }

        UPSTREAM_FAILURES.inc();
        tracing::error!(attempts, error = %last_error, "upstream retries exhausted");
        Err(last_error)
    }
}

// provider error body, as JSON when it parses
async fn error_details(res: Response) -> Value {
    let body = res.text().await.unwrap_or_default();
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

fn first_choice(body: &[u8]) -> Result<String, ProxyError> {
    let body: ChatResponse = serde_json::from_slice(body)
        .map_err(|e| ProxyError::Internal(format!("Failed to parse upstream response: {e}")))?;

    body.choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| ProxyError::Internal("Upstream returned no choices".to_string()))
}
