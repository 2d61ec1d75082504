//! API Client for the remote chat-completion service
//!
//! One request per call: `{ model, messages: [{ role: "user", content }] }`
//! with a bearer credential, answered by `choices[0].message.content`.
//! Every attempt passes through the rate limiter first; a 429 sleeps for
//! `Retry-After` (default 60 s) and starts over, up to the configured retry
//! bound. Nothing else is retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::rate_limiter::RateLimiter;
use super::tokens::estimate_tokens;
use crate::config::{ApiConfig, ENV_API_KEY, ENV_API_URL};
use crate::error::{Error, Result};

/// Wait applied to a 429 without a usable `Retry-After` header
pub const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Body fragments that identify a context-window overflow
const TOKEN_LIMIT_MARKERS: &[&str] = &[
    "context_length_exceeded",
    "maximum context length",
    "context window",
    "token limit",
    "too many tokens",
    "tokens exceed",
];

/// Anything that can turn (content, prompt) into a completion for a model
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, content: &str, prompt: &str, model: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessageRequest>,
}

#[derive(Debug, Serialize)]
struct ChatMessageRequest {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

/// reqwest-backed client for an OpenAI-compatible chat-completions endpoint
pub struct ApiClient {
    config: ApiConfig,
    limiter: Arc<RateLimiter>,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(config: ApiConfig, limiter: Arc<RateLimiter>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|e| {
                log::warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });

        Self {
            config,
            limiter,
            client,
        }
    }

    /// Check if endpoint and credential are configured
    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::configuration(format!("{} is not set", ENV_API_URL)))?;
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::configuration(format!("{} is not set", ENV_API_KEY)))?;
        Ok((endpoint, api_key))
    }
}

#[async_trait]
impl CompletionClient for ApiClient {
    async fn complete(&self, content: &str, prompt: &str, model: &str) -> Result<String> {
        let (endpoint, api_key) = self.credentials()?;

        let message = format!("{}\n\n{}", prompt, content);
        let request = ChatRequest {
            model,
            messages: vec![ChatMessageRequest {
                role: "user",
                content: message,
            }],
        };

        let mut rate_limited: u32 = 0;
        loop {
            self.limiter.admit(model).await;

            log::debug!(
                "Completion request: model={}, chars={}",
                model,
                request.messages[0].content.chars().count()
            );

            let response = self
                .client
                .post(endpoint)
                .bearer_auth(api_key)
                .json(&request)
                .send()
                .await?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs = retry_after(response.headers());
                if let Some(max) = self.config.max_rate_limit_retries {
                    if rate_limited >= max {
                        log::error!(
                            "Rate limited by upstream {} times for {}, giving up",
                            rate_limited + 1,
                            model
                        );
                        return Err(Error::RateLimited { retry_after_secs });
                    }
                }
                rate_limited += 1;
                log::warn!(
                    "Rate limited by upstream for {}, retrying in {}s (attempt {})",
                    model,
                    retry_after_secs,
                    rate_limited
                );
                tokio::time::sleep(Duration::from_secs(retry_after_secs)).await;
                continue;
            }

            let body = response
                .text()
                .await
                .map_err(|e| Error::network(format!("Failed to read response: {}", e)))?;

            if !status.is_success() {
                if is_token_limit_error(status, &body) {
                    return Err(Error::token_limit(format!(
                        "{} rejected the request as too long: {}",
                        model,
                        preview(&body)
                    )));
                }
                return Err(Error::upstream(status.as_u16(), preview(&body)));
            }

            let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
                Error::upstream(
                    status.as_u16(),
                    format!("Failed to parse response: {}. Raw: {}", e, preview(&body)),
                )
            })?;

            let text = parsed
                .choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .ok_or_else(|| {
                    Error::upstream(status.as_u16(), "Response has no choices[0].message.content")
                })?;

            let input_tokens = parsed
                .usage
                .as_ref()
                .and_then(|u| u.prompt_tokens)
                .unwrap_or_else(|| estimate_tokens(&request.messages[0].content));
            let output_tokens = parsed
                .usage
                .as_ref()
                .and_then(|u| u.completion_tokens)
                .unwrap_or_else(|| estimate_tokens(&text));
            self.limiter.record(model, input_tokens, output_tokens).await;

            log::debug!(
                "Completion response: model={}, input_tokens={}, output_tokens={}",
                model,
                input_tokens,
                output_tokens
            );
            return Ok(text);
        }
    }
}

/// Seconds to wait from a `Retry-After` header
fn retry_after(headers: &HeaderMap) -> u64 {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

/// 413, or a 400 whose body names the context window. Server errors never
/// count, whatever their message says.
fn is_token_limit_error(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return true;
    }
    if status != StatusCode::BAD_REQUEST {
        return false;
    }
    let body = body.to_lowercase();
    TOKEN_LIMIT_MARKERS.iter().any(|m| body.contains(m))
}

fn preview(body: &str) -> String {
    body.chars().take(500).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER_SECS);

        headers.insert(RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after(&headers), 7);

        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after(&headers), DEFAULT_RETRY_AFTER_SECS);
    }

    #[test]
    fn test_token_limit_detection() {
        assert!(is_token_limit_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":"context_length_exceeded"}}"#
        ));
        assert!(is_token_limit_error(
            StatusCode::BAD_REQUEST,
            "This model's Maximum Context Length is 8192 tokens"
        ));
        assert!(is_token_limit_error(StatusCode::PAYLOAD_TOO_LARGE, ""));
        assert!(!is_token_limit_error(StatusCode::BAD_REQUEST, "invalid model"));
        assert!(!is_token_limit_error(StatusCode::INTERNAL_SERVER_ERROR, "oops"));
        assert!(!is_token_limit_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal error while checking token limit"
        ));
        assert!(!is_token_limit_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "maximum context length exceeded"
        ));
    }

    #[test]
    fn test_preview_truncates() {
        assert_eq!(preview(&"a".repeat(1000)).len(), 500);
        assert_eq!(preview("short"), "short");
    }
}
