//! Integration tests for the chat-completion client against a mock server

use std::sync::Arc;

use chunkpipe_core::services::rate_limiter::WindowUsage;
use chunkpipe_core::{
    ApiClient, ApiConfig, CompletionClient, Error, ModelDescriptor, ModelRegistry, RateLimiter,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MODEL: &str = "test-model";

fn limiter() -> Arc<RateLimiter> {
    let registry = ModelRegistry::from_descriptors([ModelDescriptor::new(MODEL, 10_000, 100)]);
    Arc::new(RateLimiter::new(Arc::new(registry)))
}

fn client_for(server: &MockServer, limiter: Arc<RateLimiter>) -> ApiClient {
    let config = ApiConfig::new(format!("{}/v1/chat/completions", server.uri()), "sk-test");
    ApiClient::new(config, limiter)
}

fn completion(text: &str) -> serde_json::Value {
    json!({
        "choices": [ { "message": { "role": "assistant", "content": text } } ],
        "usage": { "prompt_tokens": 12, "completion_tokens": 3 }
    })
}

#[tokio::test]
async fn test_successful_completion_records_usage() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("Authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": MODEL,
            "messages": [ { "role": "user", "content": "Summarize\n\nsome content" } ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("a summary")))
        .expect(1)
        .mount(&server)
        .await;

    let limiter = limiter();
    let client = client_for(&server, limiter.clone());

    let text = client.complete("some content", "Summarize", MODEL).await.unwrap();
    assert_eq!(text, "a summary");
    assert_eq!(
        limiter.usage(MODEL).await,
        Some(WindowUsage { requests: 1, tokens: 15 })
    );
}

#[tokio::test]
async fn test_missing_usage_falls_back_to_estimate() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [ { "message": { "content": "12345678" } } ]
        })))
        .mount(&server)
        .await;

    let limiter = limiter();
    let client = client_for(&server, limiter.clone());
    client.complete("abcdefgh", "pp", MODEL).await.unwrap();

    // "pp\n\nabcdefgh" is 12 chars -> 3 tokens, "12345678" -> 2 tokens
    assert_eq!(
        limiter.usage(MODEL).await,
        Some(WindowUsage { requests: 1, tokens: 5 })
    );
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion("finally")))
        .expect(1)
        .mount(&server)
        .await;

    let limiter = limiter();
    let client = client_for(&server, limiter.clone());

    let text = client.complete("c", "p", MODEL).await.unwrap();
    assert_eq!(text, "finally");
    // Only the successful attempt is recorded
    assert_eq!(limiter.usage(MODEL).await.unwrap().requests, 1);
}

#[tokio::test]
async fn test_rate_limit_retries_are_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .expect(3)
        .mount(&server)
        .await;

    let mut config = ApiConfig::new(format!("{}/v1/chat/completions", server.uri()), "sk-test");
    config.max_rate_limit_retries = Some(2);
    let client = ApiClient::new(config, limiter());

    let err = client.complete("c", "p", MODEL).await.unwrap_err();
    assert!(matches!(err, Error::RateLimited { retry_after_secs: 0 }));
}

#[tokio::test]
async fn test_context_overflow_is_token_limit_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "This model's maximum context length is 8192 tokens.",
                "code": "context_length_exceeded"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, limiter());
    let err = client.complete("c", "p", MODEL).await.unwrap_err();
    assert!(matches!(err, Error::TokenLimitExceeded(_)));
}

#[tokio::test]
async fn test_server_error_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .expect(1)
        .mount(&server)
        .await;

    let limiter = limiter();
    let client = client_for(&server, limiter.clone());
    let err = client.complete("c", "p", MODEL).await.unwrap_err();
    match err {
        Error::Upstream { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "overloaded");
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
    assert!(limiter.usage(MODEL).await.map_or(true, |u| u.requests == 0));
}

#[tokio::test]
async fn test_server_error_mentioning_token_limit_stays_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string("token limit service unavailable"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, limiter());
    let err = client.complete("c", "p", MODEL).await.unwrap_err();
    assert!(
        matches!(err, Error::Upstream { status: 500, .. }),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_missing_completion_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let client = client_for(&server, limiter());
    let err = client.complete("c", "p", MODEL).await.unwrap_err();
    assert!(matches!(err, Error::Upstream { status: 200, .. }));
}

#[tokio::test]
async fn test_malformed_body_is_upstream_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = client_for(&server, limiter());
    let err = client.complete("c", "p", MODEL).await.unwrap_err();
    assert!(matches!(err, Error::Upstream { .. }));
}

#[tokio::test]
async fn test_missing_configuration_fails_without_request() {
    let client = ApiClient::new(ApiConfig::default(), limiter());
    assert!(!client.is_configured());

    let err = client.complete("c", "p", MODEL).await.unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}

#[tokio::test]
async fn test_unreachable_endpoint_is_network_error() {
    // Port 9 (discard) is not served in the test environment
    let config = ApiConfig::new("http://127.0.0.1:9/v1/chat/completions", "sk-test");
    let client = ApiClient::new(config, limiter());

    let err = client.complete("c", "p", MODEL).await.unwrap_err();
    assert!(matches!(err, Error::Network(_)), "got {:?}", err);
}
