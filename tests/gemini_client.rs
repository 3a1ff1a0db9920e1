//! Gemini REST client tests against a local mock server.
//!
//! Run with:
//!   cargo test --test gemini_client

use edgequake_web2md::pipeline::gemini::GeminiClient;
use edgequake_web2md::{ExtractionError, ScrapeConfig, TextGenerator};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-1.5-flash:generateContent";

fn client(server: &MockServer) -> GeminiClient {
    let config = ScrapeConfig::builder()
        .api_base_url(format!("{}/v1beta", server.uri()))
        .api_timeout_secs(5)
        .build()
        .unwrap();
    GeminiClient::from_config(&config, "test-key")
}

fn text_response(parts: &[&str]) -> serde_json::Value {
    let parts: Vec<_> = parts.iter().map(|t| json!({ "text": t })).collect();
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": parts },
            "finishReason": "STOP"
        }],
        "usageMetadata": {
            "promptTokenCount": 120,
            "candidatesTokenCount": 8,
            "totalTokenCount": 128
        }
    })
}

#[tokio::test]
async fn test_generate_sends_key_system_and_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "be terse" }] },
            "contents": [{ "role": "user", "parts": [{ "text": "<p>Hi</p>" }] }],
            "generationConfig": { "maxOutputTokens": 8192 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(text_response(&["# Hi"])))
        .expect(1)
        .mount(&server)
        .await;

    let generation = client(&server).generate("be terse", "<p>Hi</p>").await.unwrap();
    assert_eq!(generation.text, "# Hi");
    assert_eq!(generation.input_tokens, 120);
    assert_eq!(generation.output_tokens, 8);
}

#[tokio::test]
async fn test_generate_concatenates_parts() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(text_response(&["# Title\n\n", "Body"])),
        )
        .mount(&server)
        .await;

    let generation = client(&server).generate("s", "p").await.unwrap();
    assert_eq!(generation.text, "# Title\n\nBody");
}

#[tokio::test]
async fn test_invalid_key_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "code": 400,
                "message": "API key not valid. Please pass a valid API key.",
                "status": "INVALID_ARGUMENT",
                "details": [{ "reason": "API_KEY_INVALID" }]
            }
        })))
        .mount(&server)
        .await;

    let err = client(&server).generate("s", "p").await.unwrap_err();
    match err {
        ExtractionError::Auth { detail, .. } => assert!(detail.contains("API key not valid")),
        other => panic!("expected Auth, got {other:?}"),
    }
}

#[tokio::test]
async fn test_forbidden_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
        .mount(&server)
        .await;

    let err = client(&server).generate("s", "p").await.unwrap_err();
    assert!(matches!(err, ExtractionError::Auth { .. }));
}

#[tokio::test]
async fn test_quota_is_rate_limited() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).generate("s", "p").await.unwrap_err();
    assert!(matches!(err, ExtractionError::RateLimited { .. }));
    // No retry: the mock's expect(1) is verified when the server drops.
}

#[tokio::test]
async fn test_server_error_keeps_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = client(&server).generate("s", "p").await.unwrap_err();
    match err {
        ExtractionError::Api { status, message, .. } => {
            assert_eq!(status, Some(503));
            assert_eq!(message, "overloaded");
        }
        other => panic!("expected Api, got {other:?}"),
    }
}

#[tokio::test]
async fn test_blocked_prompt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    let err = client(&server).generate("s", "p").await.unwrap_err();
    match err {
        ExtractionError::Blocked { reason, .. } => assert_eq!(reason, "SAFETY"),
        other => panic!("expected Blocked, got {other:?}"),
    }
}

#[tokio::test]
async fn test_safety_finish_reason_is_blocked() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        })))
        .mount(&server)
        .await;

    let err = client(&server).generate("s", "p").await.unwrap_err();
    assert!(matches!(err, ExtractionError::Blocked { .. }));
}

#[tokio::test]
async fn test_no_candidates_is_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let err = client(&server).generate("s", "p").await.unwrap_err();
    assert!(matches!(err, ExtractionError::EmptyResponse { .. }));
}

#[tokio::test]
async fn test_garbage_body_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = client(&server).generate("s", "p").await.unwrap_err();
    assert!(matches!(err, ExtractionError::InvalidResponse { .. }));
}

#[tokio::test]
async fn test_slow_api_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(text_response(&["late"]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let err = client(&server)
        .with_timeout(Duration::from_millis(200))
        .generate("s", "p")
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractionError::Timeout { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_unreachable_host_is_network_error() {
    // Port 9 (discard) on localhost is closed on any sane test machine.
    let client = GeminiClient::new("k", "gemini-1.5-flash")
        .with_base_url("http://127.0.0.1:9/v1beta")
        .with_timeout(Duration::from_secs(5));
    let err = client.generate("s", "p").await.unwrap_err();
    assert!(
        matches!(err, ExtractionError::Network { .. }),
        "got {err:?}"
    );
}
