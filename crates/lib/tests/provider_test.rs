//! # AI Provider Tests
//!
//! Runs the Gemini and OpenAI-compatible providers against a `wiremock`
//! server to check the request shape, the response decoding and the mapping
//! of HTTP error statuses to `PromptError` variants.

mod common;

use common::{setup_tracing, COMPLETE_RESPONSE};
use serde_json::json;
use std::time::Duration;
use trialsage::providers::ai::{gemini::GeminiProvider, local::LocalAiProvider, AiProvider};
use trialsage::providers::factory::{create_provider, ProviderConfig};
use trialsage::PromptError;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gemini_for(server: &MockServer) -> GeminiProvider {
    GeminiProvider::new(
        format!("{}/v1beta/models/test-model:generateContent", server.uri()),
        "test-key".to_string(),
        Some(Duration::from_secs(5)),
    )
    .unwrap()
}

#[tokio::test]
async fn test_gemini_sends_system_instruction_and_json_config() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    let body = json!({
        "candidates": [{ "content": { "parts": [{ "text": COMPLETE_RESPONSE }] } }]
    });
    Mock::given(method("POST"))
        .and(path("/v1beta/models/test-model:generateContent"))
        .and(query_param("key", "test-key"))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "SYSTEM" }] },
            "contents": [{ "parts": [{ "text": "USER" }] }],
            "generationConfig": { "responseMimeType": "application/json", "temperature": 0.0 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    // --- 2. Act ---
    let result = gemini_for(&server).generate("SYSTEM", "USER").await;

    // --- 3. Assert ---
    assert_eq!(result.unwrap(), COMPLETE_RESPONSE);
}

#[tokio::test]
async fn test_gemini_without_candidates_returns_empty_text() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    // --- 2. Act ---
    let result = gemini_for(&server).generate("SYSTEM", "USER").await;

    // --- 3. Assert ---
    assert_eq!(result.unwrap(), "");
}

#[tokio::test]
async fn test_unauthorized_status_is_mapped() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("API key not valid"))
        .mount(&server)
        .await;

    // --- 2. Act ---
    let result = gemini_for(&server).generate("SYSTEM", "USER").await;

    // --- 3. Assert ---
    match result {
        Err(PromptError::Unauthorized(body)) => assert_eq!(body, "API key not valid"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_rate_limit_status_is_mapped() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota exceeded"))
        .expect(1)
        .mount(&server)
        .await;

    // --- 2. Act ---
    let result = gemini_for(&server).generate("SYSTEM", "USER").await;

    // --- 3. Assert ---
    assert!(matches!(result, Err(PromptError::RateLimited(_))));
}

#[tokio::test]
async fn test_other_error_status_keeps_status_and_body() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    // --- 2. Act ---
    let result = gemini_for(&server).generate("SYSTEM", "USER").await;

    // --- 3. Assert ---
    match result {
        Err(PromptError::AiApi { status, body }) => {
            assert_eq!(status, 503);
            assert_eq!(body, "overloaded");
        }
        other => panic!("expected AiApi, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_body_is_a_deserialization_error() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    // --- 2. Act ---
    let result = gemini_for(&server).generate("SYSTEM", "USER").await;

    // --- 3. Assert ---
    assert!(matches!(result, Err(PromptError::AiDeserialization(_))));
}

#[tokio::test]
async fn test_local_provider_sends_chat_messages_with_bearer_key() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer local-key"))
        .and(body_partial_json(json!({
            "model": "llama-3",
            "temperature": 0.0,
            "stream": false,
            "messages": [
                { "role": "system", "content": "SYSTEM" },
                { "role": "user", "content": "USER" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "{\"phase\": \"Phase 1\"}" } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let provider = LocalAiProvider::new(
        format!("{}/v1/chat/completions", server.uri()),
        Some("local-key".to_string()),
        Some("llama-3".to_string()),
        None,
    )
    .unwrap();

    // --- 2. Act ---
    let result = provider.generate("SYSTEM", "USER").await;

    // --- 3. Assert ---
    assert_eq!(result.unwrap(), "{\"phase\": \"Phase 1\"}");
}

#[tokio::test]
async fn test_factory_builds_working_gemini_provider() {
    // --- 1. Arrange ---
    setup_tracing();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/custom"))
        .and(query_param("key", "factory-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "candidates": [{ "content": { "parts": [{ "text": "ok" }] } }]
        })))
        .mount(&server)
        .await;
    let config = ProviderConfig {
        provider: "gemini".to_string(),
        api_url: Some(format!("{}/custom", server.uri())),
        api_key: Some("factory-key".to_string()),
        model_name: "gemini-2.0-flash".to_string(),
    };

    // --- 2. Act ---
    let provider = create_provider(&config, None).unwrap();
    let result = provider.generate("SYSTEM", "USER").await;

    // --- 3. Assert ---
    assert_eq!(result.unwrap(), "ok");
}
