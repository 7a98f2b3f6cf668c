use std::sync::Arc;

use httpmock::prelude::*;
use krishi_mitra_rs::{
    backends::{self, GeminiChat, GeminiClient, GeminiDetector, HttpZeroShotScorer, LocalClassifier, TextGenerator},
    config::{BackendsConfig, CloudConfig},
    detection::{self, LeafImage},
    dispatch::{Backend, BackendOutcome},
    BackendError,
};
use serde_json::json;

const GENERATE_PATH: &str = "/models/gemini-1.5-flash:generateContent";

fn leaf() -> LeafImage {
    let mut png = Vec::new();
    image::DynamicImage::new_rgb8(8, 8)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageOutputFormat::Png)
        .unwrap();
    LeafImage::new("uploads/leaf.png", png, Some("image/png".into()))
}

fn gemini_reply(text: &str) -> serde_json::Value {
    json!({
        "candidates": [{
            "content": { "role": "model", "parts": [{ "text": text }] },
            "finishReason": "STOP"
        }]
    })
}

fn gemini_client(server: &MockServer) -> Arc<GeminiClient> {
    Arc::new(GeminiClient::new(
        reqwest::Client::new(),
        &server.base_url(),
        "gemini-1.5-flash",
        "test-key",
    ))
}

#[tokio::test]
async fn gemini_detection_parses_json_answer() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .query_param("key", "test-key")
                .body_contains("inline_data")
                .body_contains("image/png")
                .body_contains("application/json");
            then.status(200).json_body(gemini_reply(
                r#"{"disease": "Potato Late Blight", "confidence": 93, "treatments": ["Destroy infected tubers", "Spray mancozeb"]}"#,
            ));
        })
        .await;

    let backend = GeminiDetector::new(gemini_client(&server));
    match backend.invoke(&leaf()).await {
        BackendOutcome::Success(result) => {
            assert_eq!(result.disease, "Potato Late Blight");
            assert_eq!(result.confidence, 93.0);
            assert_eq!(result.treatments.len(), 2);
        }
        other => panic!("expected success, got {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn gemini_detection_with_malformed_json_fails() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200).json_body(gemini_reply("The leaf looks sick."));
        })
        .await;

    let backend = GeminiDetector::new(gemini_client(&server));
    assert!(matches!(backend.invoke(&leaf()).await, BackendOutcome::Failed(_)));
}

#[tokio::test]
async fn gemini_without_text_is_empty() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200).json_body(json!({ "candidates": [] }));
        })
        .await;

    let backend = GeminiDetector::new(gemini_client(&server));
    assert!(matches!(backend.invoke(&leaf()).await, BackendOutcome::Empty));
}

#[tokio::test]
async fn gemini_error_status_fails() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(403).body("API key not valid");
        })
        .await;

    let backend = GeminiChat::new(gemini_client(&server));
    assert!(matches!(backend.invoke("how to grow wheat").await, BackendOutcome::Failed(_)));
}

#[tokio::test]
async fn gemini_chat_wraps_query_in_instruction() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path(GENERATE_PATH)
                .body_contains("EXCLUSIVELY to agriculture")
                .body_contains("User Query: how to grow wheat");
            then.status(200)
                .json_body(gemini_reply("Sow wheat in well-drained loam after the monsoon."));
        })
        .await;

    let backend = GeminiChat::new(gemini_client(&server));
    match backend.invoke("how to grow wheat").await {
        BackendOutcome::Success(text) => assert!(text.starts_with("Sow wheat")),
        other => panic!("expected success, got {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn zero_shot_server_scores_map_back_to_labels() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/classify")
                .body_contains("candidate_labels")
                .body_contains("a photo of a plant with rice brown spot");
            then.status(200).json_body(json!([
                { "label": "a photo of a plant with healthy plant", "score": 0.82 },
                { "label": "a photo of a plant with apple scab", "score": 0.11 },
                { "label": "a photo of a plant with rice brown spot", "score": 0.07 }
            ]));
        })
        .await;

    let scorer = HttpZeroShotScorer::new(reqwest::Client::new(), &server.url("/classify"));
    let backend = LocalClassifier::new(scorer);
    match backend.invoke(&leaf()).await {
        BackendOutcome::Success(result) => {
            assert_eq!(result.disease, "Healthy Plant");
            assert_eq!(result.confidence, 82.0);
            assert_eq!(result.treatments, detection::treatments_for("healthy plant"));
        }
        other => panic!("expected success, got {:?}", other),
    }
    mock.assert_async().await;
}

#[tokio::test]
async fn text_generation_accepts_single_and_batch_replies() {
    let single = MockServer::start_async().await;
    single
        .mock_async(|when, then| {
            when.method(POST)
                .path("/generate")
                .body_contains("Answer this question about farming: what is mulching?")
                .body_contains("max_new_tokens");
            then.status(200)
                .json_body(json!({ "generated_text": "Covering soil with organic matter." }));
        })
        .await;

    let batch = MockServer::start_async().await;
    batch
        .mock_async(|when, then| {
            when.method(POST).path("/generate");
            then.status(200)
                .json_body(json!([{ "generated_text": "  Rotate crops yearly. " }]));
        })
        .await;

    let generator = TextGenerator::new(reqwest::Client::new(), &single.base_url());
    match generator.invoke("what is mulching?").await {
        BackendOutcome::Success(text) => assert_eq!(text, "Covering soil with organic matter."),
        other => panic!("expected success, got {:?}", other),
    }

    let generator = TextGenerator::new(reqwest::Client::new(), &format!("{}/", batch.base_url()));
    match generator.invoke("crop rotation").await {
        BackendOutcome::Success(text) => assert_eq!(text, "Rotate crops yearly."),
        other => panic!("expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn blank_generation_is_empty() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/generate");
            then.status(200).json_body(json!({ "generated_text": "   " }));
        })
        .await;

    let generator = TextGenerator::new(reqwest::Client::new(), &server.base_url());
    assert!(matches!(generator.invoke("hi").await, BackendOutcome::Empty));
}

#[tokio::test]
async fn local_server_error_pages_are_truncated() {
    let server = MockServer::start_async().await;
    let page = "x".repeat(4000);
    server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(500).body(page.as_str());
        })
        .await;

    let generator = TextGenerator::new(reqwest::Client::new(), &server.base_url());
    match generator.invoke("hi").await {
        BackendOutcome::Failed(BackendError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body.len(), 500);
        }
        other => panic!("expected status failure, got {:?}", other),
    }

    let scorer = HttpZeroShotScorer::new(reqwest::Client::new(), &server.url("/classify"));
    match LocalClassifier::new(scorer).invoke(&leaf()).await {
        BackendOutcome::Failed(BackendError::Status { body, .. }) => assert_eq!(body.len(), 500),
        other => panic!("expected status failure, got {:?}", other),
    }
}

fn configured(gemini: &MockServer, local: &MockServer) -> BackendsConfig {
    BackendsConfig {
        cloud: CloudConfig {
            api_key: Some("test-key".into()),
            base_url: gemini.base_url(),
            ..CloudConfig::default()
        },
        local_classifier_url: Some(local.url("/classify")),
        local_textgen_url: Some(local.base_url()),
        ..BackendsConfig::default()
    }
}

#[tokio::test]
async fn configured_chain_prefers_cloud_over_local_classifier() {
    let gemini = MockServer::start_async().await;
    let local = MockServer::start_async().await;

    let cloud_mock = gemini
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(200).json_body(gemini_reply(
                r#"{"disease": "Grape Esca", "confidence": 88, "treatments": ["Prune infected wood"]}"#,
            ));
        })
        .await;
    let local_mock = local
        .mock_async(|when, then| {
            when.method(POST).path("/classify");
            then.status(200)
                .json_body(json!([{ "label": "a photo of a plant with healthy plant", "score": 1.0 }]));
        })
        .await;

    let http = backends::build_http_client(None).unwrap();
    let chain = backends::detection_chain(&configured(&gemini, &local), &http).unwrap();
    let result = chain.dispatch(&leaf()).await;

    assert_eq!(result.disease, "Grape Esca");
    cloud_mock.assert_async().await;
    assert_eq!(local_mock.hits_async().await, 0);
}

#[tokio::test]
async fn configured_chain_falls_back_when_cloud_errors() {
    let gemini = MockServer::start_async().await;
    let local = MockServer::start_async().await;

    gemini
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(500).body("internal");
        })
        .await;
    let local_mock = local
        .mock_async(|when, then| {
            when.method(POST).path("/classify");
            then.status(200).json_body(json!([
                { "label": "a photo of a plant with tomato late blight", "score": 0.6 },
                { "label": "a photo of a plant with healthy plant", "score": 0.4 }
            ]));
        })
        .await;

    let http = backends::build_http_client(None).unwrap();
    let chain = backends::detection_chain(&configured(&gemini, &local), &http).unwrap();
    let result = chain.dispatch(&leaf()).await;

    assert_eq!(result.disease, "Tomato Late Blight");
    assert_eq!(result.confidence, 60.0);
    assert_eq!(result.treatments, detection::treatments_for("tomato late blight"));
    local_mock.assert_async().await;
}

#[tokio::test]
async fn chat_chain_reaches_rules_when_everything_fails() {
    let gemini = MockServer::start_async().await;
    let local = MockServer::start_async().await;

    gemini
        .mock_async(|when, then| {
            when.method(POST).path(GENERATE_PATH);
            then.status(503);
        })
        .await;
    local
        .mock_async(|when, then| {
            when.method(POST).path("/generate");
            then.status(500);
        })
        .await;

    let http = backends::build_http_client(None).unwrap();
    let chain = backends::chat_chain(&configured(&gemini, &local), &http);

    assert_eq!(
        chain.dispatch("Which crop suits sandy soil?").await,
        krishi_mitra_rs::chat::FARMING_PROMPT
    );
}
