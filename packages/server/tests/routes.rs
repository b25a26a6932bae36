//! Router-level tests against a mock-backed orchestrator.

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::util::ServiceExt;
use uuid::Uuid;

use discovery::testing::{candidate, MockExtractor, MockExtractorFactory, MockSource, MockSourceProvider, TEST_API_KEY};
use discovery::{MemorySessionStore, MemorySnapshotStore, Orchestrator};
use server_core::{build_app, AppState};

fn test_app() -> (Router, Arc<Orchestrator>) {
    let source = MockSource::new("mock").with_fallback(vec![candidate(
        "mock",
        "https://example.com/j/1",
        "Engineer",
        "Acme",
    )]);
    let provider = MockSourceProvider::new().with_source(Arc::new(source));

    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(MemorySessionStore::new()),
        Arc::new(MemorySnapshotStore::new()),
        Arc::new(provider),
        Arc::new(MockExtractorFactory::new(MockExtractor::new())),
    ));

    let state = AppState {
        orchestrator: orchestrator.clone(),
        snapshot_dir: std::env::temp_dir()
            .join("discovery-route-tests")
            .to_string_lossy()
            .into_owned(),
    };
    (build_app(state, &[]), orchestrator)
}

fn json_post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn settings_body() -> serde_json::Value {
    serde_json::json!({
        "search_terms": ["rust developer"],
        "sources": ["mock"],
        "llm": { "api_key": TEST_API_KEY }
    })
}

#[tokio::test]
async fn health_returns_ok() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn start_rejects_invalid_settings() {
    let (app, _) = test_app();
    let body = serde_json::json!({
        "search_terms": [],
        "sources": ["mock"],
        "llm": { "api_key": TEST_API_KEY }
    });
    let response = app
        .oneshot(json_post("/api/search/start", body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn start_rejects_unknown_source() {
    let (app, _) = test_app();
    let body = serde_json::json!({
        "search_terms": ["rust"],
        "sources": ["craigslist"],
        "llm": { "api_key": TEST_API_KEY }
    });
    let response = app
        .oneshot(json_post("/api/search/start", body))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn progress_unknown_session_is_not_found() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/search/progress/{}", Uuid::new_v4()))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pause_and_stop_unknown_session_are_not_found() {
    let (app, _) = test_app();
    for action in ["pause", "stop"] {
        let response = app
            .clone()
            .oneshot(json_post(
                &format!("/api/search/{action}/{}", Uuid::new_v4()),
                serde_json::json!({}),
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{action}");
    }
}

#[tokio::test]
async fn resume_without_snapshot_is_not_found() {
    let (app, _) = test_app();
    let response = app
        .oneshot(json_post(
            &format!("/api/search/resume/{}", Uuid::new_v4()),
            settings_body(),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn start_then_progress_roundtrip() {
    let (app, orchestrator) = test_app();

    let response = app
        .clone()
        .oneshot(json_post("/api/search/start", settings_body()))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let start: serde_json::Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(start["success"], true);
    let session_id: Uuid = start["session_id"]
        .as_str()
        .expect("session id")
        .parse()
        .expect("uuid");

    // Let the mock-backed pipeline finish, then poll.
    orchestrator.join(session_id).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/search/progress/{session_id}"))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let progress: serde_json::Value = serde_json::from_slice(&body).expect("json");
    assert_eq!(progress["status"], "completed");
    assert_eq!(progress["is_complete"], true);
    assert_eq!(progress["can_stop"], false);
    assert_eq!(progress["stages"]["collecting"]["status"], "completed");
    assert_eq!(progress["enrichment_stats"]["total_enriched"], 1);
}
