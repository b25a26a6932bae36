//! Router assembly and shared state.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use discovery::Orchestrator;

use crate::routes::{health, search};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub snapshot_dir: String,
}

/// Build the Axum application router.
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = if allowed_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/search/start", post(search::start_handler))
        .route(
            "/api/search/progress/:session_id",
            get(search::progress_handler),
        )
        .route("/api/search/pause/:session_id", post(search::pause_handler))
        .route("/api/search/stop/:session_id", post(search::stop_handler))
        .route(
            "/api/search/resume/:session_id",
            post(search::resume_handler),
        )
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
