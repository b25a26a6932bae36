//! Health check endpoint.

use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    snapshot_store: SnapshotStoreHealth,
    active_sessions: usize,
}

#[derive(Serialize)]
pub struct SnapshotStoreHealth {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Health check endpoint
///
/// Checks that the snapshot directory is writable (pause/resume depends
/// on it) and reports the number of known sessions.
///
/// Returns 200 OK when healthy, 503 Service Unavailable otherwise.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let snapshot_store = match tokio::fs::create_dir_all(&state.snapshot_dir).await {
        Ok(()) => SnapshotStoreHealth {
            status: "ok".to_string(),
            error: None,
        },
        Err(e) => SnapshotStoreHealth {
            status: "error".to_string(),
            error: Some(format!("snapshot dir not writable: {e}")),
        },
    };

    let active_sessions = state.orchestrator.session_ids().await.len();

    let is_healthy = snapshot_store.status == "ok";
    let status_code = if is_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(HealthResponse {
            status: if is_healthy { "healthy" } else { "unhealthy" }.to_string(),
            snapshot_store,
            active_sessions,
        }),
    )
}
