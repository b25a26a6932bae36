//! Control-surface handlers for search sessions.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use discovery::{OrchestratorError, ProgressReport, SearchSettings};

use crate::app::AppState;

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

fn status_for(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        OrchestratorError::InvalidSettings(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::NotResumable(_) | OrchestratorError::AlreadyActive(_) => {
            StatusCode::CONFLICT
        }
        OrchestratorError::Snapshot(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// POST /api/search/start
///
/// Validates settings, creates the session, and returns immediately with
/// its id; the pipeline runs in the background and progress is polled.
pub async fn start_handler(
    Extension(state): Extension<AppState>,
    Json(settings): Json<SearchSettings>,
) -> (StatusCode, Json<StartResponse>) {
    match state.orchestrator.start(settings).await {
        Ok(session_id) => (
            StatusCode::OK,
            Json(StartResponse {
                success: true,
                session_id: Some(session_id),
                message: "search started".to_string(),
            }),
        ),
        Err(err) => (
            status_for(&err),
            Json(StartResponse {
                success: false,
                session_id: None,
                message: err.to_string(),
            }),
        ),
    }
}

/// GET /api/search/progress/{session_id}
pub async fn progress_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<ProgressReport>, (StatusCode, Json<CommandResponse>)> {
    state
        .orchestrator
        .progress(session_id)
        .await
        .map(Json)
        .map_err(|err| {
            (
                status_for(&err),
                Json(CommandResponse {
                    success: false,
                    message: err.to_string(),
                }),
            )
        })
}

/// POST /api/search/pause/{session_id}
pub async fn pause_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<Uuid>,
) -> (StatusCode, Json<CommandResponse>) {
    match state.orchestrator.pause(session_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(CommandResponse {
                success: true,
                message: "pause requested; honored at the next checkpoint".to_string(),
            }),
        ),
        Ok(false) => (
            StatusCode::OK,
            Json(CommandResponse {
                success: false,
                message: "session is not running".to_string(),
            }),
        ),
        Err(err) => (
            status_for(&err),
            Json(CommandResponse {
                success: false,
                message: err.to_string(),
            }),
        ),
    }
}

/// POST /api/search/stop/{session_id}
pub async fn stop_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<Uuid>,
) -> (StatusCode, Json<CommandResponse>) {
    match state.orchestrator.stop(session_id).await {
        Ok(true) => (
            StatusCode::OK,
            Json(CommandResponse {
                success: true,
                message: "search stopped".to_string(),
            }),
        ),
        Ok(false) => (
            StatusCode::OK,
            Json(CommandResponse {
                success: false,
                message: "session is not running or paused".to_string(),
            }),
        ),
        Err(err) => (
            status_for(&err),
            Json(CommandResponse {
                success: false,
                message: err.to_string(),
            }),
        ),
    }
}

#[derive(Debug, Serialize)]
pub struct ResumeResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<Uuid>,
    pub message: String,
}

/// POST /api/search/resume/{session_id}
///
/// The body may carry fresh settings (typically a fresh credential); with
/// no body the snapshot's settings are reused.
pub async fn resume_handler(
    Extension(state): Extension<AppState>,
    Path(session_id): Path<Uuid>,
    settings: Option<Json<SearchSettings>>,
) -> (StatusCode, Json<ResumeResponse>) {
    let settings = settings.map(|Json(s)| s);
    match state.orchestrator.resume(session_id, settings).await {
        Ok(session_id) => (
            StatusCode::OK,
            Json(ResumeResponse {
                success: true,
                session_id: Some(session_id),
                message: "search resumed from snapshot".to_string(),
            }),
        ),
        Err(err) => (
            status_for(&err),
            Json(ResumeResponse {
                success: false,
                session_id: None,
                message: err.to_string(),
            }),
        ),
    }
}
