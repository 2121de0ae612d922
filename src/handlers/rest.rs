//! Control surface: synchronous request/response introspection and forced
//! session deletion, independent of any open channel.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use tracing::info;

use crate::api::dto::{DeleteSessionResponse, ErrorResponse, HealthResponse};
use crate::app_state::AppState;
use crate::registry::now_epoch_secs;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let (session_count, process_count) = state.registry.counts().await;
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        session_count,
        process_count,
        platform: std::env::consts::OS,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: now_epoch_secs(),
    })
}

pub async fn get_all_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.registry.list_sessions().await)
}

pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get_summary(&session_id).await {
        Some(summary) => (StatusCode::OK, Json(summary)).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found(format!(
                "Session not found: {session_id}"
            ))),
        )
            .into_response(),
    }
}

/// The only externally triggerable kill not scoped to a channel; it goes
/// through the same registry removal path as every other kill.
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    info!(session_id = %session_id, "session deletion requested via control surface");
    match state.registry.kill(&session_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(DeleteSessionResponse {
                session_id,
                success: true,
                message: "Session terminated".to_string(),
            }),
        )
            .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::not_found(format!(
                "Session not found: {session_id}"
            ))),
        )
            .into_response(),
    }
}
