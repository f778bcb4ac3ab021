//! Health check and status endpoints

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use super::ApiState;

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Assistant status response
#[derive(Serialize)]
pub struct StatusResponse {
    /// `online` when a language service is configured, `offline` otherwise
    pub status: &'static str,
    pub llm_configured: bool,
    pub provider: String,
    pub model: String,
    pub active_sessions: usize,
    pub timestamp: String,
}

/// Liveness probe - is the service running?
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Build health router (liveness only, no state needed)
pub fn router() -> Router {
    Router::new().route("/health", get(health))
}

/// Report whether the assistant can answer
async fn status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: if state.llm_configured { "online" } else { "offline" },
        llm_configured: state.llm_configured,
        provider: state.provider.clone(),
        model: state.model.clone(),
        active_sessions: state.sessions.len().await,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Build status router
pub fn status_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .with_state(state)
}
