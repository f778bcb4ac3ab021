//! Session endpoints for the browser front end
//!
//! The browser runs speech recognition and synthesis itself and relays
//! transcribed fragments here; each request advances the session once.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::ApiState;
use super::error::ApiError;
use crate::adapter::BrowserRelayAdapter;
use crate::dialogue::Turn;
use crate::session::{Phase, Reply, ReplyKind, StepOutcome};

/// Longest accepted session id
const MAX_SESSION_ID_LEN: usize = 128;

/// Build session router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/api/sessions/{id}/step", post(step))
        .route("/api/chat", post(chat))
        .route("/api/reset", post(reset))
        .route("/api/history", get(history))
        .with_state(state)
}

/// Fragments relayed from the browser for one step
#[derive(Debug, Default, Deserialize)]
pub struct StepRequest {
    #[serde(default)]
    pub fragments: Vec<String>,

    /// Typed or push-to-talk input; skips wake word detection
    #[serde(default)]
    pub command: Option<String>,
}

/// A reply as sent to the browser
#[derive(Debug, Serialize)]
pub struct ReplyBody {
    pub text: String,
    pub kind: ReplyKind,
}

impl From<Reply> for ReplyBody {
    fn from(reply: Reply) -> Self {
        Self {
            text: reply.text,
            kind: reply.kind,
        }
    }
}

/// Result of one step
#[derive(Debug, Serialize)]
pub struct StepResponse {
    pub session_id: String,
    pub phase: Phase,
    pub replies: Vec<ReplyBody>,

    /// The last reply's text, for clients that only show one
    pub reply: Option<String>,
}

/// Advance a session with the request's fragments
async fn step(
    State(state): State<Arc<ApiState>>,
    Path(session_id): Path<String>,
    Json(request): Json<StepRequest>,
) -> Result<Json<StepResponse>, ApiError> {
    validate_session_id(&session_id)?;

    let mut adapter = BrowserRelayAdapter::new(request.fragments);
    let phase = {
        let handle = state.sessions.get_or_create(&session_id).await?;
        let mut orchestrator = handle.lock().await;

        let mut outcome = orchestrator.step(&mut adapter).await?;
        if let Some(command) = request.command.as_deref()
            && outcome != StepOutcome::Exited
        {
            outcome = orchestrator.submit(&mut adapter, command).await?;
        }
        tracing::debug!(session_id = %session_id, ?outcome, phase = %orchestrator.phase(), "session stepped");
        orchestrator.phase()
    };

    if phase.is_terminal() {
        state.sessions.remove(&session_id).await;
    }

    let replies: Vec<ReplyBody> = adapter.take_replies().into_iter().map(Into::into).collect();
    let reply = replies.last().map(|r| r.text.clone());

    Ok(Json(StepResponse {
        session_id,
        phase,
        replies,
        reply,
    }))
}

/// Typed chat request
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Typed chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
    pub phase: Phase,
    pub timestamp: String,
}

/// Send a typed message, bypassing the wake word
async fn chat(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("No message provided"));
    }

    let session_id = request
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    validate_session_id(&session_id)?;

    let mut adapter = BrowserRelayAdapter::default();
    let phase = {
        let handle = state.sessions.get_or_create(&session_id).await?;
        let mut orchestrator = handle.lock().await;
        orchestrator.submit(&mut adapter, message).await?;
        orchestrator.phase()
    };

    if phase.is_terminal() {
        state.sessions.remove(&session_id).await;
    }

    let response = adapter
        .take_replies()
        .pop()
        .map(|r| r.text)
        .unwrap_or_default();

    Ok(Json(ChatResponse {
        response,
        session_id,
        phase,
        timestamp: Utc::now().to_rfc3339(),
    }))
}

/// Session to reset
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: &'static str,
    pub session_id: String,
    pub existed: bool,
}

/// Drop a session and its conversation
async fn reset(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ResetResponse>, ApiError> {
    validate_session_id(&request.session_id)?;
    let existed = state.sessions.remove(&request.session_id).await;

    Ok(Json(ResetResponse {
        message: "Chat reset successfully",
        session_id: request.session_id,
        existed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub session_id: String,
}

/// Conversation turns of a session; empty for unknown sessions
async fn history(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<Turn>>, ApiError> {
    validate_session_id(&query.session_id)?;

    let turns = match state.sessions.get(&query.session_id).await {
        Some(handle) => handle.lock().await.context().turns().to_vec(),
        None => Vec::new(),
    };

    Ok(Json(turns))
}

fn validate_session_id(id: &str) -> Result<(), ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::BadRequest("session_id is required"));
    }
    if id.len() > MAX_SESSION_ID_LEN {
        return Err(ApiError::BadRequest("session_id is too long"));
    }
    Ok(())
}
