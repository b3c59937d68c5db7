//! Chat API — the primary interface for running turns against the
//! orchestration engine.
//!
//! - `POST /v1/chat/session`          — start a new session
//! - `GET  /v1/chat/session/:id`      — fetch a session's current state
//! - `POST /v1/chat/session/:id/end`  — mark a session completed
//! - `POST /v1/chat/message`          — run one turn, returns the full reply

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use sa_domain::session::SessionStatus;

use crate::orchestrator::handle_message;
use crate::runtime::session_lock::SessionBusy;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    pub user_id: String,
}

pub async fn start_session(
    State(state): State<AppState>,
    Json(body): Json<StartSessionRequest>,
) -> impl IntoResponse {
    let root_agent_id = state.registry.root_agent_id();
    let session = state.engine.sessions.get_or_create_session(None, &body.user_id, &root_agent_id);

    Json(serde_json::json!({
        "session_id": session.session_id,
        "user_id": session.user_id,
        "agent_id": session.active_agent_id(),
        "status": session.status,
    }))
    .into_response()
}

pub async fn get_session(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    match state.engine.sessions.get_session(&session_id) {
        Some(session) => Json(serde_json::json!({
            "session_id": session.session_id,
            "user_id": session.user_id,
            "agent_id": session.active_agent_id(),
            "status": session.status,
            "depth": session.depth(),
            "flow_state": session.current_flow.as_ref().map(|f| f.current_state_id.clone()),
            "pending_confirmation": session.pending_confirmation.is_some(),
            "message_count": session.message_count,
            "language": session.language,
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no session \"{session_id}\"") })),
        )
            .into_response(),
    }
}

pub async fn end_session(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    let Some(mut session) = state.engine.sessions.get_session(&session_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no session \"{session_id}\"") })),
        )
            .into_response();
    };

    session.status = SessionStatus::Completed;
    state.engine.sessions.save_session(&session);

    Json(serde_json::json!({ "session_id": session.session_id, "status": session.status })).into_response()
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub user_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub message: String,
}

pub async fn send_message(
    State(state): State<AppState>,
    Json(body): Json<SendMessageRequest>,
) -> impl IntoResponse {
    let lock_key = body
        .session_id
        .clone()
        .unwrap_or_else(|| format!("new:{}", body.user_id));

    let _permit = match state.session_locks.acquire(&lock_key).await {
        Ok(p) => p,
        Err(SessionBusy) => {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({ "error": "session is busy — a turn is already in progress" })),
            )
                .into_response();
        }
    };

    let turn = handle_message(&state.engine, &body.user_id, body.session_id.as_deref(), &body.message).await;

    Json(serde_json::json!({
        "session_id": turn.session_id,
        "message": turn.assistant_message,
        "agent_id": turn.agent_id,
        "agent_name": turn.agent_name,
        "tool_calls": turn.tool_calls,
        "pending_confirmation": turn.pending_confirmation,
        "flow_state": turn.flow_state,
        "escalated": turn.escalated,
    }))
    .into_response()
}
