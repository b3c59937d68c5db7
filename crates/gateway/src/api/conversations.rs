//! Conversation introspection — read-only views over sessions and their
//! transcripts, for building dashboards or debugging a stuck flow.
//!
//! - `GET /v1/conversations`              — list sessions, newest first
//! - `GET /v1/conversations/:id`          — one session's full transcript
//! - `GET /v1/conversations/:id/events`   — the trace events recorded for it

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Query(query): Query<ListConversationsQuery>,
) -> impl IntoResponse {
    let mut sessions = state.engine.sessions.list_sessions(query.user_id.as_deref());
    if let Some(limit) = query.limit {
        sessions.truncate(limit);
    }

    let summaries: Vec<serde_json::Value> = sessions
        .into_iter()
        .map(|s| {
            serde_json::json!({
                "session_id": s.session_id,
                "user_id": s.user_id,
                "agent_id": s.active_agent_id(),
                "status": s.status,
                "message_count": s.message_count,
                "last_interaction_at": s.last_interaction_at,
            })
        })
        .collect();

    Json(serde_json::json!({ "conversations": summaries })).into_response()
}

pub async fn get_conversation(State(state): State<AppState>, Path(session_id): Path<String>) -> impl IntoResponse {
    let Some(session) = state.engine.sessions.get_session(&session_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no conversation \"{session_id}\"") })),
        )
            .into_response();
    };

    let messages = state
        .engine
        .sessions
        .recent_messages(&session_id, state.config.sessions.recent_message_window)
        .unwrap_or_default();

    Json(serde_json::json!({
        "session_id": session.session_id,
        "user_id": session.user_id,
        "status": session.status,
        "agent_id": session.active_agent_id(),
        "messages": messages,
    }))
    .into_response()
}

pub async fn get_conversation_events(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    if state.engine.sessions.get_session(&session_id).is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("no conversation \"{session_id}\"") })),
        )
            .into_response();
    }

    let messages = state
        .engine
        .sessions
        .recent_messages(&session_id, state.config.sessions.recent_message_window)
        .unwrap_or_default();

    let events: Vec<_> = messages.into_iter().flat_map(|m| m.metadata.event_trace).collect();

    Json(serde_json::json!({ "session_id": session_id, "events": events })).into_response()
}
