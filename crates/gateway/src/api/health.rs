//! Health probe — public, no auth.

use axum::extract::State;
use axum::response::{IntoResponse, Json};

use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "agent_count": state.config.agents.len(),
        "root_agent_id": state.registry.root_agent_id(),
    }))
}
