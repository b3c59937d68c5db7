pub mod auth;
pub mod chat;
pub mod conversations;
pub mod health;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

/// Build the full API router.
///
/// Routes are split into **public** (no auth required) and **protected**
/// (gated behind the admin bearer-token middleware).
///
/// `state` is needed to wire up the auth middleware at build time.
pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new().route("/v1/health", get(health::health));

    let protected = Router::new()
        // Chat (turn execution)
        .route("/v1/chat/message", post(chat::send_message))
        .route("/v1/chat/session", post(chat::start_session))
        .route("/v1/chat/session/:id", get(chat::get_session))
        .route("/v1/chat/session/:id/end", post(chat::end_session))
        // Conversations (read-only introspection)
        .route("/v1/conversations", get(conversations::list_conversations))
        .route("/v1/conversations/:id", get(conversations::get_conversation))
        .route("/v1/conversations/:id/events", get(conversations::get_conversation_events))
        // Apply API auth middleware to all protected routes.
        .route_layer(middleware::from_fn_with_state(state, auth::require_api_token));

    public
        .merge(protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
