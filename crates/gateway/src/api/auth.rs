//! API authentication middleware.
//!
//! Reads the env var named by `config.admin.token_env` (default
//! `SA_ADMIN_TOKEN`) **once at startup** and caches the SHA-256 digest on
//! [`AppState`]. If the env var is unset or empty, every protected route
//! is disabled (403) — this gateway fails closed rather than open.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::state::AppState;

pub async fn require_api_token(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let Some(expected_hash) = &state.api_token_hash else {
        return (
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({ "error": "admin API token not configured" })),
        )
            .into_response();
    };

    let provided = req
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(expected_hash.as_slice())) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(serde_json::json!({ "error": "invalid or missing API token" })),
        )
            .into_response();
    }

    next.run(req).await
}
