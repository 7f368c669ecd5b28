//! HTTP API handlers

pub mod profile;
pub mod videos;

use axum::{extract::State, Json};
use serde_json::json;

use crate::AppState;

/// GET /health - module identification and upstream connection state
pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "vigil-relay",
        "version": env!("CARGO_PKG_VERSION"),
        "upstream": state.upstream.state().as_str(),
        "consumers": state.registry.count(),
    }))
}
