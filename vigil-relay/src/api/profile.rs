//! User profile endpoints
//!
//! Profile JSON is persisted to a flat file. A change flag lets the
//! co-located analysis process poll for profile updates; it stands in for
//! the message-broker signal the deployment previously used.

use std::sync::atomic::Ordering;

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::AppState;

/// GET /user/data - stored profile, 404 when none exists
pub async fn get_user_data(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.profile.load() {
        Some(profile) => (StatusCode::OK, Json(profile)),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "No user data found"})),
        ),
    }
}

/// POST /user/data - persist profile, requires `name` and `email`
pub async fn post_user_data(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let has_name = body.get("name").and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    let has_email = body.get("email").and_then(Value::as_str).is_some_and(|s| !s.is_empty());
    if !has_name || !has_email {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Name and Email required"})),
        );
    }

    if let Err(e) = state.profile.save(&body) {
        warn!("Failed to save user data: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to save user data"})),
        );
    }

    state.profile_changed.store(true, Ordering::SeqCst);
    info!("User data saved");
    (StatusCode::OK, Json(json!({"message": "User data saved"})))
}

/// GET /file/status - whether the profile changed since the last reset
pub async fn file_status(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "file_changed": state.profile_changed.load(Ordering::SeqCst),
    }))
}

/// POST /file/reset - clear the profile-changed flag
pub async fn file_reset(State(state): State<AppState>) -> Json<Value> {
    state.profile_changed.store(false, Ordering::SeqCst);
    Json(json!({"message": "Flag reset"}))
}
