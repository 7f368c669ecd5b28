//! vigil-relay library - event relay server
//!
//! Bridges one upstream analysis process to any number of downstream viewer
//! connections, and serves recorded clips with byte-range support.

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod profile;
pub mod registry;
pub mod upstream;
pub mod ws;

use profile::ProfileStore;
use registry::ConsumerRegistry;
use upstream::UpstreamConnector;

/// Application state shared across HTTP handlers and background tasks
#[derive(Clone)]
pub struct AppState {
    /// Live consumer connections
    pub registry: Arc<ConsumerRegistry>,
    /// Single upstream connection owner
    pub upstream: Arc<UpstreamConnector>,
    /// Persisted user profile
    pub profile: Arc<ProfileStore>,
    /// Set on profile write, cleared via POST /file/reset
    pub profile_changed: Arc<AtomicBool>,
    /// Directory holding recorded clips
    pub video_dir: PathBuf,
}

impl AppState {
    pub fn new(upstream_url: String, video_dir: PathBuf, profile_path: PathBuf) -> Self {
        Self {
            registry: Arc::new(ConsumerRegistry::new()),
            upstream: Arc::new(UpstreamConnector::new(upstream_url)),
            profile: Arc::new(ProfileStore::new(profile_path)),
            profile_changed: Arc::new(AtomicBool::new(false)),
            video_dir,
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .route("/health", get(api::health))
        .route("/api/videos", get(api::videos::list_videos))
        .route("/api/videos/:filename", get(api::videos::stream_video))
        .route("/api/videos/:filename/info", get(api::videos::video_info))
        .route(
            "/user/data",
            get(api::profile::get_user_data).post(api::profile::post_user_data),
        )
        .route("/file/status", get(api::profile::file_status))
        .route("/file/reset", post(api::profile::file_reset))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
