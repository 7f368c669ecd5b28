//! Integration tests for vigil-relay HTTP endpoints
//!
//! Covers:
//! - Health endpoint
//! - Video listing with filename metadata, newest first
//! - Range-aware video streaming and traversal rejection
//! - User profile persistence and change flag

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot` method
use vigil_relay::{build_router, AppState};

/// Test helper: relay state over a temporary root folder.
/// Upstream URL points nowhere; the connector task is not started.
fn setup(video_files: &[(&str, &[u8])]) -> (TempDir, AppState) {
    let dir = TempDir::new().expect("Should create temp dir");
    let video_dir = dir.path().join("videos");
    std::fs::create_dir_all(&video_dir).expect("Should create video dir");
    for (name, contents) in video_files {
        std::fs::write(video_dir.join(name), contents).expect("Should write fixture");
        // Distinct mtimes so newest-first ordering is deterministic
        std::thread::sleep(std::time::Duration::from_millis(20));
    }
    let state = AppState::new(
        "ws://127.0.0.1:1/ws".to_string(),
        video_dir,
        dir.path().join("user_data.json"),
    );
    (dir, state)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body");
    serde_json::from_slice(&bytes).expect("Should parse JSON")
}

async fn raw_body(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Should read body")
        .to_vec()
}

// =============================================================================
// Health Endpoint
// =============================================================================

#[tokio::test]
async fn test_health_reports_module_and_upstream_state() {
    let (_dir, state) = setup(&[]);
    let app = build_router(state);

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "vigil-relay");
    assert_eq!(body["upstream"], "disconnected");
    assert_eq!(body["consumers"], 0);
}

// =============================================================================
// Video Listing and Info
// =============================================================================

#[tokio::test]
async fn test_video_listing_decodes_metadata_newest_first() {
    let (_dir, state) = setup(&[
        ("100000_010124_motion.mp4", b"older" as &[u8]),
        ("063733_291025_risk_threshold.mp4", b"newer"),
        ("notes.txt", b"ignored"),
    ]);
    let app = build_router(state);

    let response = app.oneshot(get("/api/videos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["count"], 2);
    let videos = body["videos"].as_array().unwrap();
    assert_eq!(videos.len(), 2);

    // Newest file first
    assert_eq!(videos[0]["filename"], "063733_291025_risk_threshold.mp4");
    assert_eq!(videos[0]["metadata"]["time"], "063733");
    assert_eq!(videos[0]["metadata"]["date"], "291025");
    assert_eq!(videos[0]["metadata"]["trigger"], "risk_threshold");
    assert_eq!(videos[0]["url"], "/api/videos/063733_291025_risk_threshold.mp4");

    assert_eq!(videos[1]["filename"], "100000_010124_motion.mp4");
    assert_eq!(videos[1]["metadata"]["trigger"], "motion");
    assert_eq!(videos[1]["size"], 5);
}

#[tokio::test]
async fn test_listing_distinguishes_missing_directory_from_other_errors() {
    // Missing directory is 404
    let dir = TempDir::new().unwrap();
    let state = AppState::new(
        "ws://127.0.0.1:1/ws".to_string(),
        dir.path().join("videos"),
        dir.path().join("user_data.json"),
    );
    let response = build_router(state).oneshot(get("/api/videos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["error"], "Video directory not found");

    // A listing failure that is not "absent" (directory path is a file) is 500
    let file_as_dir = dir.path().join("not_a_dir");
    std::fs::write(&file_as_dir, b"plain file").unwrap();
    let state = AppState::new(
        "ws://127.0.0.1:1/ws".to_string(),
        file_as_dir,
        dir.path().join("user_data.json"),
    );
    let response = build_router(state).oneshot(get("/api/videos")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_video_info_returns_metadata_and_size() {
    let (_dir, state) = setup(&[("063733_291025_risk_threshold.mp4", b"0123456789" as &[u8])]);
    let app = build_router(state);

    let response = app
        .oneshot(get("/api/videos/063733_291025_risk_threshold.mp4/info"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response.into_body()).await;
    assert_eq!(body["filename"], "063733_291025_risk_threshold.mp4");
    assert_eq!(body["size"], 10);
    assert_eq!(body["metadata"]["trigger"], "risk_threshold");
    assert!(body["modified"].is_string());
}

#[tokio::test]
async fn test_video_info_missing_file_is_404() {
    let (_dir, state) = setup(&[]);
    let app = build_router(state);

    let response = app
        .oneshot(get("/api/videos/100000_010124_motion.mp4/info"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// =============================================================================
// Video Streaming: ranges and traversal
// =============================================================================

#[tokio::test]
async fn test_full_video_served_with_size_upfront() {
    let (_dir, state) = setup(&[("100000_010124_motion.mp4", b"0123456789" as &[u8])]);
    let app = build_router(state);

    let response = app
        .oneshot(get("/api/videos/100000_010124_motion.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "10");
    assert_eq!(response.headers()[header::ACCEPT_RANGES], "bytes");
    assert_eq!(response.headers()[header::CONTENT_TYPE], "video/mp4");
    assert_eq!(raw_body(response.into_body()).await, b"0123456789");
}

#[tokio::test]
async fn test_bounded_range_served_as_partial_content() {
    let (_dir, state) = setup(&[("100000_010124_motion.mp4", b"0123456789" as &[u8])]);
    let app = build_router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/videos/100000_010124_motion.mp4")
        .header(header::RANGE, "bytes=2-5")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 2-5/10");
    assert_eq!(response.headers()[header::CONTENT_LENGTH], "4");
    assert_eq!(raw_body(response.into_body()).await, b"2345");
}

#[tokio::test]
async fn test_open_ended_and_suffix_ranges() {
    let (_dir, state) = setup(&[("100000_010124_motion.mp4", b"0123456789" as &[u8])]);

    let request = Request::builder()
        .method("GET")
        .uri("/api/videos/100000_010124_motion.mp4")
        .header(header::RANGE, "bytes=7-")
        .body(Body::empty())
        .unwrap();
    let response = build_router(state.clone()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 7-9/10");
    assert_eq!(raw_body(response.into_body()).await, b"789");

    let request = Request::builder()
        .method("GET")
        .uri("/api/videos/100000_010124_motion.mp4")
        .header(header::RANGE, "bytes=-3")
        .body(Body::empty())
        .unwrap();
    let response = build_router(state).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes 7-9/10");
    assert_eq!(raw_body(response.into_body()).await, b"789");
}

#[tokio::test]
async fn test_unsatisfiable_range_is_416() {
    let (_dir, state) = setup(&[("100000_010124_motion.mp4", b"0123456789" as &[u8])]);
    let app = build_router(state);

    let request = Request::builder()
        .method("GET")
        .uri("/api/videos/100000_010124_motion.mp4")
        .header(header::RANGE, "bytes=100-")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()[header::CONTENT_RANGE], "bytes */10");
}

#[tokio::test]
async fn test_traversal_filename_is_rejected_not_served() {
    let (_dir, state) = setup(&[]);

    // Percent-encoded separators reach the handler as a raw traversal path
    let response = build_router(state.clone())
        .oneshot(get("/api/videos/..%2F..%2Fetc%2Fpasswd"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["error"], "Invalid filename");

    // Backslash traversal is rejected the same way
    let response = build_router(state.clone())
        .oneshot(get("/api/videos/..%5Csecret"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unencoded traversal must never produce file contents either
    let response = build_router(state)
        .oneshot(get("/api/videos/../../etc/passwd"))
        .await
        .unwrap();
    assert_ne!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_video_is_404() {
    let (_dir, state) = setup(&[]);
    let app = build_router(state);

    let response = app
        .oneshot(get("/api/videos/100000_010124_motion.mp4"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response.into_body()).await;
    assert_eq!(body["error"], "Video not found");
}

// =============================================================================
// User Profile and Change Flag
// =============================================================================

#[tokio::test]
async fn test_profile_lifecycle_and_change_flag() {
    let (_dir, state) = setup(&[]);

    // No profile yet
    let response = build_router(state.clone())
        .oneshot(get("/user/data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Flag starts clear
    let response = build_router(state.clone())
        .oneshot(get("/file/status"))
        .await
        .unwrap();
    let body = json_body(response.into_body()).await;
    assert_eq!(body["file_changed"], false);

    // Write requires name and email
    let response = build_router(state.clone())
        .oneshot(post_json("/user/data", json!({"name": "Asha"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Valid write persists and raises the flag
    let profile = json!({"name": "Asha", "email": "asha@example.com", "vacationMode": true});
    let response = build_router(state.clone())
        .oneshot(post_json("/user/data", profile.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state.clone())
        .oneshot(get("/user/data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response.into_body()).await, profile);

    let response = build_router(state.clone())
        .oneshot(get("/file/status"))
        .await
        .unwrap();
    assert_eq!(json_body(response.into_body()).await["file_changed"], true);

    // Reset clears the flag
    let response = build_router(state.clone())
        .oneshot(post_json("/file/reset", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = build_router(state)
        .oneshot(get("/file/status"))
        .await
        .unwrap();
    assert_eq!(json_body(response.into_body()).await["file_changed"], false);
}

#[tokio::test]
async fn test_corrupt_profile_file_reads_as_absent() {
    let (dir, state) = setup(&[]);
    std::fs::write(dir.path().join("user_data.json"), "{corrupt").unwrap();

    let response = build_router(state)
        .oneshot(get("/user/data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
