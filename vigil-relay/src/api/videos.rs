//! Recorded video endpoints
//!
//! Byte-range aware streaming plus listing/info with filename metadata
//! decoding. Filenames are validated against path traversal before any
//! filesystem access.

use std::io::SeekFrom;
use std::path::PathBuf;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};
use vigil_common::artifact::{is_safe_filename, ArtifactMetadata};

use crate::AppState;

fn metadata_json(filename: &str) -> Value {
    match ArtifactMetadata::from_filename(filename) {
        Some(meta) => json!({
            "time": meta.time,
            "date": meta.date,
            "trigger": meta.trigger,
        }),
        None => json!({}),
    }
}

fn guard_filename(filename: &str) -> Option<Response> {
    if !is_safe_filename(filename) {
        warn!("Rejected unsafe filename: {}", filename);
        return Some(
            (StatusCode::BAD_REQUEST, Json(json!({"error": "Invalid filename"}))).into_response(),
        );
    }
    None
}

fn not_found(filename: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Video not found", "filename": filename})),
    )
        .into_response()
}

/// GET /api/videos - list recordings, newest first
pub async fn list_videos(State(state): State<AppState>) -> Response {
    let dir = &state.video_dir;
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Video directory not found: {}", dir.display());
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"error": "Video directory not found"})),
            )
                .into_response();
        }
        Err(e) => {
            warn!("Failed to read video directory: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to list videos"})),
            )
                .into_response();
        }
    };

    let mut videos: Vec<(std::time::SystemTime, Value)> = Vec::new();
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.ends_with(".mp4") {
            continue;
        }
        let Ok(meta) = entry.metadata() else { continue };
        let modified = meta.modified().unwrap_or(std::time::UNIX_EPOCH);
        let modified_utc: DateTime<Utc> = modified.into();
        videos.push((
            modified,
            json!({
                "filename": name,
                "url": format!("/api/videos/{}", name),
                "size": meta.len(),
                "modified": modified_utc.to_rfc3339(),
                "metadata": metadata_json(&name),
            }),
        ));
    }

    // Most recently modified first
    videos.sort_by(|a, b| b.0.cmp(&a.0));
    let videos: Vec<Value> = videos.into_iter().map(|(_, v)| v).collect();

    info!("Listed {} videos", videos.len());
    Json(json!({
        "videos": videos,
        "count": videos.len(),
        "directory": dir.display().to_string(),
    }))
    .into_response()
}

/// GET /api/videos/:filename/info - file and naming metadata
pub async fn video_info(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    if let Some(rejected) = guard_filename(&filename) {
        return rejected;
    }
    let path = state.video_dir.join(&filename);
    let meta = match std::fs::metadata(&path) {
        Ok(meta) => meta,
        Err(_) => return not_found(&filename),
    };
    let modified: DateTime<Utc> = meta.modified().unwrap_or(std::time::UNIX_EPOCH).into();
    let created: DateTime<Utc> = meta
        .created()
        .unwrap_or_else(|_| meta.modified().unwrap_or(std::time::UNIX_EPOCH))
        .into();

    Json(json!({
        "filename": filename,
        "size": meta.len(),
        "modified": modified.to_rfc3339(),
        "created": created.to_rfc3339(),
        "url": format!("/api/videos/{}", filename),
        "metadata": metadata_json(&filename),
    }))
    .into_response()
}

/// GET /api/videos/:filename - range-aware binary stream
pub async fn stream_video(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Some(rejected) = guard_filename(&filename) {
        return rejected;
    }
    let path = state.video_dir.join(&filename);
    if !path.exists() {
        warn!("Video not found: {}", filename);
        return not_found(&filename);
    }

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match serve_file(path, range.as_deref()).await {
        Ok(response) => response,
        Err(e) => {
            warn!("Failed to stream {}: {}", filename, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to stream video"})),
            )
                .into_response()
        }
    }
}

async fn serve_file(path: PathBuf, range: Option<&str>) -> std::io::Result<Response> {
    let mut file = tokio::fs::File::open(&path).await?;
    let size = file.metadata().await?.len();

    if let Some(range) = range {
        let Some((start, end)) = parse_byte_range(range, size) else {
            let mut response =
                (StatusCode::RANGE_NOT_SATISFIABLE, Body::empty()).into_response();
            response.headers_mut().insert(
                header::CONTENT_RANGE,
                format!("bytes */{}", size).parse().expect("valid header"),
            );
            return Ok(response);
        };

        let len = end - start + 1;
        file.seek(SeekFrom::Start(start)).await?;
        let stream = ReaderStream::new(file.take(len));

        let mut response = Body::from_stream(stream).into_response();
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_RANGE,
            format!("bytes {}-{}/{}", start, end, size)
                .parse()
                .expect("valid header"),
        );
        headers.insert(header::ACCEPT_RANGES, "bytes".parse().expect("valid header"));
        headers.insert(
            header::CONTENT_LENGTH,
            len.to_string().parse().expect("valid header"),
        );
        headers.insert(header::CONTENT_TYPE, "video/mp4".parse().expect("valid header"));
        Ok(response)
    } else {
        let stream = ReaderStream::new(file);
        let mut response = Body::from_stream(stream).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_LENGTH,
            size.to_string().parse().expect("valid header"),
        );
        headers.insert(header::ACCEPT_RANGES, "bytes".parse().expect("valid header"));
        headers.insert(header::CONTENT_TYPE, "video/mp4".parse().expect("valid header"));
        Ok(response)
    }
}

/// Parse a `Range: bytes=...` header into an inclusive (start, end) pair.
///
/// Supports `start-end`, `start-`, and suffix `-n` forms. Returns None when
/// malformed or unsatisfiable against the file size.
fn parse_byte_range(header: &str, size: u64) -> Option<(u64, u64)> {
    if size == 0 {
        return None;
    }
    let spec = header.strip_prefix("bytes=")?;
    let (start_s, end_s) = spec.split_once('-')?;

    if start_s.is_empty() {
        // Suffix form: last n bytes
        let n: u64 = end_s.parse().ok()?;
        if n == 0 {
            return None;
        }
        let start = size.saturating_sub(n);
        return Some((start, size - 1));
    }

    let start: u64 = start_s.parse().ok()?;
    let end: u64 = if end_s.is_empty() {
        size - 1
    } else {
        end_s.parse().ok()?
    };
    if start > end || start >= size {
        return None;
    }
    Some((start, end.min(size - 1)))
}

#[cfg(test)]
mod tests {
    use super::parse_byte_range;

    #[test]
    fn parses_bounded_range() {
        assert_eq!(parse_byte_range("bytes=0-99", 1000), Some((0, 99)));
        assert_eq!(parse_byte_range("bytes=500-999", 1000), Some((500, 999)));
    }

    #[test]
    fn open_ended_range_runs_to_eof() {
        assert_eq!(parse_byte_range("bytes=200-", 1000), Some((200, 999)));
    }

    #[test]
    fn suffix_range_takes_last_bytes() {
        assert_eq!(parse_byte_range("bytes=-100", 1000), Some((900, 999)));
        assert_eq!(parse_byte_range("bytes=-2000", 1000), Some((0, 999)));
    }

    #[test]
    fn end_clamped_to_file_size() {
        assert_eq!(parse_byte_range("bytes=0-5000", 1000), Some((0, 999)));
    }

    #[test]
    fn unsatisfiable_or_malformed_is_none() {
        assert_eq!(parse_byte_range("bytes=1000-", 1000), None);
        assert_eq!(parse_byte_range("bytes=5-2", 1000), None);
        assert_eq!(parse_byte_range("bytes=abc-", 1000), None);
        assert_eq!(parse_byte_range("items=0-10", 1000), None);
        assert_eq!(parse_byte_range("bytes=0-", 0), None);
    }
}
