//! Feedback correlation
//!
//! Bridges the gap between "when a feedback request was broadcast" and
//! "when the user, possibly after navigating away and returning, supplies a
//! verdict for the clip it referenced". Two persisted structures:
//!
//! - artifact map: clip filename -> request identifier (the request's
//!   `time` field), last write wins
//! - pending list: outstanding feedback requests, newest first, capped

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use vigil_common::{Error, RelayMessage, Result};

use crate::store::KvStore;

/// Maximum outstanding feedback requests retained; oldest evicted first
pub const MAX_PENDING: usize = 10;

const PENDING_KEY: &str = "pending_feedback";
const ARTIFACT_MAP_KEY: &str = "artifact_requests";

/// One outstanding feedback request as persisted for UI reconstruction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFeedback {
    /// Request identifier (the upstream event timestamp)
    pub time: String,
    pub trigger: String,
    pub video: String,
    pub training_count: u32,
    pub operation_mode: String,
    pub probability: f64,
}

/// Outbound channel for feedback responses.
///
/// A send returns Ok only when the frame was handed to a live connection;
/// the correlator cleans up its state only on Ok.
pub trait FeedbackSink {
    fn send_frame(&mut self, frame: &str) -> Result<()>;
}

/// Correlates recorded clips with the upstream requests that produced them
pub struct FeedbackCorrelator<S: KvStore> {
    store: S,
}

impl<S: KvStore> FeedbackCorrelator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    fn artifact_map(&self) -> HashMap<String, String> {
        self.store
            .get(ARTIFACT_MAP_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(map) => Some(map),
                Err(e) => {
                    warn!("Artifact map unreadable, treating as empty: {}", e);
                    None
                }
            })
            .unwrap_or_default()
    }

    fn save_artifact_map(&mut self, map: &HashMap<String, String>) {
        if let Ok(raw) = serde_json::to_string(map) {
            self.store.set(ARTIFACT_MAP_KEY, raw);
        }
    }

    fn save_pending(&mut self, pending: &[PendingFeedback]) {
        if let Ok(raw) = serde_json::to_string(pending) {
            self.store.set(PENDING_KEY, raw);
        }
    }

    /// Record an observed feedback request: map the clip filename to the
    /// request identifier (last write wins) and prepend a pending record,
    /// evicting the oldest beyond capacity.
    pub fn observe(&mut self, request: PendingFeedback) {
        let mut map = self.artifact_map();
        map.insert(request.video.clone(), request.time.clone());
        self.save_artifact_map(&map);

        let mut pending = self.pending();
        pending.insert(0, request);
        pending.truncate(MAX_PENDING);
        self.save_pending(&pending);
    }

    /// Record a feedback request observed as a broadcast message.
    /// Other message kinds are ignored.
    pub fn observe_message(&mut self, message: &RelayMessage) {
        if let RelayMessage::FeedbackRequest {
            time,
            trigger,
            video,
            training_count,
            operation_mode,
            probability,
        } = message
        {
            debug!("Feedback request observed for {}", video);
            self.observe(PendingFeedback {
                time: time.clone(),
                trigger: trigger.clone(),
                video: video.clone(),
                training_count: *training_count,
                operation_mode: operation_mode.clone(),
                probability: *probability,
            });
        }
    }

    /// Outstanding feedback requests, newest first.
    ///
    /// Read-only: reconstructing UI state from this list emits nothing.
    pub fn pending(&self) -> Vec<PendingFeedback> {
        self.store
            .get(PENDING_KEY)
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(pending) => Some(pending),
                Err(e) => {
                    warn!("Pending list unreadable, treating as empty: {}", e);
                    None
                }
            })
            .unwrap_or_default()
    }

    /// Original request identifier for a clip filename.
    ///
    /// None is a reachable, expected state (direct navigation to a clip that
    /// never went through a request, or cleared state); feedback must then
    /// be refused, not sent with a fabricated identifier.
    pub fn request_id_for(&self, video: &str) -> Option<String> {
        self.artifact_map().get(video).cloned()
    }

    /// Submit a feedback verdict for a clip.
    ///
    /// Emits `feedback_response{label, requestId}` on the sink. Only after a
    /// successful send are the pending entry and the map entry removed; a
    /// failed send preserves both for retry on a future view.
    pub fn submit(&mut self, video: &str, label: u8, sink: &mut dyn FeedbackSink) -> Result<String> {
        if label > 1 {
            return Err(Error::InvalidInput(format!(
                "feedback label must be 0 or 1, got {}",
                label
            )));
        }
        let request_id = self.request_id_for(video).ok_or_else(|| {
            Error::NotFound(format!(
                "no request identifier remembered for {}; feedback cannot be sent",
                video
            ))
        })?;

        let response = RelayMessage::FeedbackResponse {
            label,
            request_id: request_id.clone(),
        };
        sink.send_frame(&response.to_frame()?)?;

        // Best-effort cleanup, only after the send succeeded
        let pending: Vec<PendingFeedback> = self
            .pending()
            .into_iter()
            .filter(|p| p.time != request_id)
            .collect();
        self.save_pending(&pending);

        let mut map = self.artifact_map();
        map.remove(video);
        self.save_artifact_map(&map);

        info!("Feedback sent for {} (requestId {})", video, request_id);
        Ok(request_id)
    }

    /// Explicit user clear-all of outstanding requests
    pub fn clear_pending(&mut self) {
        self.store.remove(PENDING_KEY);
    }
}
