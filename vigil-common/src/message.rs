//! Wire message types for the relay protocol
//!
//! Both legs of the relay carry JSON text frames with a `jsonType`
//! discriminator. The relay forwards frames verbatim (opaque passthrough);
//! these types exist for the viewer side and for classifying frames in logs.
//! An unrecognized `jsonType` or non-JSON frame parses to an error which the
//! caller logs and discards.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A discriminated relay payload.
///
/// Upstream-to-consumer variants: `Probability`, `Log`, `FeedbackRequest`.
/// Consumer-to-upstream variant: `FeedbackResponse`. Any other consumer
/// frame is forwarded verbatim without ever being parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "jsonType", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Intrusion score in [0,1] with the event timestamp
    Probability { probab: f64, time: String },

    /// Textual sensor event
    Log { event: String, time: String },

    /// Request for viewer feedback on a recorded clip.
    ///
    /// `time` doubles as the unique request identifier that a later
    /// `FeedbackResponse` must carry.
    FeedbackRequest {
        time: String,
        trigger: String,
        video: String,
        training_count: u32,
        operation_mode: String,
        probability: f64,
    },

    /// Viewer verdict for a prior feedback request.
    ///
    /// `request_id` must equal the `time` of a previously broadcast
    /// `FeedbackRequest`. The relay does not enforce this; the viewer-side
    /// correlator never emits an unmatched response.
    FeedbackResponse {
        label: u8,
        #[serde(rename = "requestId")]
        request_id: String,
    },
}

impl RelayMessage {
    /// Parse a text frame into a typed message.
    ///
    /// Rejects non-JSON frames, unknown `jsonType` values, and feedback
    /// labels outside {0, 1}.
    pub fn parse(frame: &str) -> Result<Self> {
        let msg: RelayMessage = serde_json::from_str(frame)?;
        if let RelayMessage::FeedbackResponse { label, .. } = &msg {
            if *label > 1 {
                return Err(Error::InvalidInput(format!(
                    "feedback label must be 0 or 1, got {}",
                    label
                )));
            }
        }
        Ok(msg)
    }

    /// Message kind for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            RelayMessage::Probability { .. } => "probability",
            RelayMessage::Log { .. } => "log",
            RelayMessage::FeedbackRequest { .. } => "feedback_request",
            RelayMessage::FeedbackResponse { .. } => "feedback_response",
        }
    }

    /// Serialize to a wire frame
    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
