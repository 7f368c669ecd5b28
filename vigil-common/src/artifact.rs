//! Recording filename metadata
//!
//! Recorded clips are named `HHMMSS_DDMMYY_trigger[.ext]`. The trigger may
//! itself contain underscores; it is everything after the first two fields.

use serde::{Deserialize, Serialize};

/// Structured metadata decoded from a recording filename
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Raw HHMMSS field
    pub time: String,
    /// Raw DDMMYY field
    pub date: String,
    /// Trigger category (may contain underscores)
    pub trigger: String,
}

impl ArtifactMetadata {
    /// Decode metadata from a filename, if it follows the naming contract.
    ///
    /// `063733_291025_risk_threshold.mp4` decodes to time `063733`,
    /// date `291025`, trigger `risk_threshold`.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let stem = filename.rsplit_once('.').map_or(filename, |(s, _)| s);
        let mut parts = stem.splitn(3, '_');
        let time = parts.next()?;
        let date = parts.next()?;
        let trigger = parts.next()?;
        if time.len() != 6 || date.len() != 6 || trigger.is_empty() {
            return None;
        }
        if !time.bytes().all(|b| b.is_ascii_digit()) || !date.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Self {
            time: time.to_string(),
            date: date.to_string(),
            trigger: trigger.to_string(),
        })
    }

    /// Render the time field as `HH:MM:SS`.
    ///
    /// A field that is not the six digits `from_filename` produces is
    /// returned unchanged rather than split.
    pub fn display_time(&self) -> String {
        match split_pairs(&self.time) {
            Some((a, b, c)) => format!("{}:{}:{}", a, b, c),
            None => self.time.clone(),
        }
    }

    /// Render the date field as `DD/MM/YY`, with the same fallback as
    /// [`display_time`](Self::display_time)
    pub fn display_date(&self) -> String {
        match split_pairs(&self.date) {
            Some((a, b, c)) => format!("{}/{}/{}", a, b, c),
            None => self.date.clone(),
        }
    }
}

fn split_pairs(field: &str) -> Option<(&str, &str, &str)> {
    if field.len() == 6 && field.is_char_boundary(2) && field.is_char_boundary(4) {
        Some((&field[0..2], &field[2..4], &field[4..6]))
    } else {
        None
    }
}

/// Reject filenames that could escape the recordings directory.
///
/// No parent-directory sequences and no path separators; checked before any
/// filesystem access.
pub fn is_safe_filename(filename: &str) -> bool {
    !filename.is_empty()
        && !filename.contains("..")
        && !filename.contains('/')
        && !filename.contains('\\')
}
