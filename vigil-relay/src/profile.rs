//! User profile persistence
//!
//! Profile JSON is stored in a flat file under the root folder. An
//! unreadable or corrupt file reads as absent; storage problems are never
//! fatal to the relay.

use std::path::PathBuf;

use serde_json::Value;
use tracing::warn;
use vigil_common::Result;

pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load the stored profile, if any
    pub fn load(&self) -> Option<Value> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(_) => return None,
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Profile file unreadable, treating as absent: {}", e);
                None
            }
        }
    }

    /// Persist the profile JSON
    pub fn save(&self, profile: &Value) -> Result<()> {
        std::fs::write(&self.path, serde_json::to_string_pretty(profile)?)?;
        Ok(())
    }
}
