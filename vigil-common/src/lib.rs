//! # Vigil Common Library
//!
//! Shared code for the Vigil relay and viewer including:
//! - Wire message types (RelayMessage enum)
//! - Recording filename metadata
//! - Configuration loading
//! - Error types

pub mod artifact;
pub mod config;
pub mod error;
pub mod message;

pub use error::{Error, Result};
pub use message::RelayMessage;
