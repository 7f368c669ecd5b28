//! vigil-viewer library - consumer-side relay logic
//!
//! Holds the state that lets a viewer, possibly after a reload or hours
//! later, attach a feedback verdict to the exact upstream request that
//! produced a recording: the artifact-to-request map, the bounded list of
//! outstanding feedback requests, and the relay connection with exponential
//! backoff.

pub mod connection;
pub mod correlator;
pub mod store;

pub use connection::{backoff_delay, ViewerConnection};
pub use correlator::{FeedbackCorrelator, FeedbackSink, PendingFeedback};
pub use store::{JsonFileStore, KvStore, MemoryStore};
