//! Local recording library
//!
//! Key-value storage and the recent-recordings index built on it.

pub mod recent;
pub mod store;

pub use recent::{ArtifactRef, RecentRecording, RecentRecordings};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};
