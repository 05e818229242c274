//! Recent recordings index
//!
//! Newest-first list of saved recordings kept under a single key of a
//! [`KeyValueStore`]. The list grows without eviction.

use super::store::KeyValueStore;
use crate::recorder::artifact::Artifact;
use crate::recorder::state::RecordingMode;
use crate::utils::error::AppResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Store key holding the index
pub const RECENT_KEY: &str = "recent-recordings";

const UNTITLED: &str = "Untitled recording";

/// Where a saved recording lives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArtifactRef {
    /// Downloaded file
    Local { path: PathBuf },
    /// Uploaded to the video host
    Remote {
        #[serde(rename = "videoId")]
        video_id: String,
        url: String,
    },
}

/// One entry of the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentRecording {
    pub id: String,
    pub title: String,
    pub artifact: ArtifactRef,
    pub duration_seconds: u64,
    pub mode: RecordingMode,
    pub created_at: DateTime<Utc>,
}

impl RecentRecording {
    /// Describe a finished artifact; a blank title becomes a placeholder
    pub fn new(artifact: &Artifact, title: &str, location: ArtifactRef) -> Self {
        let title = title.trim();
        Self {
            id: artifact.id.clone(),
            title: if title.is_empty() {
                UNTITLED.to_string()
            } else {
                title.to_string()
            },
            artifact: location,
            duration_seconds: artifact.duration_seconds,
            mode: artifact.mode,
            created_at: artifact.created_at,
        }
    }
}

/// Recent recordings persisted in a key-value store
#[derive(Clone)]
pub struct RecentRecordings {
    store: Arc<dyn KeyValueStore>,
}

impl RecentRecordings {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// All entries, newest first
    pub fn list(&self) -> AppResult<Vec<RecentRecording>> {
        match self.store.get(RECENT_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(Vec::new()),
        }
    }

    /// Put `entry` at the front of the index
    pub fn record(&self, entry: RecentRecording) -> AppResult<()> {
        let mut entries = self.list()?;
        tracing::debug!("Recording '{}' in the recent index ({} entries)", entry.title, entries.len() + 1);
        entries.insert(0, entry);
        self.store.set(RECENT_KEY, serde_json::to_value(&entries)?)
    }

    pub fn find(&self, id: &str) -> AppResult<Option<RecentRecording>> {
        Ok(self.list()?.into_iter().find(|e| e.id == id))
    }

    pub fn len(&self) -> AppResult<usize> {
        Ok(self.list()?.len())
    }

    pub fn is_empty(&self) -> AppResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::store::{JsonFileStore, MemoryStore};
    use bytes::Bytes;
    use tempfile::tempdir;

    fn artifact(seconds: u64) -> Artifact {
        Artifact::from_chunks(
            RecordingMode::Both,
            "video/webm".to_string(),
            &[Bytes::from_static(b"data")],
            seconds,
            1,
        )
    }

    #[test]
    fn test_newest_first() {
        let index = RecentRecordings::new(Arc::new(MemoryStore::new()));
        assert!(index.is_empty().unwrap());

        let first = RecentRecording::new(
            &artifact(3),
            "First",
            ArtifactRef::Local {
                path: PathBuf::from("a.webm"),
            },
        );
        let second = RecentRecording::new(
            &artifact(7),
            "  ",
            ArtifactRef::Remote {
                video_id: "abc".to_string(),
                url: "https://example.com/abc".to_string(),
            },
        );
        index.record(first.clone()).unwrap();
        index.record(second.clone()).unwrap();

        let entries = index.list().unwrap();
        assert_eq!(entries, vec![second.clone(), first]);
        assert_eq!(entries[0].title, UNTITLED);
        assert_eq!(index.find(&second.id).unwrap().unwrap().duration_seconds, 7);
    }

    #[test]
    fn test_index_round_trips_through_file() {
        let dir = tempdir().unwrap();
        let store = Arc::new(JsonFileStore::new(dir.path().join("recent.json")));
        let index = RecentRecordings::new(store.clone());

        let entry = RecentRecording::new(
            &artifact(42),
            "Demo",
            ArtifactRef::Remote {
                video_id: "vid".to_string(),
                url: "https://example.com/vid".to_string(),
            },
        );
        index.record(entry.clone()).unwrap();

        let raw = store.get(RECENT_KEY).unwrap().unwrap();
        assert_eq!(raw[0]["artifact"]["kind"], "remote");
        assert_eq!(raw[0]["artifact"]["videoId"], "vid");
        assert_eq!(raw[0]["durationSeconds"], 42);

        let reopened = RecentRecordings::new(Arc::new(JsonFileStore::new(dir.path().join("recent.json"))));
        assert_eq!(reopened.list().unwrap(), vec![entry]);
    }
}
