//! Finalized recording artifact

use super::state::RecordingMode;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The finalized recording: every buffered chunk concatenated in order
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: String,
    pub mode: RecordingMode,
    pub mime_type: String,
    pub bytes: Bytes,
    pub duration_seconds: u64,
    pub chunk_count: usize,
    pub segment_count: usize,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Concatenate chunks into one artifact
    pub fn from_chunks(
        mode: RecordingMode,
        mime_type: String,
        chunks: &[Bytes],
        duration_seconds: u64,
        segment_count: usize,
    ) -> Self {
        let total: usize = chunks.iter().map(Bytes::len).sum();
        let mut buf = BytesMut::with_capacity(total);
        for chunk in chunks {
            buf.extend_from_slice(chunk);
        }

        Self {
            id: Uuid::new_v4().to_string(),
            mode,
            mime_type,
            bytes: buf.freeze(),
            duration_seconds,
            chunk_count: chunks.len(),
            segment_count,
            created_at: Utc::now(),
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.bytes.len()
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            id: self.id.clone(),
            mode: self.mode,
            mime_type: self.mime_type.clone(),
            size_bytes: self.size_bytes(),
            duration_seconds: self.duration_seconds,
            chunk_count: self.chunk_count,
            segment_count: self.segment_count,
            created_at: self.created_at,
        }
    }
}

/// Serializable description of an artifact, without its payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSummary {
    pub id: String,
    pub mode: RecordingMode,
    pub mime_type: String,
    pub size_bytes: usize,
    pub duration_seconds: u64,
    pub chunk_count: usize,
    pub segment_count: usize,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_concatenate_in_order() {
        let chunks = vec![
            Bytes::from_static(b"abc"),
            Bytes::from_static(b""),
            Bytes::from_static(b"de"),
        ];
        let artifact = Artifact::from_chunks(
            RecordingMode::Screen,
            "video/webm".to_string(),
            &chunks,
            3,
            1,
        );
        assert_eq!(&artifact.bytes[..], b"abcde");
        assert_eq!(artifact.chunk_count, 3);

        let summary = artifact.summary();
        assert_eq!(summary.size_bytes, 5);
        assert_eq!(summary.duration_seconds, 3);
    }
}
