//! Downloadable file export

use crate::recorder::artifact::Artifact;
use crate::utils::error::AppResult;
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};

/// A named file ready to hand to the user
#[derive(Debug, Clone)]
pub struct Download {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl Download {
    /// Write the file into `dir`, creating it if needed
    pub fn save_to(&self, dir: &Path) -> AppResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.filename);
        fs::write(&path, &self.bytes)?;
        tracing::info!("Saved {} bytes to {:?}", self.bytes.len(), path);
        Ok(path)
    }
}

/// `<context>-recording-<ISO timestamp>.webm`, colons replaced by hyphens
pub fn download_filename(context: &str, at: DateTime<Utc>) -> String {
    let stamp = at.to_rfc3339_opts(SecondsFormat::Millis, true).replace(':', "-");
    format!("{context}-recording-{stamp}.webm")
}

/// Package an artifact as a downloadable file. The artifact is untouched, so
/// it can be downloaded and uploaded any number of times.
pub fn to_downloadable(artifact: &Artifact, context: &str, at: DateTime<Utc>) -> Download {
    Download {
        filename: download_filename(context, at),
        mime_type: artifact.mime_type.clone(),
        bytes: artifact.bytes.clone(),
    }
}
