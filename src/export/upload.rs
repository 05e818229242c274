//! Background uploads
//!
//! An upload runs on its own task; callers observe a pending state through a
//! watch channel and may wait for the outcome. The artifact is shared, so a
//! failed upload leaves it available for download or another attempt.

use super::hosting::{RemoteVideo, UploadMetadata, VideoHost};
use crate::recorder::artifact::Artifact;
use crate::utils::error::{AppError, AppResult};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Progress of a single upload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Completed(RemoteVideo),
    Failed(String),
}

impl UploadStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, UploadStatus::Pending)
    }
}

/// Handle to an upload in flight
pub struct UploadHandle {
    artifact: Arc<Artifact>,
    status: watch::Receiver<UploadStatus>,
    updates: Arc<watch::Sender<UploadStatus>>,
    task: JoinHandle<()>,
}

impl UploadHandle {
    /// The artifact being uploaded
    pub fn artifact(&self) -> &Arc<Artifact> {
        &self.artifact
    }

    pub fn status(&self) -> UploadStatus {
        self.status.borrow().clone()
    }

    pub fn is_pending(&self) -> bool {
        self.status.borrow().is_pending()
    }

    /// Receiver notified when the upload settles
    pub fn subscribe(&self) -> watch::Receiver<UploadStatus> {
        self.status.clone()
    }

    /// Wait for the upload to settle
    pub async fn wait(&self) -> AppResult<RemoteVideo> {
        wait_settled(self.subscribe()).await
    }

    /// Abort a pending upload. A settled upload keeps its outcome.
    pub fn cancel(&self) {
        self.task.abort();
        let cancelled = self.updates.send_if_modified(|status| {
            if status.is_pending() {
                *status = UploadStatus::Failed(CANCELLED.to_string());
                true
            } else {
                false
            }
        });
        if cancelled {
            tracing::info!("Upload of artifact {} cancelled", self.artifact.id);
        }
    }
}

const CANCELLED: &str = "upload cancelled";

/// Wait on a status receiver until the upload settles
pub async fn wait_settled(mut status: watch::Receiver<UploadStatus>) -> AppResult<RemoteVideo> {
    let settled = status
        .wait_for(|s| !s.is_pending())
        .await
        .map(|s| s.clone())
        .map_err(|_| AppError::UploadError("upload task ended unexpectedly".to_string()))?;

    match settled {
        UploadStatus::Completed(video) => Ok(video),
        UploadStatus::Failed(reason) => Err(AppError::UploadError(reason)),
        UploadStatus::Pending => Err(AppError::UploadError("upload did not settle".to_string())),
    }
}

/// Start uploading `artifact` without blocking the caller
pub fn spawn_upload(
    host: Arc<dyn VideoHost>,
    artifact: Arc<Artifact>,
    metadata: UploadMetadata,
) -> UploadHandle {
    let (tx, rx) = watch::channel(UploadStatus::Pending);
    let updates = Arc::new(tx);
    let job = artifact.clone();
    let tx = updates.clone();

    let task = tokio::spawn(async move {
        tracing::info!("Upload of artifact {} pending", job.id);
        let status = match host.upload(job.bytes.clone(), &job.mime_type, &metadata).await {
            Ok(video) => {
                tracing::info!("Artifact {} uploaded as {}", job.id, video.id);
                UploadStatus::Completed(video)
            }
            Err(e) => {
                tracing::warn!("Upload of artifact {} failed: {}", job.id, e);
                UploadStatus::Failed(failure_reason(e))
            }
        };
        tx.send_replace(status);
    });

    UploadHandle {
        artifact,
        status: rx,
        updates,
        task,
    }
}

/// Reason stored in a failed status, without the error's own prefix
fn failure_reason(error: AppError) -> String {
    match error {
        AppError::UploadError(reason) => reason,
        other => other.to_string(),
    }
}
