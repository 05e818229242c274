//! Export command handlers
//!
//! Download, background upload and save of the finished recording.

use super::{AppState, CommandResult};
use crate::export::download::to_downloadable;
use crate::export::hosting::{RemoteVideo, UploadMetadata};
use crate::export::upload::{spawn_upload, wait_settled, UploadStatus};
use crate::library::recent::{ArtifactRef, RecentRecording};
use crate::recorder::artifact::Artifact;
use crate::utils::error::{AppError, AppResult};
use chrono::Utc;
use std::path::PathBuf;
use std::sync::Arc;

fn finished_artifact(state: &AppState) -> AppResult<Arc<Artifact>> {
    state
        .coordinator
        .artifact()
        .ok_or_else(|| AppError::InvalidState("There is no finished recording.".to_string()))
}

/// Write the finished recording into the download directory
pub async fn download_recording(state: &AppState) -> CommandResult<PathBuf> {
    let artifact = finished_artifact(state)?;
    let download = to_downloadable(&artifact, &state.storage.context, Utc::now());
    Ok(download.save_to(&state.storage.download_dir)?)
}

/// Start uploading the finished recording in the background
pub async fn start_upload(
    state: &AppState,
    name: String,
    description: Option<String>,
) -> CommandResult<UploadStatus> {
    let artifact = finished_artifact(state)?;
    let host = state.host()?;

    let mut upload = state.upload.lock();
    if upload.as_ref().is_some_and(|u| u.is_pending()) {
        return Err(AppError::InvalidState("An upload is already in progress.".to_string()).into());
    }
    let handle = spawn_upload(host, artifact, UploadMetadata { name, description });
    let status = handle.status();
    *upload = Some(handle);
    Ok(status)
}

/// Status of the latest upload, if one was started
pub async fn get_upload_status(state: &AppState) -> CommandResult<Option<UploadStatus>> {
    Ok(state.upload.lock().as_ref().map(|u| u.status()))
}

/// Wait for the latest upload to settle
pub async fn wait_for_upload(state: &AppState) -> CommandResult<RemoteVideo> {
    let status = state
        .upload
        .lock()
        .as_ref()
        .map(|u| u.subscribe())
        .ok_or_else(|| AppError::InvalidState("No upload has been started.".to_string()))?;
    Ok(wait_settled(status).await?)
}

/// Record the finished recording in the recent list and reset the session
pub async fn save_recording(
    state: &AppState,
    title: String,
    location: ArtifactRef,
) -> CommandResult<RecentRecording> {
    let entry = state.coordinator.save(&title, location, &state.recent)?;
    *state.upload.lock() = None;
    Ok(entry)
}

/// Reference for a completed upload, embeddable through the host
pub fn remote_ref(state: &AppState, video: &RemoteVideo) -> CommandResult<ArtifactRef> {
    let host = state.host()?;
    Ok(ArtifactRef::Remote {
        video_id: video.id.clone(),
        url: host.embed_url(&video.id),
    })
}
