//! Recent recordings and remote library commands

use super::{AppState, CommandResult};
use crate::export::hosting::RemoteVideo;
use crate::library::recent::RecentRecording;

/// Saved recordings, newest first
pub async fn list_recent_recordings(state: &AppState) -> CommandResult<Vec<RecentRecording>> {
    Ok(state.recent.list()?)
}

pub async fn list_remote_videos(state: &AppState, limit: usize) -> CommandResult<Vec<RemoteVideo>> {
    let host = state.host()?;
    Ok(host.list_recent(limit).await?)
}

pub async fn get_remote_video(state: &AppState, id: String) -> CommandResult<RemoteVideo> {
    let host = state.host()?;
    Ok(host.get(&id).await?)
}

pub async fn delete_remote_video(state: &AppState, id: String) -> CommandResult<()> {
    let host = state.host()?;
    host.delete(&id).await?;
    Ok(())
}
