//! Recording-related commands

use super::{AppState, CommandResult};
use crate::compositor::overlay::{ContainerRect, OverlayGeometry, Point, ResizeDirection};
use crate::recorder::artifact::ArtifactSummary;
use crate::recorder::state::{RecordingMode, SessionSnapshot};
use crate::utils::error::{AppError, ErrorResponse};

/// Select screen, camera or both
pub async fn select_mode(state: &AppState, mode: String) -> CommandResult<RecordingMode> {
    let mode: RecordingMode = mode
        .parse()
        .map_err(|e: String| ErrorResponse::from(AppError::InvalidState(e)))?;
    state.coordinator.select_mode(mode).await?;
    Ok(mode)
}

pub async fn start_recording(state: &AppState) -> CommandResult<SessionSnapshot> {
    state.coordinator.start().await?;
    Ok(state.coordinator.snapshot())
}

pub async fn pause_recording(state: &AppState) -> CommandResult<SessionSnapshot> {
    state.coordinator.pause()?;
    Ok(state.coordinator.snapshot())
}

pub async fn resume_recording(state: &AppState) -> CommandResult<SessionSnapshot> {
    state.coordinator.resume()?;
    Ok(state.coordinator.snapshot())
}

/// Stop and finalize; `None` when nothing was recording
pub async fn stop_recording(state: &AppState) -> CommandResult<Option<ArtifactSummary>> {
    let artifact = state.coordinator.stop().await?;
    Ok(artifact.map(|a| a.summary()))
}

pub async fn discard_recording(state: &AppState) -> CommandResult<()> {
    state.coordinator.discard()?;
    if let Some(upload) = state.upload.lock().take() {
        upload.cancel();
    }
    Ok(())
}

pub async fn get_recording_state(state: &AppState) -> CommandResult<SessionSnapshot> {
    Ok(state.coordinator.snapshot())
}

/// Begin dragging the camera overlay; returns whether the drag started
pub async fn overlay_drag_start(state: &AppState, x: f64, y: f64) -> CommandResult<bool> {
    Ok(state.coordinator.drag_start(Point::new(x, y)))
}

pub async fn overlay_drag_move(state: &AppState, x: f64, y: f64) -> CommandResult<OverlayGeometry> {
    state.coordinator.drag_move(Point::new(x, y));
    Ok(state.coordinator.overlay_geometry())
}

pub async fn overlay_drag_end(state: &AppState) -> CommandResult<OverlayGeometry> {
    state.coordinator.drag_end();
    Ok(state.coordinator.overlay_geometry())
}

pub async fn resize_overlay(
    state: &AppState,
    direction: ResizeDirection,
) -> CommandResult<OverlayGeometry> {
    Ok(state.coordinator.resize_overlay(direction))
}

pub async fn set_overlay_container(
    state: &AppState,
    container: ContainerRect,
) -> CommandResult<OverlayGeometry> {
    state.coordinator.set_container(container);
    Ok(state.coordinator.overlay_geometry())
}

/// PNG of the current composite frame
pub async fn get_composite_snapshot(state: &AppState) -> CommandResult<Vec<u8>> {
    Ok(state.coordinator.composite_snapshot_png()?)
}
