//! End-to-end recording sessions against the synthetic platform

use async_trait::async_trait;
use bytes::Bytes;
use open_recorder::capture::platform::PlatformError;
use open_recorder::capture::synthetic::{SyntheticPlatform, WEBM_MAGIC};
use open_recorder::capture::SourceKind;
use open_recorder::commands::{self, AppState};
use open_recorder::compositor::{ContainerRect, Point};
use open_recorder::config::{HostingSettings, RecordingSettings, StorageSettings};
use open_recorder::export::hosting::{PlaybackUrls, RemoteVideo, UploadMetadata, VideoHost};
use open_recorder::export::UploadStatus;
use open_recorder::library::{ArtifactRef, MemoryStore, RecentRecordings};
use open_recorder::recorder::RecorderState;
use open_recorder::{AppError, AppResult, RecordingCoordinator, RecordingEvent, RecordingMode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn settings() -> RecordingSettings {
    RecordingSettings {
        frame_width: 320,
        frame_height: 180,
        acquire_on_select: false,
        ..RecordingSettings::default()
    }
}

fn coordinator() -> (Arc<SyntheticPlatform>, RecordingCoordinator) {
    let platform = Arc::new(SyntheticPlatform::new());
    let coordinator = RecordingCoordinator::new(platform.clone(), settings());
    (platform, coordinator)
}

/// Video host that accepts or rejects every upload after a short delay
struct ScriptedHost {
    fail: bool,
    completed: AtomicUsize,
}

#[async_trait]
impl VideoHost for ScriptedHost {
    async fn upload(&self, bytes: Bytes, _mime_type: &str, metadata: &UploadMetadata) -> AppResult<RemoteVideo> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        if self.fail {
            return Err(AppError::UploadError("HTTP 503: service unavailable".to_string()));
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(RemoteVideo {
            id: format!("video-{}", bytes.len()),
            status: "queued".to_string(),
            playback: PlaybackUrls::default(),
            thumbnail: None,
            preview: None,
            duration_seconds: None,
            name: Some(metadata.name.clone()),
        })
    }

    async fn get(&self, id: &str) -> AppResult<RemoteVideo> {
        Err(AppError::UploadError(format!("{id} not found")))
    }

    async fn delete(&self, _id: &str) -> AppResult<()> {
        Ok(())
    }

    async fn list_recent(&self, _limit: usize) -> AppResult<Vec<RemoteVideo>> {
        Ok(Vec::new())
    }

    fn embed_url(&self, id: &str) -> String {
        format!("https://player.example/{id}")
    }
}

fn app_state(fail_uploads: bool) -> (Arc<SyntheticPlatform>, AppState, TempDir) {
    let (platform, state, _host, dir) = app_state_with_host(fail_uploads);
    (platform, state, dir)
}

fn app_state_with_host(
    fail_uploads: bool,
) -> (Arc<SyntheticPlatform>, AppState, Arc<ScriptedHost>, TempDir) {
    let dir = TempDir::new().unwrap();
    let (platform, coordinator) = coordinator();
    let storage = StorageSettings {
        download_dir: dir.path().join("downloads"),
        index_path: dir.path().join("recent.json"),
        context: "screen".to_string(),
    };
    let host = Arc::new(ScriptedHost {
        fail: fail_uploads,
        completed: AtomicUsize::new(0),
    });
    let state = AppState::with_parts(
        coordinator,
        RecentRecordings::new(Arc::new(MemoryStore::new())),
        storage,
        HostingSettings::default(),
    )
    .with_host(host.clone());
    (platform, state, host, dir)
}

#[tokio::test(start_paused = true)]
async fn test_screen_recording_three_seconds() {
    let (platform, coordinator) = coordinator();
    let mut events = coordinator.subscribe();

    coordinator.start().await.unwrap();
    assert_eq!(coordinator.state(), RecorderState::Recording);
    tokio::time::sleep(Duration::from_millis(3050)).await;
    assert_eq!(coordinator.snapshot().elapsed_label, "0:03");

    let artifact = coordinator.stop().await.unwrap().unwrap();
    assert_eq!(artifact.duration_seconds, 3);
    assert_eq!(artifact.mode, RecordingMode::Screen);
    assert_eq!(artifact.mime_type, "video/webm;codecs=vp8,opus");
    assert_eq!(&artifact.bytes[..4], &WEBM_MAGIC);
    assert_eq!(coordinator.finalize_count(), 1);
    assert_eq!(platform.live_track_count(), 0);

    let mut finalized = 0;
    let mut ticks = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            RecordingEvent::Finalized(summary) => {
                finalized += 1;
                assert_eq!(summary.id, artifact.id);
            }
            RecordingEvent::Tick(n) => ticks.push(n),
            _ => {}
        }
    }
    assert_eq!(finalized, 1);
    assert_eq!(ticks, vec![1, 2, 3]);
}

#[tokio::test(start_paused = true)]
async fn test_both_mode_drag_is_clamped() {
    let (_platform, coordinator) = coordinator();
    coordinator.set_container(ContainerRect::new(0.0, 0.0, 1000.0, 500.0));
    coordinator.select_mode(RecordingMode::Both).await.unwrap();
    coordinator.start().await.unwrap();

    let before = coordinator.overlay_geometry();
    assert!(coordinator.drag_start(Point::new(750.0, 350.0)));
    assert!(coordinator.overlay_geometry().is_dragging);

    // Pointer far past the right edge
    coordinator.drag_move(Point::new(1500.0, 350.0));
    coordinator.drag_end();

    let after = coordinator.overlay_geometry();
    let max_x = 100.0 - after.width_px / 1000.0 * 100.0;
    assert!((after.x_percent - max_x).abs() < 1e-9);
    assert!((after.y_percent - before.y_percent).abs() < 1e-9);
    assert!(!after.is_dragging);

    tokio::time::sleep(Duration::from_millis(1050)).await;
    let png = coordinator.composite_snapshot_png().unwrap();
    assert_eq!(&png[1..4], b"PNG");

    let artifact = coordinator.stop().await.unwrap().unwrap();
    assert_eq!(artifact.mode, RecordingMode::Both);
    assert_eq!(artifact.duration_seconds, 1);
}

#[tokio::test]
async fn test_camera_denied_in_both_mode_releases_screen() {
    let (platform, coordinator) = coordinator();
    platform.fail_camera(PlatformError::NotAllowed("Permission denied".to_string()));

    coordinator.select_mode(RecordingMode::Both).await.unwrap();
    let err = coordinator.start().await.unwrap_err();

    assert_eq!(err.code(), "PERMISSION_DENIED");
    assert_eq!(coordinator.state(), RecorderState::Idle);
    assert_eq!(coordinator.last_error().unwrap().code, "PERMISSION_DENIED");

    let screens = platform.issued(SourceKind::Screen);
    assert_eq!(screens.len(), 1);
    assert!(!screens[0].is_live());
    assert_eq!(platform.live_track_count(), 0);
    assert!(!coordinator.acquirer().screen_preview().is_attached());
}

#[tokio::test(start_paused = true)]
async fn test_discard_after_stop_keeps_nothing() {
    let (platform, state, _dir) = app_state(false);

    commands::recording::start_recording(&state).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    let summary = commands::recording::stop_recording(&state).await.unwrap();
    assert!(summary.is_some());

    commands::recording::discard_recording(&state).await.unwrap();

    let snapshot = commands::recording::get_recording_state(&state).await.unwrap();
    assert_eq!(snapshot.state, RecorderState::Idle);
    assert_eq!(snapshot.elapsed_seconds, 0);
    assert!(snapshot.artifact.is_none());
    assert!(state.coordinator.artifact().is_none());
    assert!(state.recent.is_empty().unwrap());
    assert_eq!(platform.live_track_count(), 0);

    let err = commands::export::download_recording(&state).await.unwrap_err();
    assert_eq!(err.code, "INVALID_STATE");
}

#[tokio::test(start_paused = true)]
async fn test_mode_switch_rejected_while_recording() {
    let (_platform, coordinator) = coordinator();
    coordinator.start().await.unwrap();

    let err = coordinator.select_mode(RecordingMode::Camera).await.unwrap_err();
    assert_eq!(err.code(), "INVALID_STATE");
    assert_eq!(coordinator.mode(), RecordingMode::Screen);
    assert_eq!(coordinator.state(), RecorderState::Recording);

    tokio::time::sleep(Duration::from_millis(1050)).await;
    assert_eq!(coordinator.elapsed_seconds(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_double_stop_is_noop() {
    let (platform, coordinator) = coordinator();
    coordinator.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;

    let first = coordinator.stop().await.unwrap();
    assert!(first.is_some());
    let releases = platform.device_releases();
    assert!(releases > 0);

    assert!(coordinator.stop().await.unwrap().is_none());
    assert_eq!(platform.device_releases(), releases);
    assert_eq!(coordinator.finalize_count(), 1);
    assert_eq!(coordinator.state(), RecorderState::Stopped);
}

#[tokio::test(start_paused = true)]
async fn test_encoder_failure_forces_stop() {
    let (platform, coordinator) = coordinator();
    platform.fail_encoder_after(Duration::from_millis(1500));

    coordinator.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;

    assert_eq!(coordinator.state(), RecorderState::Stopped);
    let artifact = coordinator.artifact().unwrap();
    assert_eq!(artifact.duration_seconds, 1);
    assert_eq!(&artifact.bytes[..4], &WEBM_MAGIC);
    assert_eq!(coordinator.last_error().unwrap().code, "ENCODER_FAILURE");
    assert_eq!(coordinator.finalize_count(), 1);
    assert_eq!(platform.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_screen_share_end_stops_recording() {
    let (platform, coordinator) = coordinator();
    coordinator.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(2050)).await;

    assert!(platform.end_screen_share());
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(coordinator.state(), RecorderState::Stopped);
    assert_eq!(coordinator.artifact().unwrap().duration_seconds, 2);
    assert_eq!(coordinator.finalize_count(), 1);
    assert_eq!(platform.live_track_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_pause_resume_through_commands() {
    let (_platform, state, _dir) = app_state(false);

    commands::recording::start_recording(&state).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    let paused = commands::recording::pause_recording(&state).await.unwrap();
    assert!(paused.is_paused);
    assert!(commands::recording::pause_recording(&state).await.is_err());

    tokio::time::sleep(Duration::from_secs(4)).await;
    let resumed = commands::recording::resume_recording(&state).await.unwrap();
    assert!(resumed.is_recording);
    assert_eq!(resumed.elapsed_seconds, 1);

    tokio::time::sleep(Duration::from_millis(2050)).await;
    let summary = commands::recording::stop_recording(&state).await.unwrap().unwrap();
    assert_eq!(summary.duration_seconds, 3);
    assert_eq!(summary.segment_count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_upload_failure_keeps_artifact_for_download() {
    let (_platform, state, _dir) = app_state(true);

    commands::recording::start_recording(&state).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    let summary = commands::recording::stop_recording(&state).await.unwrap().unwrap();

    let status = commands::export::start_upload(&state, "Demo".to_string(), None)
        .await
        .unwrap();
    assert_eq!(status, UploadStatus::Pending);

    let err = commands::export::wait_for_upload(&state).await.unwrap_err();
    assert_eq!(err.code, "UPLOAD_ERROR");
    assert!(matches!(
        commands::export::get_upload_status(&state).await.unwrap(),
        Some(UploadStatus::Failed(_))
    ));

    assert_eq!(state.coordinator.state(), RecorderState::Stopped);
    let path = commands::export::download_recording(&state).await.unwrap();
    let written = std::fs::read(&path).unwrap();
    assert_eq!(written.len(), summary.size_bytes);
    assert_eq!(&written[..4], &WEBM_MAGIC);
    assert!(path.file_name().unwrap().to_string_lossy().starts_with("screen-recording-"));

    let entry = commands::export::save_recording(&state, String::new(), ArtifactRef::Local { path })
        .await
        .unwrap();
    assert_eq!(entry.title, "Untitled recording");
    assert_eq!(state.recent.len().unwrap(), 1);
    assert_eq!(state.coordinator.state(), RecorderState::Idle);
}

#[tokio::test(start_paused = true)]
async fn test_upload_success_saves_remote_reference() {
    let (_platform, state, _dir) = app_state(false);

    commands::recording::select_mode(&state, "camera".to_string()).await.unwrap();
    commands::recording::start_recording(&state).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2050)).await;
    let summary = commands::recording::stop_recording(&state).await.unwrap().unwrap();
    assert_eq!(summary.mode, RecordingMode::Camera);

    commands::export::start_upload(&state, "Standup".to_string(), None)
        .await
        .unwrap();
    assert!(commands::export::start_upload(&state, "Again".to_string(), None)
        .await
        .is_err());

    let video = commands::export::wait_for_upload(&state).await.unwrap();
    assert_eq!(video.id, format!("video-{}", summary.size_bytes));

    let location = commands::export::remote_ref(&state, &video).unwrap();
    let entry = commands::export::save_recording(&state, "Standup".to_string(), location)
        .await
        .unwrap();
    match &entry.artifact {
        ArtifactRef::Remote { video_id, url } => {
            assert_eq!(video_id, &video.id);
            assert_eq!(url, &format!("https://player.example/{}", video.id));
        }
        other => panic!("expected a remote reference, got {other:?}"),
    }

    let recent = commands::library::list_recent_recordings(&state).await.unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].duration_seconds, 2);
    assert_eq!(recent[0].mode, RecordingMode::Camera);
}

#[tokio::test(start_paused = true)]
async fn test_discard_cancels_pending_upload() {
    let (platform, state, host, _dir) = app_state_with_host(false);

    commands::recording::start_recording(&state).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1050)).await;
    commands::recording::stop_recording(&state).await.unwrap().unwrap();

    let status = commands::export::start_upload(&state, "Draft".to_string(), None)
        .await
        .unwrap();
    assert!(status.is_pending());
    commands::recording::discard_recording(&state).await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(host.completed.load(Ordering::SeqCst), 0);
    assert!(commands::export::get_upload_status(&state).await.unwrap().is_none());
    assert!(state.recent.is_empty().unwrap());
    assert!(state.coordinator.artifact().is_none());
    assert_eq!(platform.live_track_count(), 0);
}
