//! Media source acquisition
//!
//! Requests screen and camera streams from the platform, maps platform
//! failures onto the application taxonomy, and guarantees that a failed
//! multi-source acquisition leaves nothing running.

use super::platform::{DisplayConstraints, MediaPlatform, PlatformError, UserMediaConstraints};
use super::traits::MediaStream;
use crate::config::RecordingSettings;
use crate::recorder::state::RecordingMode;
use crate::utils::error::{AppError, AppResult};
use parking_lot::RwLock;
use std::sync::Arc;

/// Hidden preview surface a live stream is attached to
#[derive(Debug)]
pub struct PreviewSink {
    name: &'static str,
    source: RwLock<Option<Arc<MediaStream>>>,
}

impl PreviewSink {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            source: RwLock::new(None),
        }
    }

    pub fn attach(&self, stream: Arc<MediaStream>) {
        tracing::debug!("Attaching stream {} to {} preview", stream.id(), self.name);
        *self.source.write() = Some(stream);
    }

    /// Detach the current stream, if any
    pub fn clear(&self) {
        if self.source.write().take().is_some() {
            tracing::debug!("Cleared {} preview", self.name);
        }
    }

    /// Detach `stream` if it is the one currently shown
    pub fn clear_if(&self, stream: &Arc<MediaStream>) -> bool {
        let mut source = self.source.write();
        if source.as_ref().is_some_and(|s| Arc::ptr_eq(s, stream)) {
            *source = None;
            tracing::debug!("Cleared {} preview of stream {}", self.name, stream.id());
            true
        } else {
            false
        }
    }

    pub fn current(&self) -> Option<Arc<MediaStream>> {
        self.source.read().clone()
    }

    pub fn is_attached(&self) -> bool {
        self.source.read().is_some()
    }
}

/// Streams held for one recording mode
#[derive(Debug, Clone)]
pub enum CaptureSources {
    Screen {
        screen: Arc<MediaStream>,
        microphone: Option<Arc<MediaStream>>,
    },
    Camera {
        camera: Arc<MediaStream>,
    },
    Both {
        screen: Arc<MediaStream>,
        camera: Arc<MediaStream>,
    },
}

impl CaptureSources {
    pub fn mode(&self) -> RecordingMode {
        match self {
            CaptureSources::Screen { .. } => RecordingMode::Screen,
            CaptureSources::Camera { .. } => RecordingMode::Camera,
            CaptureSources::Both { .. } => RecordingMode::Both,
        }
    }

    pub fn screen(&self) -> Option<&Arc<MediaStream>> {
        match self {
            CaptureSources::Screen { screen, .. } | CaptureSources::Both { screen, .. } => Some(screen),
            CaptureSources::Camera { .. } => None,
        }
    }

    pub fn camera(&self) -> Option<&Arc<MediaStream>> {
        match self {
            CaptureSources::Camera { camera } | CaptureSources::Both { camera, .. } => Some(camera),
            CaptureSources::Screen { .. } => None,
        }
    }

    pub fn streams(&self) -> Vec<&Arc<MediaStream>> {
        match self {
            CaptureSources::Screen { screen, microphone } => {
                let mut streams = vec![screen];
                streams.extend(microphone.iter());
                streams
            }
            CaptureSources::Camera { camera } => vec![camera],
            CaptureSources::Both { screen, camera } => vec![screen, camera],
        }
    }

    /// Whether every held stream still has a live track
    pub fn is_live(&self) -> bool {
        self.streams().iter().all(|s| s.is_active())
    }

    /// Release every held stream; returns the number of tracks stopped
    pub fn release(&self) -> usize {
        self.streams().iter().map(|s| s.release()).sum()
    }
}

/// Requests capture streams from the platform
pub struct MediaSourceAcquirer {
    platform: Arc<dyn MediaPlatform>,
    settings: RecordingSettings,
    screen_preview: Arc<PreviewSink>,
    camera_preview: Arc<PreviewSink>,
}

impl MediaSourceAcquirer {
    pub fn new(platform: Arc<dyn MediaPlatform>, settings: RecordingSettings) -> Self {
        Self {
            platform,
            settings,
            screen_preview: Arc::new(PreviewSink::new("screen")),
            camera_preview: Arc::new(PreviewSink::new("camera")),
        }
    }

    pub fn screen_preview(&self) -> &Arc<PreviewSink> {
        &self.screen_preview
    }

    pub fn camera_preview(&self) -> &Arc<PreviewSink> {
        &self.camera_preview
    }

    /// Detach both preview surfaces
    pub fn clear_previews(&self) {
        self.screen_preview.clear();
        self.camera_preview.clear();
    }

    /// Detach only the previews still showing streams from `sources`
    pub fn detach(&self, sources: &CaptureSources) {
        for stream in sources.streams() {
            self.screen_preview.clear_if(stream);
            self.camera_preview.clear_if(stream);
        }
    }

    /// Request display capture, video only
    pub async fn acquire_screen(&self) -> AppResult<Arc<MediaStream>> {
        let constraints = DisplayConstraints {
            video: true,
            audio: false,
            ideal_width: self.settings.frame_width,
            ideal_height: self.settings.frame_height,
            frame_rate: self.settings.frame_rate,
        };

        let stream = self
            .platform
            .get_display_media(&constraints)
            .await
            .map(Arc::new)
            .map_err(screen_error)?;

        tracing::info!("Acquired screen stream {}", stream.id());
        self.screen_preview.attach(stream.clone());
        Ok(stream)
    }

    /// Request camera video with its microphone
    pub async fn acquire_camera(&self) -> AppResult<Arc<MediaStream>> {
        let constraints = UserMediaConstraints {
            video: true,
            audio: true,
            ideal_width: 1280,
            ideal_height: 720,
        };

        let stream = self
            .platform
            .get_user_media(&constraints)
            .await
            .map(Arc::new)
            .map_err(|e| user_media_error(e, "camera"))?;

        tracing::info!("Acquired camera stream {}", stream.id());
        self.camera_preview.attach(stream.clone());
        Ok(stream)
    }

    /// Request a microphone-only stream
    pub async fn acquire_microphone(&self) -> AppResult<Arc<MediaStream>> {
        let constraints = UserMediaConstraints {
            video: false,
            audio: true,
            ideal_width: 0,
            ideal_height: 0,
        };

        let stream = self
            .platform
            .get_user_media(&constraints)
            .await
            .map(Arc::new)
            .map_err(|e| user_media_error(e, "microphone"))?;

        tracing::info!("Acquired microphone stream {}", stream.id());
        Ok(stream)
    }

    /// Acquire everything `mode` needs. On failure nothing acquired along the
    /// way is left running.
    pub async fn acquire(&self, mode: RecordingMode) -> AppResult<CaptureSources> {
        match mode {
            RecordingMode::Screen => {
                let screen = self.acquire_screen().await?;
                let microphone = if self.settings.screen_microphone {
                    match self.acquire_microphone().await {
                        Ok(mic) => Some(mic),
                        Err(e) => {
                            tracing::warn!("Recording screen without microphone: {}", e);
                            None
                        }
                    }
                } else {
                    None
                };
                Ok(CaptureSources::Screen { screen, microphone })
            }
            RecordingMode::Camera => {
                let camera = self.acquire_camera().await?;
                Ok(CaptureSources::Camera { camera })
            }
            RecordingMode::Both => {
                let screen = self.acquire_screen().await?;
                match self.acquire_camera().await {
                    Ok(camera) => Ok(CaptureSources::Both { screen, camera }),
                    Err(e) => {
                        tracing::warn!("Camera acquisition failed, releasing screen: {}", e);
                        screen.release();
                        self.screen_preview.clear();
                        Err(e)
                    }
                }
            }
        }
    }
}

fn screen_error(error: PlatformError) -> AppError {
    tracing::warn!("Screen capture request failed: {}", error);
    match error {
        PlatformError::NotAllowed(_) | PlatformError::Aborted(_) => {
            AppError::PermissionDenied("screen".to_string())
        }
        other => AppError::NotSupported(format!("Screen capture ({other})")),
    }
}

fn user_media_error(error: PlatformError, device: &str) -> AppError {
    tracing::warn!("{} request failed: {}", device, error);
    match error {
        PlatformError::NotAllowed(_) | PlatformError::Aborted(_) => {
            AppError::PermissionDenied(device.to_string())
        }
        PlatformError::NotSupported(reason) => {
            AppError::NotSupported(format!("{device} access ({reason})"))
        }
        PlatformError::NotFound(_) | PlatformError::NotReadable(_) | PlatformError::Other(_) => {
            AppError::DeviceUnavailable(device.to_string())
        }
    }
}
