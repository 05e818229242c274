//! Capture type definitions
//!
//! Platform-agnostic tracks, streams and frames. A [`MediaStream`] is the
//! ownership handle for a live capture source; releasing it stops every track
//! it owns exactly once.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Kind of media carried by a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Video,
    Audio,
}

/// Where a stream comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Display capture
    Screen,
    /// Camera and its microphone
    Camera,
    /// Microphone only
    Microphone,
    /// Synthesized from other streams
    Composite,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Screen => write!(f, "screen"),
            SourceKind::Camera => write!(f, "camera"),
            SourceKind::Microphone => write!(f, "microphone"),
            SourceKind::Composite => write!(f, "composite"),
        }
    }
}

/// Video resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// A decoded video frame in RGBA8 layout
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    /// Tightly packed RGBA pixels, `width * height * 4` bytes
    pub data: Bytes,
    pub timestamp_ms: f64,
}

impl VideoFrame {
    pub fn new(width: u32, height: u32, data: Bytes, timestamp_ms: f64) -> Self {
        Self {
            width,
            height,
            data,
            timestamp_ms,
        }
    }

    /// RGBA value at (x, y), or `None` outside the frame
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = ((y * self.width + x) * 4) as usize;
        self.data
            .get(idx..idx + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Supplies the most recently decoded frame of a video track
pub trait FrameSource: Send + Sync {
    /// `None` until the first frame has been decoded
    fn latest_frame(&self) -> Option<VideoFrame>;
}

/// Hardware (or virtual device) behind a track
pub trait TrackDevice: Send + Sync {
    /// Release the device. Called at most once per track.
    fn release(&self);
}

struct TrackInner {
    id: String,
    kind: TrackKind,
    label: String,
    device: Option<Arc<dyn TrackDevice>>,
    frames: Option<Arc<dyn FrameSource>>,
    stopped: AtomicBool,
    ended_tx: watch::Sender<bool>,
}

/// A single live audio or video track
///
/// Clones share the same underlying track, so stopping any clone stops all.
#[derive(Clone)]
pub struct MediaTrack {
    inner: Arc<TrackInner>,
}

impl MediaTrack {
    /// Create a live track
    pub fn new(kind: TrackKind, label: impl Into<String>) -> Self {
        Self::build(kind, label.into(), None, None)
    }

    /// Create a live track backed by a device and, for video, a frame source
    pub fn with_parts(
        kind: TrackKind,
        label: impl Into<String>,
        device: Option<Arc<dyn TrackDevice>>,
        frames: Option<Arc<dyn FrameSource>>,
    ) -> Self {
        Self::build(kind, label.into(), device, frames)
    }

    fn build(
        kind: TrackKind,
        label: String,
        device: Option<Arc<dyn TrackDevice>>,
        frames: Option<Arc<dyn FrameSource>>,
    ) -> Self {
        let (ended_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(TrackInner {
                id: Uuid::new_v4().to_string(),
                kind,
                label,
                device,
                frames,
                stopped: AtomicBool::new(false),
                ended_tx,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn kind(&self) -> TrackKind {
        self.inner.kind
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Whether the track is still delivering media
    pub fn is_live(&self) -> bool {
        !self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Stop the track and release its device.
    ///
    /// Returns `true` if this call performed the stop; later calls are no-ops.
    pub fn stop(&self) -> bool {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        if let Some(device) = &self.inner.device {
            device.release();
        }
        tracing::debug!("Stopped {:?} track '{}'", self.inner.kind, self.inner.label);
        true
    }

    /// Platform-side end of the track (device unplugged, share cancelled).
    ///
    /// Stops the track and notifies [`MediaTrack::ended`] subscribers. Does
    /// nothing on a track that is already stopped.
    pub fn end(&self) {
        if self.stop() {
            self.inner.ended_tx.send_replace(true);
        }
    }

    /// Receiver that flips to `true` when the platform ends the track
    pub fn ended(&self) -> watch::Receiver<bool> {
        self.inner.ended_tx.subscribe()
    }

    /// Latest decoded frame; `None` for audio, stopped tracks, or before the first frame
    pub fn latest_frame(&self) -> Option<VideoFrame> {
        if !self.is_live() {
            return None;
        }
        self.inner.frames.as_ref().and_then(|f| f.latest_frame())
    }
}

impl fmt::Debug for MediaTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaTrack")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("label", &self.inner.label)
            .field("live", &self.is_live())
            .finish()
    }
}

/// Ownership handle for a live capture source
#[derive(Debug)]
pub struct MediaStream {
    id: String,
    kind: SourceKind,
    tracks: Vec<MediaTrack>,
    released: AtomicBool,
}

impl MediaStream {
    pub fn new(kind: SourceKind, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            tracks,
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn video_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Video)
    }

    pub fn audio_tracks(&self) -> impl Iterator<Item = &MediaTrack> {
        self.tracks.iter().filter(|t| t.kind() == TrackKind::Audio)
    }

    /// First video track, if any
    pub fn video_track(&self) -> Option<&MediaTrack> {
        self.video_tracks().next()
    }

    /// Whether any track is still live
    pub fn is_active(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }

    /// Stop every track. Returns the number of tracks stopped by this call;
    /// releasing an already released stream is a no-op.
    pub fn release(&self) -> usize {
        if self.released.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let stopped = self.tracks.iter().filter(|t| t.stop()).count();
        tracing::debug!(
            "Released {} stream {} ({} tracks stopped)",
            self.kind,
            self.id,
            stopped
        );
        stopped
    }
}
