//! Screen + camera compositor
//!
//! Repaints an off-screen surface at a fixed rate: screen stretched to the
//! full frame, camera clipped to a circle at the overlay position, and a
//! white ring around the circle. The surface is exposed as a capturable
//! stream with the camera's audio attached directly.

use super::overlay::OverlayController;
use super::surface::RasterSurface;
use crate::capture::traits::{
    FrameSource, MediaStream, MediaTrack, SourceKind, TrackKind, VideoFrame,
};
use crate::utils::error::{AppError, AppResult};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const BORDER_COLOR: [u8; 4] = [255, 255, 255, 255];

/// Output surface parameters
#[derive(Debug, Clone, Copy)]
pub struct CompositorOptions {
    pub width: u32,
    pub height: u32,
    pub frame_rate: u32,
    pub border_width: u32,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            frame_rate: 30,
            border_width: 4,
        }
    }
}

struct RenderContext {
    surface: Mutex<RasterSurface>,
    screen: MediaTrack,
    camera: MediaTrack,
    overlay: Arc<RwLock<OverlayController>>,
    border_width: f64,
    frame_period_ms: f64,
    frames_rendered: AtomicU64,
}

impl RenderContext {
    fn render(&self) {
        let mut surface = self.surface.lock();

        // 1. Clear
        surface.clear();

        // 2. Screen, full frame. No decoded frame yet means no layer this tick.
        if let Some(frame) = self.screen.latest_frame() {
            surface.draw_stretched(&frame);
        }

        // 3. Overlay rectangle from the current geometry
        let rect = {
            let overlay = self.overlay.read();
            overlay
                .geometry()
                .frame_rect(surface.width(), surface.height(), &overlay.container())
        };

        // 4. Camera inside the inscribed circle
        if let Some(frame) = self.camera.latest_frame() {
            surface.draw_circle_clipped(&frame, rect);
        }

        // 5. Ring
        let (cx, cy) = rect.center();
        surface.stroke_circle(cx, cy, rect.inscribed_radius(), self.border_width, BORDER_COLOR);

        self.frames_rendered.fetch_add(1, Ordering::Relaxed);
    }

    fn rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }
}

/// Frame source reading back the composite surface
struct SurfaceFrames {
    ctx: Arc<RenderContext>,
}

impl FrameSource for SurfaceFrames {
    fn latest_frame(&self) -> Option<VideoFrame> {
        let rendered = self.ctx.rendered();
        if rendered == 0 {
            return None;
        }
        let timestamp_ms = rendered as f64 * self.ctx.frame_period_ms;
        Some(self.ctx.surface.lock().snapshot(timestamp_ms))
    }
}

/// Real-time compositor for screen-with-camera recordings
pub struct Compositor {
    ctx: Arc<RenderContext>,
    camera_audio: Vec<MediaTrack>,
    frame_rate: u32,
    task: Option<JoinHandle<()>>,
}

impl Compositor {
    /// Create a compositor over the first video track of each source
    pub fn new(
        screen: &MediaStream,
        camera: &MediaStream,
        overlay: Arc<RwLock<OverlayController>>,
        options: CompositorOptions,
    ) -> AppResult<Self> {
        let screen_track = screen
            .video_track()
            .cloned()
            .ok_or_else(|| AppError::DeviceUnavailable("screen video track".to_string()))?;
        let camera_track = camera
            .video_track()
            .cloned()
            .ok_or_else(|| AppError::DeviceUnavailable("camera video track".to_string()))?;
        let frame_rate = options.frame_rate.max(1);

        Ok(Self {
            ctx: Arc::new(RenderContext {
                surface: Mutex::new(RasterSurface::new(options.width, options.height)),
                screen: screen_track,
                camera: camera_track,
                overlay,
                border_width: options.border_width as f64,
                frame_period_ms: 1000.0 / frame_rate as f64,
                frames_rendered: AtomicU64::new(0),
            }),
            camera_audio: camera.audio_tracks().cloned().collect(),
            frame_rate,
            task: None,
        })
    }

    /// Paint one composite frame
    pub fn render_frame(&self) {
        self.ctx.render();
    }

    /// Start the periodic repaint task; no-op while already running
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }
        let ctx = self.ctx.clone();
        let period = Duration::from_secs_f64(1.0 / self.frame_rate as f64);
        self.task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                ctx.render();
            }
        }));
        tracing::info!("Compositor started at {}fps", self.frame_rate);
    }

    /// Halt the repaint task. Takes effect immediately; safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            tracing::info!("Compositor stopped after {} frames", self.ctx.rendered());
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn frames_rendered(&self) -> u64 {
        self.ctx.rendered()
    }

    /// Composite stream: surface video at the configured rate plus the
    /// camera's audio tracks, untouched
    pub fn capture_stream(&self) -> MediaStream {
        let video = MediaTrack::with_parts(
            TrackKind::Video,
            "composite",
            None,
            Some(Arc::new(SurfaceFrames {
                ctx: self.ctx.clone(),
            })),
        );
        let mut tracks = vec![video];
        tracks.extend(self.camera_audio.iter().cloned());
        MediaStream::new(SourceKind::Composite, tracks)
    }

    /// Current composite frame as PNG
    pub fn snapshot_png(&self) -> AppResult<Vec<u8>> {
        self.ctx.surface.lock().encode_png()
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::overlay::{ContainerRect, ResizeDirection};
    use bytes::Bytes;

    struct Solid(u32, u32, [u8; 3]);

    impl FrameSource for Solid {
        fn latest_frame(&self) -> Option<VideoFrame> {
            let mut data = Vec::new();
            for _ in 0..self.0 * self.1 {
                data.extend_from_slice(&[self.2[0], self.2[1], self.2[2], 255]);
            }
            Some(VideoFrame::new(self.0, self.1, Bytes::from(data), 0.0))
        }
    }

    struct NotReady;

    impl FrameSource for NotReady {
        fn latest_frame(&self) -> Option<VideoFrame> {
            None
        }
    }

    fn stream(kind: SourceKind, frames: Arc<dyn FrameSource>, with_audio: bool) -> MediaStream {
        let mut tracks = vec![MediaTrack::with_parts(TrackKind::Video, "video", None, Some(frames))];
        if with_audio {
            tracks.push(MediaTrack::new(TrackKind::Audio, "mic"));
        }
        MediaStream::new(kind, tracks)
    }

    fn overlay() -> Arc<RwLock<OverlayController>> {
        let mut controller = OverlayController::new(ContainerRect::new(0.0, 0.0, 160.0, 90.0));
        for _ in 0..4 {
            controller.resize(ResizeDirection::Decrease);
        }
        controller.move_to(0.0, 0.0);
        Arc::new(RwLock::new(controller))
    }

    fn options() -> CompositorOptions {
        CompositorOptions {
            width: 160,
            height: 90,
            frame_rate: 30,
            border_width: 2,
        }
    }

    #[test]
    fn test_render_layers() {
        let screen = stream(SourceKind::Screen, Arc::new(Solid(8, 8, [0, 0, 255])), false);
        let camera = stream(SourceKind::Camera, Arc::new(Solid(4, 4, [0, 255, 0])), true);
        let compositor = Compositor::new(&screen, &camera, overlay(), options()).unwrap();

        compositor.render_frame();
        let frame = compositor.capture_stream().video_track().unwrap().latest_frame().unwrap();

        // Overlay is 100x75 at the origin: circle centered at (50, 37.5), r = 37.5
        assert_eq!(frame.pixel(50, 37), Some([0, 255, 0, 255]));
        assert_eq!(frame.pixel(150, 80), Some([0, 0, 255, 255]));
        assert_eq!(frame.pixel(1, 1), Some([0, 0, 255, 255]));
        assert_eq!(frame.pixel(87, 37), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_missing_camera_frame_skips_layer() {
        let screen = stream(SourceKind::Screen, Arc::new(Solid(8, 8, [0, 0, 255])), false);
        let camera = stream(SourceKind::Camera, Arc::new(NotReady), false);
        let compositor = Compositor::new(&screen, &camera, overlay(), options()).unwrap();

        compositor.render_frame();
        let frame = compositor.capture_stream().video_track().unwrap().latest_frame().unwrap();
        assert_eq!(frame.pixel(50, 37), Some([0, 0, 255, 255]));
    }

    #[test]
    fn test_capture_stream_carries_camera_audio_only() {
        let screen = stream(SourceKind::Screen, Arc::new(Solid(8, 8, [0, 0, 255])), true);
        let camera = stream(SourceKind::Camera, Arc::new(Solid(4, 4, [0, 255, 0])), true);
        let compositor = Compositor::new(&screen, &camera, overlay(), options()).unwrap();

        let output = compositor.capture_stream();
        assert_eq!(output.kind(), SourceKind::Composite);
        assert_eq!(output.video_tracks().count(), 1);
        let audio: Vec<_> = output.audio_tracks().collect();
        assert_eq!(audio.len(), 1);
        assert_eq!(audio[0].id(), camera.audio_tracks().next().unwrap().id());
        assert!(output.video_track().unwrap().latest_frame().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_stops_immediately() {
        let screen = stream(SourceKind::Screen, Arc::new(Solid(8, 8, [0, 0, 255])), false);
        let camera = stream(SourceKind::Camera, Arc::new(Solid(4, 4, [0, 255, 0])), false);
        let mut compositor = Compositor::new(&screen, &camera, overlay(), options()).unwrap();

        compositor.start();
        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert!(compositor.frames_rendered() >= 29);

        compositor.stop();
        assert!(!compositor.is_running());
        let rendered = compositor.frames_rendered();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(compositor.frames_rendered(), rendered);
    }
}
