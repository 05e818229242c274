//! Synthetic media platform
//!
//! A device-free [`MediaPlatform`] producing gradient video, silent audio and
//! a WebM-framed chunk stream. Failures can be injected per device so every
//! acquisition and encoding path can be exercised offline.

use super::platform::{
    Capabilities, DisplayConstraints, MediaPlatform, PlatformError, UserMediaConstraints,
};
use super::traits::{FrameSource, MediaStream, MediaTrack, SourceKind, TrackDevice, TrackKind, VideoFrame};
use crate::recorder::encoder::{EncoderBackend, EncoderEvent, EncoderOptions, EncoderSink};
use async_trait::async_trait;
use bytes::{BufMut, Bytes, BytesMut};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// EBML magic opening every WebM file
pub const WEBM_MAGIC: [u8; 4] = [0x1A, 0x45, 0xDF, 0xA3];

/// Gradient test pattern, fixed per source
pub struct SyntheticFrames {
    width: u32,
    height: u32,
    data: Bytes,
    epoch: Instant,
}

impl SyntheticFrames {
    pub fn new(width: u32, height: u32, seed: u8) -> Self {
        let mut data = vec![0u8; (width as usize) * (height as usize) * 4];
        for y in 0..height {
            for x in 0..width {
                let idx = ((y * width + x) * 4) as usize;
                data[idx] = seed.wrapping_add((x % 256) as u8);
                data[idx + 1] = seed.wrapping_add((y % 256) as u8);
                data[idx + 2] = seed.wrapping_add(((x + y) % 256) as u8);
                data[idx + 3] = 255;
            }
        }
        Self {
            width,
            height,
            data: Bytes::from(data),
            epoch: Instant::now(),
        }
    }
}

impl FrameSource for SyntheticFrames {
    fn latest_frame(&self) -> Option<VideoFrame> {
        let timestamp_ms = self.epoch.elapsed().as_secs_f64() * 1000.0;
        Some(VideoFrame::new(self.width, self.height, self.data.clone(), timestamp_ms))
    }
}

/// Virtual device counting its releases
struct SyntheticDevice {
    releases: Arc<AtomicUsize>,
}

impl TrackDevice for SyntheticDevice {
    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// A stream handed out by the platform, kept for inspection
#[derive(Debug, Clone)]
pub struct IssuedStream {
    pub kind: SourceKind,
    pub stream_id: String,
    tracks: Vec<MediaTrack>,
}

impl IssuedStream {
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }
}

#[derive(Default)]
struct Faults {
    screen: Option<PlatformError>,
    camera: Option<PlatformError>,
    microphone: Option<PlatformError>,
    encoder_after: Option<Duration>,
}

/// Offline platform for tests and the command-line recorder
pub struct SyntheticPlatform {
    capabilities: Mutex<Capabilities>,
    supported_types: Mutex<Vec<String>>,
    faults: Mutex<Faults>,
    screen_size: (u32, u32),
    camera_size: (u32, u32),
    issued: Mutex<Vec<IssuedStream>>,
    releases: Arc<AtomicUsize>,
}

impl Default for SyntheticPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl SyntheticPlatform {
    pub fn new() -> Self {
        Self {
            capabilities: Mutex::new(Capabilities::all()),
            supported_types: Mutex::new(vec![
                "video/webm;codecs=vp8,opus".to_string(),
                "video/webm".to_string(),
            ]),
            faults: Mutex::new(Faults::default()),
            screen_size: (320, 180),
            camera_size: (160, 120),
            issued: Mutex::new(Vec::new()),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Frame sizes of the generated screen and camera video
    pub fn with_frame_sizes(mut self, screen: (u32, u32), camera: (u32, u32)) -> Self {
        self.screen_size = screen;
        self.camera_size = camera;
        self
    }

    pub fn set_capabilities(&self, capabilities: Capabilities) {
        *self.capabilities.lock() = capabilities;
    }

    pub fn set_supported_types(&self, types: Vec<String>) {
        *self.supported_types.lock() = types;
    }

    pub fn fail_screen(&self, error: PlatformError) {
        self.faults.lock().screen = Some(error);
    }

    pub fn fail_camera(&self, error: PlatformError) {
        self.faults.lock().camera = Some(error);
    }

    pub fn fail_microphone(&self, error: PlatformError) {
        self.faults.lock().microphone = Some(error);
    }

    /// Make every encoder created from now on fail `after` its start
    pub fn fail_encoder_after(&self, after: Duration) {
        self.faults.lock().encoder_after = Some(after);
    }

    pub fn clear_faults(&self) {
        *self.faults.lock() = Faults::default();
    }

    /// Streams issued so far for `kind`, oldest first
    pub fn issued(&self, kind: SourceKind) -> Vec<IssuedStream> {
        self.issued
            .lock()
            .iter()
            .filter(|s| s.kind == kind)
            .cloned()
            .collect()
    }

    /// Number of issued tracks still live
    pub fn live_track_count(&self) -> usize {
        self.issued
            .lock()
            .iter()
            .flat_map(|s| s.tracks.iter())
            .filter(|t| t.is_live())
            .count()
    }

    /// Total device releases across all issued tracks
    pub fn device_releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    /// Simulate the user ending the most recent screen share from the
    /// system UI. Returns whether a live share was ended.
    pub fn end_screen_share(&self) -> bool {
        let issued = self.issued.lock();
        let Some(screen) = issued.iter().rev().find(|s| s.kind == SourceKind::Screen) else {
            return false;
        };
        let mut ended = false;
        for track in screen.tracks.iter().filter(|t| t.kind() == TrackKind::Video) {
            if track.is_live() {
                track.end();
                ended = true;
            }
        }
        if ended {
            tracing::info!("Screen share {} ended by the system", screen.stream_id);
        }
        ended
    }

    fn track(&self, kind: TrackKind, label: &str, frames: Option<Arc<dyn FrameSource>>) -> MediaTrack {
        let device: Arc<dyn TrackDevice> = Arc::new(SyntheticDevice {
            releases: self.releases.clone(),
        });
        MediaTrack::with_parts(kind, label, Some(device), frames)
    }

    fn issue(&self, kind: SourceKind, tracks: Vec<MediaTrack>) -> MediaStream {
        let stream = MediaStream::new(kind, tracks.clone());
        self.issued.lock().push(IssuedStream {
            kind,
            stream_id: stream.id().to_string(),
            tracks,
        });
        stream
    }
}

#[async_trait]
impl MediaPlatform for SyntheticPlatform {
    fn capabilities(&self) -> Capabilities {
        *self.capabilities.lock()
    }

    async fn get_display_media(
        &self,
        constraints: &DisplayConstraints,
    ) -> Result<MediaStream, PlatformError> {
        if !self.capabilities().display_capture {
            return Err(PlatformError::NotSupported("display capture".to_string()));
        }
        if let Some(error) = self.faults.lock().screen.clone() {
            return Err(error);
        }

        let (width, height) = self.screen_size;
        let mut tracks = vec![self.track(
            TrackKind::Video,
            "Synthetic Display",
            Some(Arc::new(SyntheticFrames::new(width, height, 0))),
        )];
        if constraints.audio {
            tracks.push(self.track(TrackKind::Audio, "Synthetic System Audio", None));
        }
        Ok(self.issue(SourceKind::Screen, tracks))
    }

    async fn get_user_media(
        &self,
        constraints: &UserMediaConstraints,
    ) -> Result<MediaStream, PlatformError> {
        if !self.capabilities().user_media {
            return Err(PlatformError::NotSupported("user media".to_string()));
        }
        {
            let faults = self.faults.lock();
            let fault = if constraints.video {
                &faults.camera
            } else {
                &faults.microphone
            };
            if let Some(error) = fault.clone() {
                return Err(error);
            }
        }

        let mut tracks = Vec::new();
        if constraints.video {
            let (width, height) = self.camera_size;
            tracks.push(self.track(
                TrackKind::Video,
                "Synthetic Camera",
                Some(Arc::new(SyntheticFrames::new(width, height, 128))),
            ));
        }
        if constraints.audio {
            tracks.push(self.track(TrackKind::Audio, "Synthetic Microphone", None));
        }

        let kind = if constraints.video {
            SourceKind::Camera
        } else {
            SourceKind::Microphone
        };
        Ok(self.issue(kind, tracks))
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        self.capabilities().encoder && self.supported_types.lock().iter().any(|t| t == mime_type)
    }

    fn create_encoder(&self, mime_type: &str) -> Result<Box<dyn EncoderBackend>, PlatformError> {
        if !self.is_type_supported(mime_type) {
            return Err(PlatformError::NotSupported(mime_type.to_string()));
        }
        Ok(Box::new(SyntheticEncoder::new(self.faults.lock().encoder_after)))
    }
}

enum Control {
    Pause,
    Resume,
    Stop,
}

/// Encoder emitting one WebM-framed block per sampled frame
pub struct SyntheticEncoder {
    fail_after: Option<Duration>,
    control: Option<mpsc::UnboundedSender<Control>>,
    task: Option<JoinHandle<()>>,
}

impl SyntheticEncoder {
    pub fn new(fail_after: Option<Duration>) -> Self {
        Self {
            fail_after,
            control: None,
            task: None,
        }
    }

    fn send(&self, control: Control) {
        if let Some(tx) = &self.control {
            let _ = tx.send(control);
        }
    }
}

impl EncoderBackend for SyntheticEncoder {
    fn start(
        &mut self,
        stream: Arc<MediaStream>,
        options: &EncoderOptions,
        sink: EncoderSink,
    ) -> Result<(), String> {
        if self.task.is_some() {
            return Err("encoder already started".to_string());
        }
        if stream.video_track().is_none() && stream.audio_tracks().next().is_none() {
            return Err("stream has no tracks to encode".to_string());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.control = Some(tx);
        self.task = Some(tokio::spawn(run_encoder(
            stream,
            options.clone(),
            sink,
            rx,
            self.fail_after,
        )));
        Ok(())
    }

    fn pause(&mut self) {
        self.send(Control::Pause);
    }

    fn resume(&mut self) {
        self.send(Control::Resume);
    }

    fn stop(&mut self) {
        self.send(Control::Stop);
        self.control = None;
    }
}

async fn run_encoder(
    stream: Arc<MediaStream>,
    options: EncoderOptions,
    sink: EncoderSink,
    mut control: mpsc::UnboundedReceiver<Control>,
    fail_after: Option<Duration>,
) {
    let frame_period = Duration::from_secs_f64(1.0 / options.frame_rate.max(1) as f64);
    let mut sample = tokio::time::interval(frame_period);
    sample.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut flush = tokio::time::interval_at(Instant::now() + options.timeslice, options.timeslice);
    flush.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let fail = async move {
        match fail_after {
            Some(after) => tokio::time::sleep(after).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(fail);

    let mut pending = BytesMut::new();
    pending.put_slice(&WEBM_MAGIC);
    let mut paused = false;
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            command = control.recv() => match command {
                Some(Control::Pause) => paused = true,
                Some(Control::Resume) => paused = false,
                Some(Control::Stop) | None => break,
            },
            _ = sample.tick(), if !paused => {
                encode_block(&stream, frames, &mut pending);
                frames += 1;
            }
            _ = flush.tick(), if !paused => {
                let _ = sink.send(EncoderEvent::Data(pending.split().freeze()));
            }
            _ = &mut fail => {
                let _ = sink.send(EncoderEvent::Error("synthetic encoder fault".to_string()));
                break;
            }
        }
    }

    let _ = sink.send(EncoderEvent::Data(pending.split().freeze()));
    let _ = sink.send(EncoderEvent::Stopped);
    tracing::debug!("Synthetic encoder finished after {} frames", frames);
}

/// Block layout: frame number, timestamp, center pixel, audio track count
fn encode_block(stream: &MediaStream, frame_number: u64, out: &mut BytesMut) {
    let frame = stream.video_track().and_then(|t| t.latest_frame());
    let (timestamp, center) = match &frame {
        Some(f) => (
            f.timestamp_ms as u64,
            f.pixel(f.width / 2, f.height / 2).unwrap_or_default(),
        ),
        None => (0, [0; 4]),
    };
    let audio = stream.audio_tracks().filter(|t| t.is_live()).count() as u8;

    out.put_u64(frame_number);
    out.put_u64(timestamp);
    out.put_slice(&center);
    out.put_u8(audio);
}

impl Drop for SyntheticEncoder {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            if self.control.is_some() {
                task.abort();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> EncoderOptions {
        EncoderOptions {
            mime_type: "video/webm".to_string(),
            timeslice: Duration::from_secs(1),
            frame_rate: 30,
        }
    }

    async fn screen(platform: &SyntheticPlatform) -> Arc<MediaStream> {
        let constraints = DisplayConstraints {
            video: true,
            audio: false,
            ideal_width: 1920,
            ideal_height: 1080,
            frame_rate: 30,
        };
        Arc::new(platform.get_display_media(&constraints).await.unwrap())
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_emits_timesliced_chunks() {
        let platform = SyntheticPlatform::new();
        let stream = screen(&platform).await;
        let mut encoder = platform.create_encoder("video/webm").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        encoder.start(stream, &options(), tx).unwrap();
        tokio::time::sleep(Duration::from_millis(2500)).await;
        encoder.stop();

        let mut chunks = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                EncoderEvent::Data(data) => chunks.push(data),
                EncoderEvent::Error(e) => panic!("unexpected error: {e}"),
                EncoderEvent::Stopped => break,
            }
        }
        // Two timeslices plus the final flush
        assert_eq!(chunks.len(), 3);
        assert_eq!(&chunks[0][..4], &WEBM_MAGIC);
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_encoder_fault_is_followed_by_stop() {
        let platform = SyntheticPlatform::new();
        platform.fail_encoder_after(Duration::from_millis(1500));
        let stream = screen(&platform).await;
        let mut encoder = platform.create_encoder("video/webm").unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();

        encoder.start(stream, &options(), tx).unwrap();

        let mut saw_error = false;
        let mut saw_data_after_error = false;
        while let Some(event) = rx.recv().await {
            match event {
                EncoderEvent::Error(_) => saw_error = true,
                EncoderEvent::Data(_) if saw_error => saw_data_after_error = true,
                EncoderEvent::Data(_) => {}
                EncoderEvent::Stopped => break,
            }
        }
        assert!(saw_error && saw_data_after_error);
    }

    #[tokio::test]
    async fn test_injected_faults_and_share_end() {
        let platform = SyntheticPlatform::new();
        platform.fail_camera(PlatformError::NotAllowed("denied".into()));
        let constraints = UserMediaConstraints {
            video: true,
            audio: true,
            ideal_width: 1280,
            ideal_height: 720,
        };
        assert_eq!(
            platform.get_user_media(&constraints).await.unwrap_err(),
            PlatformError::NotAllowed("denied".into())
        );

        let stream = screen(&platform).await;
        let ended = stream.video_track().unwrap().ended();
        assert!(platform.end_screen_share());
        assert!(*ended.borrow());
        assert!(!platform.end_screen_share());
        assert_eq!(platform.live_track_count(), 0);
        assert_eq!(platform.device_releases(), 1);
    }

    #[test]
    fn test_unsupported_type_has_no_encoder() {
        let platform = SyntheticPlatform::new();
        assert!(!platform.is_type_supported("video/webm;codecs=vp9,opus"));
        assert!(platform.create_encoder("video/mp4").is_err());
    }
}
