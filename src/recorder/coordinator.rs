//! Recording coordinator
//!
//! Orchestrates source acquisition, compositing and the recorder engine, and
//! owns the session lifecycle: elapsed-time ticking, segment bookkeeping,
//! teardown and the finalized artifact.

use super::artifact::{Artifact, ArtifactSummary};
use super::encoder::EncoderOptions;
use super::engine::{Finalizing, RecorderEngine};
use super::state::{RecorderState, RecordingMode, RecordingSegment, SessionSnapshot};
use crate::capture::acquirer::{CaptureSources, MediaSourceAcquirer};
use crate::capture::platform::{check_environment, EnvironmentStatus, MediaPlatform};
use crate::capture::traits::{MediaStream, MediaTrack, SourceKind};
use crate::compositor::overlay::{
    ContainerRect, OverlayController, OverlayGeometry, Point, ResizeDirection,
};
use crate::compositor::renderer::{Compositor, CompositorOptions};
use crate::config::RecordingSettings;
use crate::library::recent::{ArtifactRef, RecentRecording, RecentRecordings};
use crate::utils::error::{AppError, AppResult, ErrorResponse};
use crate::utils::time::format_elapsed;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

const EVENT_CAPACITY: usize = 100;
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Events emitted during recording
#[derive(Debug, Clone)]
pub enum RecordingEvent {
    /// A new mode was selected
    ModeChanged(RecordingMode),
    /// Recording started with the negotiated format
    Started { mode: RecordingMode, mime_type: String },
    /// Recording paused
    Paused,
    /// Recording resumed
    Resumed,
    /// One more second recorded
    Tick(u64),
    /// Capture halted; finalization follows
    Stopped { elapsed_seconds: u64 },
    /// Artifact ready
    Finalized(ArtifactSummary),
    /// Session thrown away
    Discarded,
    /// Artifact recorded in the recent-recordings index
    Saved { id: String, title: String },
    /// Error occurred
    Error(ErrorResponse),
}

/// Everything a running recording owns
struct ActiveRecording {
    sources: CaptureSources,
    compositor: Option<Compositor>,
    engine: RecorderEngine,
    ticker: Option<JoinHandle<()>>,
    watchers: Vec<JoinHandle<()>>,
    segments: Vec<RecordingSegment>,
    /// Time spent recording in closed runs
    recorded: Duration,
    /// Start of the current run; `None` while paused
    run_started: Option<Instant>,
}

impl ActiveRecording {
    /// Close the current run and return the total recorded time
    fn close_run(&mut self) -> Duration {
        if let Some(started) = self.run_started.take() {
            self.recorded += started.elapsed();
        }
        self.recorded
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    fn close_segment(&mut self) {
        if let Some(segment) = self.segments.last_mut() {
            segment.end();
        }
    }

    /// Halt every loop and release every device. Synchronous.
    fn teardown(&mut self) -> Option<Finalizing> {
        self.stop_ticker();
        self.close_run();
        for watcher in self.watchers.drain(..) {
            watcher.abort();
        }
        self.close_segment();
        if let Some(compositor) = self.compositor.as_mut() {
            compositor.stop();
        }
        let finalizing = match self.engine.stop() {
            Ok(finalizing) => Some(finalizing),
            Err(e) => {
                tracing::warn!("Recorder was not running at teardown: {}", e);
                None
            }
        };
        self.sources.release();
        finalizing
    }
}

impl Drop for ActiveRecording {
    fn drop(&mut self) {
        self.stop_ticker();
        for watcher in self.watchers.drain(..) {
            watcher.abort();
        }
        self.sources.release();
    }
}

enum Phase {
    Idle,
    Starting,
    Recording(ActiveRecording),
    Paused(ActiveRecording),
    Finalizing,
    Stopped(Arc<Artifact>),
}

impl Phase {
    fn state(&self) -> RecorderState {
        match self {
            Phase::Idle | Phase::Starting => RecorderState::Idle,
            Phase::Recording(_) => RecorderState::Recording,
            Phase::Paused(_) => RecorderState::Paused,
            Phase::Finalizing | Phase::Stopped(_) => RecorderState::Stopped,
        }
    }

    /// A recording is being set up, running or finalized
    fn is_busy(&self) -> bool {
        matches!(
            self,
            Phase::Starting | Phase::Recording(_) | Phase::Paused(_) | Phase::Finalizing
        )
    }

    fn is_active(&self) -> bool {
        matches!(self, Phase::Recording(_) | Phase::Paused(_))
    }

    fn active(&self) -> Option<&ActiveRecording> {
        match self {
            Phase::Recording(active) | Phase::Paused(active) => Some(active),
            _ => None,
        }
    }
}

struct Session {
    mode: RecordingMode,
    phase: Phase,
    /// Sources acquired on mode selection, handed to the next start
    preview: Option<CaptureSources>,
}

struct Inner {
    platform: Arc<dyn MediaPlatform>,
    acquirer: MediaSourceAcquirer,
    settings: RecordingSettings,
    overlay: Arc<RwLock<OverlayController>>,
    session: Mutex<Session>,
    elapsed: AtomicU64,
    finalized: AtomicUsize,
    last_error: Mutex<Option<ErrorResponse>>,
    event_tx: broadcast::Sender<RecordingEvent>,
}

impl Inner {
    fn emit(&self, event: RecordingEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Raise the elapsed count to `seconds`, emitting a tick per new second
    fn advance_to(&self, seconds: u64) {
        let previous = self.elapsed.fetch_max(seconds, Ordering::SeqCst);
        for second in previous + 1..=seconds {
            self.emit(RecordingEvent::Tick(second));
        }
    }

    fn report(&self, error: &AppError) {
        tracing::error!("Recording error: {}", error);
        let response = ErrorResponse {
            code: error.code().to_string(),
            message: error.user_message(),
        };
        *self.last_error.lock() = Some(response.clone());
        self.emit(RecordingEvent::Error(response));
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(preview) = self.session.get_mut().preview.take() {
            preview.release();
        }
    }
}

/// Orchestrates a single recording session at a time
///
/// Cloning yields another handle to the same session.
#[derive(Clone)]
pub struct RecordingCoordinator {
    inner: Arc<Inner>,
}

impl RecordingCoordinator {
    pub fn new(platform: Arc<dyn MediaPlatform>, settings: RecordingSettings) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                acquirer: MediaSourceAcquirer::new(platform.clone(), settings.clone()),
                platform,
                settings,
                overlay: Arc::new(RwLock::new(OverlayController::default())),
                session: Mutex::new(Session {
                    mode: RecordingMode::default(),
                    phase: Phase::Idle,
                    preview: None,
                }),
                elapsed: AtomicU64::new(0),
                finalized: AtomicUsize::new(0),
                last_error: Mutex::new(None),
                event_tx,
            }),
        }
    }

    /// Subscribe to recording events
    pub fn subscribe(&self) -> broadcast::Receiver<RecordingEvent> {
        self.inner.event_tx.subscribe()
    }

    pub fn settings(&self) -> &RecordingSettings {
        &self.inner.settings
    }

    pub fn acquirer(&self) -> &MediaSourceAcquirer {
        &self.inner.acquirer
    }

    /// Capability check to run before offering any recording controls
    pub fn environment(&self) -> EnvironmentStatus {
        check_environment(self.inner.platform.as_ref(), &self.inner.settings.mime_preferences)
    }

    pub fn mode(&self) -> RecordingMode {
        self.inner.session.lock().mode
    }

    pub fn state(&self) -> RecorderState {
        self.inner.session.lock().phase.state()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.inner.elapsed.load(Ordering::SeqCst)
    }

    /// Number of artifacts finalized since creation
    pub fn finalize_count(&self) -> usize {
        self.inner.finalized.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<ErrorResponse> {
        self.inner.last_error.lock().clone()
    }

    /// The finished artifact, present only while stopped
    pub fn artifact(&self) -> Option<Arc<Artifact>> {
        match &self.inner.session.lock().phase {
            Phase::Stopped(artifact) => Some(artifact.clone()),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.inner.session.lock();
        let state = session.phase.state();
        let (chunk_count, artifact) = match &session.phase {
            Phase::Recording(active) | Phase::Paused(active) => (active.engine.chunk_count(), None),
            Phase::Stopped(artifact) => (artifact.chunk_count, Some(artifact.summary())),
            _ => (0, None),
        };
        let elapsed_seconds = self.elapsed_seconds();

        SessionSnapshot {
            mode: session.mode,
            state,
            is_recording: state.is_active(),
            is_paused: state == RecorderState::Paused,
            elapsed_seconds,
            elapsed_label: format_elapsed(elapsed_seconds),
            chunk_count,
            artifact,
        }
    }

    /// Select the recording mode and, if configured, acquire its sources for
    /// preview. Rejected while a recording is in progress.
    pub async fn select_mode(&self, mode: RecordingMode) -> AppResult<()> {
        let stale = {
            let mut session = self.inner.session.lock();
            if session.phase.is_busy() {
                tracing::warn!("Rejected mode change to {} during a recording", mode);
                return Err(AppError::InvalidState(
                    "Stop the current recording before changing the mode.".to_string(),
                ));
            }
            if session.mode == mode && session.preview.as_ref().is_some_and(CaptureSources::is_live) {
                return Ok(());
            }
            session.mode = mode;
            session.preview.take()
        };

        if let Some(stale) = stale {
            stale.release();
        }
        self.inner.acquirer.clear_previews();
        tracing::info!("Recording mode set to {}", mode);
        self.inner.emit(RecordingEvent::ModeChanged(mode));

        if !self.inner.settings.acquire_on_select {
            return Ok(());
        }

        match self.inner.acquirer.acquire(mode).await {
            Ok(sources) => {
                let mut session = self.inner.session.lock();
                if session.mode == mode && session.preview.is_none() && !session.phase.is_busy() {
                    session.preview = Some(sources);
                } else {
                    drop(session);
                    sources.release();
                    self.inner.acquirer.detach(&sources);
                }
                Ok(())
            }
            Err(e) => {
                self.inner.report(&e);
                Err(e)
            }
        }
    }

    /// Start recording in the selected mode
    pub async fn start(&self) -> AppResult<()> {
        let (mode, preview) = {
            let mut session = self.inner.session.lock();
            match session.phase {
                Phase::Idle => {}
                Phase::Stopped(_) => {
                    return Err(AppError::InvalidState(
                        "Save or discard the previous recording before starting a new one."
                            .to_string(),
                    ))
                }
                _ => {
                    return Err(AppError::InvalidState(
                        "A recording is already in progress.".to_string(),
                    ))
                }
            }
            session.phase = Phase::Starting;
            (session.mode, session.preview.take())
        };

        let mut active = match self.launch(mode, preview).await {
            Ok(active) => active,
            Err(e) => {
                self.inner.session.lock().phase = Phase::Idle;
                self.inner.acquirer.clear_previews();
                self.inner.report(&e);
                return Err(e);
            }
        };

        let faults = active.engine.take_faults();
        let screen_track = active
            .sources
            .screen()
            .and_then(|s| s.video_track().cloned());
        let mime_type = active.engine.mime_type().to_string();

        self.inner.elapsed.store(0, Ordering::SeqCst);
        active.run_started = Some(Instant::now());
        active.ticker = Some(spawn_ticker(Arc::downgrade(&self.inner), Duration::ZERO));
        active.watchers = self.spawn_watchers(screen_track, faults);
        self.inner.session.lock().phase = Phase::Recording(active);

        tracing::info!("Recording started: {} mode, {}", mode, mime_type);
        self.inner.emit(RecordingEvent::Started { mode, mime_type });
        Ok(())
    }

    async fn launch(
        &self,
        mode: RecordingMode,
        preview: Option<CaptureSources>,
    ) -> AppResult<ActiveRecording> {
        let mime_type = match self.environment() {
            EnvironmentStatus::Supported { mime_type } => mime_type,
            EnvironmentStatus::Unsupported { notice, .. } => {
                if let Some(preview) = preview {
                    preview.release();
                }
                return Err(AppError::UnsupportedEnvironment(notice));
            }
        };

        let sources = match preview {
            Some(sources) if sources.mode() == mode && sources.is_live() => {
                tracing::debug!("Reusing preview sources for {} mode", mode);
                sources
            }
            stale => {
                if let Some(stale) = stale {
                    stale.release();
                }
                self.inner.acquirer.acquire(mode).await?
            }
        };

        match self.assemble(&sources, mime_type) {
            Ok((compositor, engine)) => Ok(ActiveRecording {
                sources,
                compositor,
                engine,
                ticker: None,
                watchers: Vec::new(),
                segments: vec![RecordingSegment::new(0)],
                recorded: Duration::ZERO,
                run_started: None,
            }),
            Err(e) => {
                sources.release();
                Err(e)
            }
        }
    }

    /// Build the output stream for the sources and start encoding it
    fn assemble(
        &self,
        sources: &CaptureSources,
        mime_type: String,
    ) -> AppResult<(Option<Compositor>, RecorderEngine)> {
        let settings = &self.inner.settings;
        let mut compositor = None;

        let output = match sources {
            CaptureSources::Screen {
                screen,
                microphone: Some(microphone),
            } => {
                let mut tracks = screen.tracks().to_vec();
                tracks.extend(microphone.audio_tracks().cloned());
                Arc::new(MediaStream::new(SourceKind::Screen, tracks))
            }
            CaptureSources::Screen {
                screen,
                microphone: None,
            } => screen.clone(),
            CaptureSources::Camera { camera } => camera.clone(),
            CaptureSources::Both { screen, camera } => {
                let mut renderer = Compositor::new(
                    screen,
                    camera,
                    self.inner.overlay.clone(),
                    CompositorOptions {
                        width: settings.frame_width,
                        height: settings.frame_height,
                        frame_rate: settings.frame_rate,
                        border_width: settings.border_width,
                    },
                )?;
                renderer.start();
                let stream = Arc::new(renderer.capture_stream());
                compositor = Some(renderer);
                stream
            }
        };

        let backend = self
            .inner
            .platform
            .create_encoder(&mime_type)
            .map_err(|e| AppError::EncoderFailure(e.to_string()))?;
        let options = EncoderOptions {
            mime_type,
            timeslice: Duration::from_millis(settings.timeslice_ms),
            frame_rate: settings.frame_rate,
        };
        let mut engine = RecorderEngine::new(backend, options)
            .with_finalize_timeout(Duration::from_millis(settings.finalize_timeout_ms));
        engine.start(output)?;

        Ok((compositor, engine))
    }

    fn spawn_watchers(
        &self,
        screen: Option<MediaTrack>,
        faults: Option<mpsc::UnboundedReceiver<String>>,
    ) -> Vec<JoinHandle<()>> {
        let mut watchers = Vec::new();

        if let Some(track) = screen {
            let weak = Arc::downgrade(&self.inner);
            let mut ended = track.ended();
            watchers.push(tokio::spawn(async move {
                while !*ended.borrow_and_update() {
                    if ended.changed().await.is_err() {
                        return;
                    }
                }
                tracing::info!("Screen sharing ended by the platform, stopping recording");
                if let Some(inner) = weak.upgrade() {
                    RecordingCoordinator { inner }.stop_detached();
                }
            }));
        }

        if let Some(mut faults) = faults {
            let weak = Arc::downgrade(&self.inner);
            watchers.push(tokio::spawn(async move {
                let Some(message) = faults.recv().await else {
                    return;
                };
                if let Some(inner) = weak.upgrade() {
                    inner.report(&AppError::EncoderFailure(message));
                    RecordingCoordinator { inner }.stop_detached();
                }
            }));
        }

        watchers
    }

    /// Run `stop` on its own task so an aborted watcher cannot cancel it
    fn stop_detached(self) {
        tokio::spawn(async move {
            if let Err(e) = self.stop().await {
                tracing::error!("Implicit stop failed: {}", e);
            }
        });
    }

    /// Pause; only valid while recording
    pub fn pause(&self) -> AppResult<()> {
        {
            let mut session = self.inner.session.lock();
            let Phase::Recording(active) = &mut session.phase else {
                return Err(AppError::InvalidState("Recording is not running.".to_string()));
            };
            active.engine.pause()?;
            active.stop_ticker();
            let recorded = active.close_run();
            self.inner.advance_to(recorded.as_secs());
            active.close_segment();

            if let Phase::Recording(active) = std::mem::replace(&mut session.phase, Phase::Idle) {
                session.phase = Phase::Paused(active);
            }
        }

        tracing::info!("Recording paused at {}", format_elapsed(self.elapsed_seconds()));
        self.inner.emit(RecordingEvent::Paused);
        Ok(())
    }

    /// Resume; only valid while paused
    pub fn resume(&self) -> AppResult<()> {
        {
            let mut session = self.inner.session.lock();
            let Phase::Paused(active) = &mut session.phase else {
                return Err(AppError::InvalidState("Recording is not paused.".to_string()));
            };
            active.engine.resume()?;
            let index = active.segments.len();
            active.segments.push(RecordingSegment::new(index));
            active.run_started = Some(Instant::now());
            active.ticker = Some(spawn_ticker(Arc::downgrade(&self.inner), active.recorded));

            if let Phase::Paused(active) = std::mem::replace(&mut session.phase, Phase::Idle) {
                session.phase = Phase::Recording(active);
            }
        }

        tracing::info!("Recording resumed");
        self.inner.emit(RecordingEvent::Resumed);
        Ok(())
    }

    /// Stop recording and finalize the artifact.
    ///
    /// Loops, devices and previews are released before the first await.
    /// Returns `Ok(None)` when there is no active recording, so repeated
    /// calls are harmless.
    pub async fn stop(&self) -> AppResult<Option<Arc<Artifact>>> {
        let (active, mode, finalizing) = {
            let mut session = self.inner.session.lock();
            let mut active = match std::mem::replace(&mut session.phase, Phase::Finalizing) {
                Phase::Recording(active) | Phase::Paused(active) => active,
                other => {
                    session.phase = other;
                    tracing::debug!("Stop requested with no active recording");
                    return Ok(None);
                }
            };
            let finalizing = active.teardown();
            self.inner.advance_to(active.recorded.as_secs());
            self.inner.acquirer.clear_previews();
            (active, session.mode, finalizing)
        };
        self.inner.overlay.write().on_drag_end();

        let elapsed_seconds = self.elapsed_seconds();
        tracing::info!("Recording stopped after {}", format_elapsed(elapsed_seconds));
        self.inner.emit(RecordingEvent::Stopped { elapsed_seconds });

        let chunks = match finalizing {
            Some(finalizing) => finalizing.finish().await,
            None => Vec::new(),
        };
        let artifact = Arc::new(Artifact::from_chunks(
            mode,
            active.engine.mime_type().to_string(),
            &chunks,
            elapsed_seconds,
            active.segments.len(),
        ));
        drop(active);

        self.inner.session.lock().phase = Phase::Stopped(artifact.clone());
        self.inner.finalized.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            "Recording finalized: {} bytes in {} chunks, {} segments",
            artifact.size_bytes(),
            artifact.chunk_count,
            artifact.segment_count
        );
        self.inner.emit(RecordingEvent::Finalized(artifact.summary()));
        Ok(Some(artifact))
    }

    /// Throw the session away: release everything, keep no artifact
    pub fn discard(&self) -> AppResult<()> {
        let (active, preview) = {
            let mut session = self.inner.session.lock();
            let active = match std::mem::replace(&mut session.phase, Phase::Idle) {
                Phase::Recording(active) | Phase::Paused(active) => Some(active),
                Phase::Stopped(artifact) => {
                    tracing::debug!("Dropping artifact {}", artifact.id);
                    None
                }
                Phase::Idle => None,
                busy @ (Phase::Starting | Phase::Finalizing) => {
                    session.phase = busy;
                    return Err(AppError::InvalidState(
                        "The recording is still being set up or finalized.".to_string(),
                    ));
                }
            };
            (active, session.preview.take())
        };

        if let Some(mut active) = active {
            drop(active.teardown());
        }
        if let Some(preview) = preview {
            preview.release();
        }
        self.inner.acquirer.clear_previews();
        self.inner.overlay.write().on_drag_end();
        self.inner.elapsed.store(0, Ordering::SeqCst);

        tracing::info!("Recording discarded");
        self.inner.emit(RecordingEvent::Discarded);
        Ok(())
    }

    /// Record the finished artifact in the recent-recordings index and reset
    pub fn save(
        &self,
        title: &str,
        artifact_ref: ArtifactRef,
        index: &RecentRecordings,
    ) -> AppResult<RecentRecording> {
        let artifact = self
            .artifact()
            .ok_or_else(|| AppError::InvalidState("There is no finished recording to save.".to_string()))?;

        let entry = RecentRecording::new(&artifact, title, artifact_ref);
        index.record(entry.clone())?;

        let preview = {
            let mut session = self.inner.session.lock();
            if matches!(&session.phase, Phase::Stopped(a) if a.id == artifact.id) {
                session.phase = Phase::Idle;
            }
            session.preview.take()
        };
        if let Some(preview) = preview {
            preview.release();
        }
        self.inner.acquirer.clear_previews();
        self.inner.elapsed.store(0, Ordering::SeqCst);

        tracing::info!("Saved recording {} as '{}'", entry.id, entry.title);
        self.inner.emit(RecordingEvent::Saved {
            id: entry.id.clone(),
            title: entry.title.clone(),
        });
        Ok(entry)
    }

    pub fn overlay_geometry(&self) -> OverlayGeometry {
        self.inner.overlay.read().geometry()
    }

    pub fn overlay_container(&self) -> ContainerRect {
        self.inner.overlay.read().container()
    }

    fn overlay_movable(&self) -> bool {
        let session = self.inner.session.lock();
        session.mode == RecordingMode::Both && session.phase.is_active()
    }

    /// Begin an overlay drag; honoured only for an active Both-mode recording
    pub fn drag_start(&self, pointer: Point) -> bool {
        let enabled = self.overlay_movable();
        self.inner.overlay.write().on_drag_start(pointer, enabled)
    }

    /// Follow the pointer; a drag outlived by its recording is ended instead
    pub fn drag_move(&self, pointer: Point) {
        let movable = self.overlay_movable();
        let mut overlay = self.inner.overlay.write();
        if movable {
            overlay.on_drag_move(pointer);
        } else {
            overlay.on_drag_end();
        }
    }

    pub fn drag_end(&self) {
        self.inner.overlay.write().on_drag_end();
    }

    pub fn resize_overlay(&self, direction: ResizeDirection) -> OverlayGeometry {
        let mut overlay = self.inner.overlay.write();
        overlay.resize(direction);
        overlay.geometry()
    }

    /// Report a new preview container size
    pub fn set_container(&self, container: ContainerRect) {
        self.inner.overlay.write().set_container(container);
    }

    /// Current composite frame as PNG; Both mode only
    pub fn composite_snapshot_png(&self) -> AppResult<Vec<u8>> {
        let session = self.inner.session.lock();
        match session.phase.active().and_then(|a| a.compositor.as_ref()) {
            Some(compositor) => compositor.snapshot_png(),
            None => Err(AppError::InvalidState(
                "No composite recording is running.".to_string(),
            )),
        }
    }
}

/// One-second ticker for a run that begins with `recorded` already on the
/// clock. The first tick completes the partial second carried over from
/// earlier runs.
fn spawn_ticker(inner: Weak<Inner>, recorded: Duration) -> JoinHandle<()> {
    let carried = Duration::from_nanos(u64::from(recorded.subsec_nanos()));
    let mut second = recorded.as_secs();
    tokio::spawn(async move {
        let first = Instant::now() + (TICK_PERIOD - carried);
        let mut interval = tokio::time::interval_at(first, TICK_PERIOD);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let Some(inner) = inner.upgrade() else {
                break;
            };
            second += 1;
            inner.advance_to(second);
        }
    })
}
