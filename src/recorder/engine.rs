//! Recorder engine
//!
//! Wraps an output stream in a streaming encoder, buffers the encoded chunks
//! and enforces the Idle -> Recording -> (Paused <-> Recording) -> Stopped
//! lifecycle. Invalid transitions are rejected without side effects.

use super::encoder::{EncoderBackend, EncoderEvent, EncoderOptions};
use super::state::RecorderState;
use crate::capture::traits::MediaStream;
use crate::utils::error::{AppError, AppResult};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Streaming recorder around a single encoder backend
pub struct RecorderEngine {
    state: RecorderState,
    backend: Box<dyn EncoderBackend>,
    options: EncoderOptions,
    stream: Option<Arc<MediaStream>>,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    finished_rx: Option<oneshot::Receiver<()>>,
    fault_rx: Option<mpsc::UnboundedReceiver<String>>,
    finalize_timeout: Duration,
}

impl RecorderEngine {
    pub fn new(backend: Box<dyn EncoderBackend>, options: EncoderOptions) -> Self {
        Self {
            state: RecorderState::Idle,
            backend,
            options,
            stream: None,
            chunks: Arc::new(Mutex::new(Vec::new())),
            finished_rx: None,
            fault_rx: None,
            finalize_timeout: Duration::from_secs(5),
        }
    }

    /// Upper bound on waiting for the final chunk after `stop`
    pub fn with_finalize_timeout(mut self, timeout: Duration) -> Self {
        self.finalize_timeout = timeout;
        self
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn mime_type(&self) -> &str {
        &self.options.mime_type
    }

    /// Number of non-empty chunks buffered so far
    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().len()
    }

    pub fn buffered_bytes(&self) -> usize {
        self.chunks.lock().iter().map(Bytes::len).sum()
    }

    /// Fatal encoder errors, available once after `start`
    pub fn take_faults(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.fault_rx.take()
    }

    /// Begin encoding `stream`; only valid from Idle
    pub fn start(&mut self, stream: Arc<MediaStream>) -> AppResult<()> {
        if self.state != RecorderState::Idle {
            return Err(AppError::InvalidState(format!(
                "cannot start a recorder that is {:?}",
                self.state
            )));
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        self.backend
            .start(stream.clone(), &self.options, event_tx)
            .map_err(AppError::EncoderFailure)?;

        let (finished_tx, finished_rx) = oneshot::channel();
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();
        tokio::spawn(pump_events(event_rx, self.chunks.clone(), fault_tx, finished_tx));

        self.finished_rx = Some(finished_rx);
        self.fault_rx = Some(fault_rx);
        self.stream = Some(stream);
        self.state = RecorderState::Recording;

        tracing::info!(
            "Recorder started: {} ({}ms timeslice)",
            self.options.mime_type,
            self.options.timeslice.as_millis()
        );
        Ok(())
    }

    /// Suspend encoding; only valid while Recording
    pub fn pause(&mut self) -> AppResult<()> {
        if self.state != RecorderState::Recording {
            return Err(AppError::InvalidState("recorder is not recording".to_string()));
        }
        self.backend.pause();
        self.state = RecorderState::Paused;
        tracing::debug!("Recorder paused with {} chunks buffered", self.chunk_count());
        Ok(())
    }

    /// Continue encoding; only valid while Paused
    pub fn resume(&mut self) -> AppResult<()> {
        if self.state != RecorderState::Paused {
            return Err(AppError::InvalidState("recorder is not paused".to_string()));
        }
        self.backend.resume();
        self.state = RecorderState::Recording;
        tracing::debug!("Recorder resumed");
        Ok(())
    }

    /// Request the final chunk and release the recorded stream's tracks.
    ///
    /// Valid from Recording or Paused. The returned [`Finalizing`] resolves to
    /// every buffered chunk once the encoder has flushed.
    pub fn stop(&mut self) -> AppResult<Finalizing> {
        if !self.state.is_active() {
            return Err(AppError::InvalidState(format!(
                "cannot stop a recorder that is {:?}",
                self.state
            )));
        }

        self.backend.stop();
        self.state = RecorderState::Stopped;
        if let Some(stream) = self.stream.take() {
            stream.release();
        }

        tracing::info!("Recorder stopping, waiting for final chunk");
        Ok(Finalizing {
            chunks: self.chunks.clone(),
            finished: self.finished_rx.take(),
            timeout: self.finalize_timeout,
        })
    }
}

impl Drop for RecorderEngine {
    fn drop(&mut self) {
        if self.state.is_active() {
            self.backend.stop();
            if let Some(stream) = self.stream.take() {
                stream.release();
            }
        }
    }
}

/// Pending finalization returned by [`RecorderEngine::stop`]
pub struct Finalizing {
    chunks: Arc<Mutex<Vec<Bytes>>>,
    finished: Option<oneshot::Receiver<()>>,
    timeout: Duration,
}

impl Finalizing {
    /// Wait for the encoder's final chunk and return all chunks in order
    pub async fn finish(self) -> Vec<Bytes> {
        if let Some(finished) = self.finished {
            if tokio::time::timeout(self.timeout, finished).await.is_err() {
                tracing::warn!(
                    "Encoder did not flush within {}ms, finalizing with buffered chunks",
                    self.timeout.as_millis()
                );
            }
        }
        self.chunks.lock().clone()
    }
}

async fn pump_events(
    mut events: mpsc::UnboundedReceiver<EncoderEvent>,
    chunks: Arc<Mutex<Vec<Bytes>>>,
    faults: mpsc::UnboundedSender<String>,
    finished: oneshot::Sender<()>,
) {
    while let Some(event) = events.recv().await {
        match event {
            EncoderEvent::Data(data) => {
                if !data.is_empty() {
                    chunks.lock().push(data);
                }
            }
            EncoderEvent::Error(message) => {
                tracing::error!("Encoder error: {}", message);
                let _ = faults.send(message);
            }
            EncoderEvent::Stopped => break,
        }
    }
    let _ = finished.send(());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::traits::{MediaTrack, SourceKind, TrackKind};
    use crate::recorder::encoder::EncoderSink;

    /// Backend that emits one chunk per call to `stop` and records calls
    #[derive(Default)]
    struct ScriptedBackend {
        sink: Option<EncoderSink>,
        calls: Arc<Mutex<Vec<&'static str>>>,
    }

    impl EncoderBackend for ScriptedBackend {
        fn start(
            &mut self,
            _stream: Arc<MediaStream>,
            _options: &EncoderOptions,
            sink: EncoderSink,
        ) -> Result<(), String> {
            let _ = sink.send(EncoderEvent::Data(Bytes::from_static(b"head")));
            self.sink = Some(sink);
            self.calls.lock().push("start");
            Ok(())
        }

        fn pause(&mut self) {
            self.calls.lock().push("pause");
        }

        fn resume(&mut self) {
            self.calls.lock().push("resume");
        }

        fn stop(&mut self) {
            self.calls.lock().push("stop");
            if let Some(sink) = self.sink.take() {
                let _ = sink.send(EncoderEvent::Data(Bytes::from_static(b"tail")));
                let _ = sink.send(EncoderEvent::Data(Bytes::new()));
                let _ = sink.send(EncoderEvent::Stopped);
            }
        }
    }

    fn options() -> EncoderOptions {
        EncoderOptions {
            mime_type: "video/webm".to_string(),
            timeslice: Duration::from_secs(1),
            frame_rate: 30,
        }
    }

    fn stream() -> Arc<MediaStream> {
        Arc::new(MediaStream::new(
            SourceKind::Screen,
            vec![MediaTrack::new(TrackKind::Video, "screen")],
        ))
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = ScriptedBackend {
            sink: None,
            calls: calls.clone(),
        };
        let mut engine = RecorderEngine::new(Box::new(backend), options());
        let stream = stream();

        engine.start(stream.clone()).unwrap();
        engine.pause().unwrap();
        engine.resume().unwrap();
        let chunks = engine.stop().unwrap().finish().await;

        assert_eq!(engine.state(), RecorderState::Stopped);
        assert_eq!(chunks.len(), 2);
        assert_eq!(&chunks[0][..], b"head");
        assert_eq!(&chunks[1][..], b"tail");
        assert!(stream.is_released());
        assert_eq!(*calls.lock(), vec!["start", "pause", "resume", "stop"]);
    }

    #[tokio::test]
    async fn test_invalid_transitions_are_rejected() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let backend = ScriptedBackend {
            sink: None,
            calls: calls.clone(),
        };
        let mut engine = RecorderEngine::new(Box::new(backend), options());

        assert!(engine.pause().is_err());
        assert!(engine.resume().is_err());
        assert!(engine.stop().is_err());

        engine.start(stream()).unwrap();
        assert!(engine.start(stream()).is_err());
        assert!(engine.resume().is_err());

        engine.stop().unwrap().finish().await;
        assert!(engine.stop().is_err());
        assert!(engine.pause().is_err());

        assert_eq!(*calls.lock(), vec!["start", "stop"]);
    }
}
