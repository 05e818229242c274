//! Streaming encoder seam
//!
//! Backends encode a [`MediaStream`] and deliver time-sliced chunks through an
//! [`EncoderSink`]. A backend always finishes with [`EncoderEvent::Stopped`],
//! after an explicit stop or after reporting a fatal error.

use crate::capture::traits::MediaStream;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Events delivered by an encoder backend
#[derive(Debug, Clone)]
pub enum EncoderEvent {
    /// An encoded chunk; may be empty, which callers ignore
    Data(Bytes),
    /// Fatal encoder error; a final `Data` and `Stopped` follow
    Error(String),
    /// No further events will be sent
    Stopped,
}

/// Channel end a backend writes its events to
pub type EncoderSink = mpsc::UnboundedSender<EncoderEvent>;

/// Parameters for a single encoding run
#[derive(Debug, Clone)]
pub struct EncoderOptions {
    pub mime_type: String,
    /// Chunk emission interval
    pub timeslice: Duration,
    /// Rate at which video frames are sampled
    pub frame_rate: u32,
}

/// Platform streaming encoder
pub trait EncoderBackend: Send {
    /// Begin encoding; chunks arrive on `sink` every `options.timeslice`
    fn start(
        &mut self,
        stream: Arc<MediaStream>,
        options: &EncoderOptions,
        sink: EncoderSink,
    ) -> Result<(), String>;

    /// Suspend encoding, keeping buffered data
    fn pause(&mut self);

    /// Continue after `pause`
    fn resume(&mut self);

    /// Request the final chunk followed by `Stopped`
    fn stop(&mut self);
}
