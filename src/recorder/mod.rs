//! Recording system module
//!
//! - Encoder backend seam and the recorder engine buffering its chunks
//! - RecordingCoordinator orchestrating sources, compositor and engine
//! - Session state, segments and the finalized artifact

pub mod artifact;
pub mod coordinator;
pub mod encoder;
pub mod engine;
pub mod state;

pub use artifact::{Artifact, ArtifactSummary};
pub use coordinator::{RecordingCoordinator, RecordingEvent};
pub use encoder::{EncoderBackend, EncoderEvent, EncoderOptions};
pub use engine::RecorderEngine;
pub use state::{RecorderState, RecordingMode, RecordingSegment, SessionSnapshot};
