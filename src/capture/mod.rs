//! Capture sources
//!
//! Tracks and streams, the platform seam, source acquisition and a
//! synthetic platform for offline use.

pub mod acquirer;
pub mod platform;
pub mod synthetic;
pub mod traits;

pub use acquirer::{CaptureSources, MediaSourceAcquirer, PreviewSink};
pub use platform::{
    check_environment, select_mime_type, Capabilities, EnvironmentStatus, MediaPlatform,
    PlatformError,
};
pub use synthetic::SyntheticPlatform;
pub use traits::{MediaStream, MediaTrack, SourceKind, TrackKind, VideoFrame};
