//! Recording state management
//!
//! Defines the recorder state machine, capture modes and segment tracking.

use super::artifact::ArtifactSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which sources a session records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMode {
    /// Display only
    #[default]
    Screen,
    /// Camera and microphone only
    Camera,
    /// Display with a circular camera overlay
    Both,
}

impl RecordingMode {
    pub fn uses_screen(&self) -> bool {
        matches!(self, RecordingMode::Screen | RecordingMode::Both)
    }

    pub fn uses_camera(&self) -> bool {
        matches!(self, RecordingMode::Camera | RecordingMode::Both)
    }
}

impl fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingMode::Screen => write!(f, "screen"),
            RecordingMode::Camera => write!(f, "camera"),
            RecordingMode::Both => write!(f, "both"),
        }
    }
}

impl FromStr for RecordingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "screen" => Ok(RecordingMode::Screen),
            "camera" => Ok(RecordingMode::Camera),
            "both" => Ok(RecordingMode::Both),
            other => Err(format!("unknown recording mode '{other}' (expected screen, camera or both)")),
        }
    }
}

/// Current state of the recorder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecorderState {
    /// No recording in progress
    #[default]
    Idle,
    /// Currently recording
    Recording,
    /// Recording is paused
    Paused,
    /// Recording finalized, artifact available
    Stopped,
}

impl RecorderState {
    /// Recording or paused
    pub fn is_active(&self) -> bool {
        matches!(self, RecorderState::Recording | RecorderState::Paused)
    }
}

/// One uninterrupted stretch of recording
///
/// A new segment is opened on start and on every resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSegment {
    /// Segment index (0, 1, 2, ...)
    pub index: usize,

    /// When this segment started
    pub started_at: DateTime<Utc>,

    /// When this segment ended, if it has
    pub ended_at: Option<DateTime<Utc>>,

    /// Duration in milliseconds (0 while open)
    pub duration_ms: i64,
}

impl RecordingSegment {
    /// Open a new segment starting now
    pub fn new(index: usize) -> Self {
        Self {
            index,
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
        }
    }

    /// Close the segment; closing twice keeps the first end time
    pub fn end(&mut self) {
        if self.ended_at.is_some() {
            return;
        }
        let now = Utc::now();
        self.duration_ms = (now - self.started_at).num_milliseconds().max(0);
        self.ended_at = Some(now);
    }

    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }
}

/// Point-in-time view of the session for UI polling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub mode: RecordingMode,
    pub state: RecorderState,
    pub is_recording: bool,
    pub is_paused: bool,
    pub elapsed_seconds: u64,
    /// `M:SS` / `H:MM:SS`
    pub elapsed_label: String,
    pub chunk_count: usize,
    pub artifact: Option<ArtifactSummary>,
}
