//! Media platform seam
//!
//! The platform owns the real capture devices, the permission prompts and
//! the streaming encoder. Everything above this trait is platform-agnostic.

use super::traits::MediaStream;
use crate::recorder::encoder::EncoderBackend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures reported by the platform while acquiring devices
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("not allowed: {0}")]
    NotAllowed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not readable: {0}")]
    NotReadable(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("{0}")]
    Other(String),
}

/// Display capture request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayConstraints {
    pub video: bool,
    pub audio: bool,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub frame_rate: u32,
}

/// Camera / microphone request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMediaConstraints {
    pub video: bool,
    pub audio: bool,
    pub ideal_width: u32,
    pub ideal_height: u32,
}

/// What the platform can do at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub display_capture: bool,
    pub user_media: bool,
    pub encoder: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            display_capture: true,
            user_media: true,
            encoder: true,
        }
    }

    /// Names of the missing capabilities
    pub fn missing(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if !self.display_capture {
            missing.push("screen capture".to_string());
        }
        if !self.user_media {
            missing.push("camera and microphone access".to_string());
        }
        if !self.encoder {
            missing.push("video encoding".to_string());
        }
        missing
    }
}

/// Platform providing capture devices and encoders
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Capability query, answered without prompting the user
    fn capabilities(&self) -> Capabilities;

    /// Request a display capture stream (may show a picker)
    async fn get_display_media(
        &self,
        constraints: &DisplayConstraints,
    ) -> Result<MediaStream, PlatformError>;

    /// Request camera and/or microphone (may show a permission prompt)
    async fn get_user_media(
        &self,
        constraints: &UserMediaConstraints,
    ) -> Result<MediaStream, PlatformError>;

    /// Whether the encoder can produce the given container/codec combination
    fn is_type_supported(&self, mime_type: &str) -> bool;

    /// Create a streaming encoder for a supported type
    fn create_encoder(&self, mime_type: &str) -> Result<Box<dyn EncoderBackend>, PlatformError>;
}

/// Outcome of the proactive environment check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status")]
pub enum EnvironmentStatus {
    Supported { mime_type: String },
    Unsupported { missing: Vec<String>, notice: String },
}

impl EnvironmentStatus {
    pub fn is_supported(&self) -> bool {
        matches!(self, EnvironmentStatus::Supported { .. })
    }
}

/// Pick the first preferred type the platform can encode
pub fn select_mime_type(platform: &dyn MediaPlatform, preferences: &[String]) -> Option<String> {
    preferences
        .iter()
        .find(|mime| platform.is_type_supported(mime))
        .cloned()
}

/// Check capabilities and encoding support before any recording UI is offered
pub fn check_environment(platform: &dyn MediaPlatform, preferences: &[String]) -> EnvironmentStatus {
    let capabilities = platform.capabilities();
    let mut missing = capabilities.missing();

    let mime_type = if capabilities.encoder {
        select_mime_type(platform, preferences)
    } else {
        None
    };
    if capabilities.encoder && mime_type.is_none() {
        missing.push("a supported video format".to_string());
    }

    match mime_type {
        Some(mime_type) if missing.is_empty() => EnvironmentStatus::Supported { mime_type },
        _ => {
            tracing::warn!("Recording environment unsupported, missing: {:?}", missing);
            let notice = format!(
                "Screen recording is not supported here (missing {}). Please switch to an up-to-date desktop browser or system.",
                missing.join(", ")
            );
            EnvironmentStatus::Unsupported { missing, notice }
        }
    }
}
