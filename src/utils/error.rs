//! Error types and handling
//!
//! Common error types used across the recording pipeline.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Unsupported environment: {0}")]
    UnsupportedEnvironment(String),

    #[error("Encoder failure: {0}")]
    EncoderFailure(String),

    #[error("Upload error: {0}")]
    UploadError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config file error: {0}")]
    Config(#[from] toml::de::Error),
}

impl AppError {
    /// Stable machine-readable code for the error
    pub fn code(&self) -> &'static str {
        match self {
            AppError::PermissionDenied(_) => "PERMISSION_DENIED",
            AppError::DeviceUnavailable(_) => "DEVICE_UNAVAILABLE",
            AppError::NotSupported(_) => "NOT_SUPPORTED",
            AppError::UnsupportedEnvironment(_) => "UNSUPPORTED_ENVIRONMENT",
            AppError::EncoderFailure(_) => "ENCODER_FAILURE",
            AppError::UploadError(_) => "UPLOAD_ERROR",
            AppError::ConfigurationError(_) => "CONFIGURATION_ERROR",
            AppError::InvalidState(_) => "INVALID_STATE",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Human-readable notice suitable for showing to the person recording
    pub fn user_message(&self) -> String {
        match self {
            AppError::PermissionDenied(what) => format!(
                "Access to the {what} was denied. Allow access in your system settings and try again."
            ),
            AppError::DeviceUnavailable(what) => format!(
                "The {what} is not available. Check that it is connected and not in use by another application."
            ),
            AppError::NotSupported(what) => format!("{what} is not supported on this system."),
            AppError::UnsupportedEnvironment(_) => {
                "Recording is not supported in this environment. Please use a system with screen capture and video encoding support.".to_string()
            }
            AppError::EncoderFailure(_) => {
                "Recording stopped unexpectedly. Everything captured up to this point has been kept.".to_string()
            }
            AppError::UploadError(_) => {
                "Upload failed. Your recording is still available to download or upload again.".to_string()
            }
            AppError::ConfigurationError(_) => {
                "Video hosting is not configured. Set an account ID and API token to enable uploads.".to_string()
            }
            AppError::InvalidState(reason) => reason.clone(),
            AppError::Io(e) => format!("A file operation failed: {e}"),
            AppError::Serialization(e) => format!("Stored data could not be read: {e}"),
            AppError::Config(e) => format!("The configuration file is invalid: {e}"),
        }
    }

    /// Whether the failure can be retried without re-recording
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::UploadError(_) | AppError::ConfigurationError(_) | AppError::Io(_)
        )
    }
}

/// Error response for frontend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl From<AppError> for ErrorResponse {
    fn from(error: AppError) -> Self {
        ErrorResponse {
            code: error.code().to_string(),
            message: error.user_message(),
        }
    }
}

impl std::fmt::Display for ErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ErrorResponse {}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_codes() {
        let response: ErrorResponse = AppError::PermissionDenied("camera".into()).into();
        assert_eq!(response.code, "PERMISSION_DENIED");
        assert!(response.message.contains("camera"));

        let response: ErrorResponse = AppError::ConfigurationError("missing token".into()).into();
        assert_eq!(response.code, "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_upload_errors_are_recoverable() {
        assert!(AppError::UploadError("timeout".into()).is_recoverable());
        assert!(!AppError::EncoderFailure("crash".into()).is_recoverable());
    }
}
