//! System-related commands
//!
//! Host information and the recording capability check.

use super::{AppState, CommandResult};
use crate::capture::platform::EnvironmentStatus;
use serde::{Deserialize, Serialize};

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub version: String,
}

/// Get basic system information
pub async fn get_system_info() -> CommandResult<SystemInfo> {
    Ok(SystemInfo {
        os: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Whether recording is possible here, and with which format. An
/// unsupported result carries the notice to show instead of the controls.
pub async fn get_environment(state: &AppState) -> CommandResult<EnvironmentStatus> {
    Ok(state.coordinator.environment())
}
