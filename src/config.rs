//! Configuration management
//!
//! Loads recording, hosting and storage settings from a TOML file, with
//! environment overrides for the hosting credentials.

use crate::utils::error::AppResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `hosting.account_id`
pub const ENV_ACCOUNT_ID: &str = "OPEN_RECORDER_ACCOUNT_ID";
/// Environment variable overriding `hosting.api_token`
pub const ENV_API_TOKEN: &str = "OPEN_RECORDER_API_TOKEN";
/// Environment variable overriding `hosting.delivery_domain`
pub const ENV_DELIVERY_DOMAIN: &str = "OPEN_RECORDER_DELIVERY_DOMAIN";

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub recording: RecordingSettings,
    pub hosting: HostingSettings,
    pub storage: StorageSettings,
}

/// Capture, compositing and encoding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingSettings {
    /// Composite frame width in pixels
    pub frame_width: u32,
    /// Composite frame height in pixels
    pub frame_height: u32,
    /// Composite and capture frame rate
    pub frame_rate: u32,
    /// Interval between encoded chunk deliveries
    pub timeslice_ms: u64,
    /// Encoding formats in order of preference
    pub mime_preferences: Vec<String>,
    /// Width of the white ring around the camera overlay
    pub border_width: u32,
    /// Acquire sources (for preview) as soon as a mode is selected
    pub acquire_on_select: bool,
    /// Add a separately acquired microphone track in screen mode
    pub screen_microphone: bool,
    /// Upper bound on waiting for the encoder's final chunk
    pub finalize_timeout_ms: u64,
}

impl Default for RecordingSettings {
    fn default() -> Self {
        Self {
            frame_width: 1920,
            frame_height: 1080,
            frame_rate: 30,
            timeslice_ms: 1000,
            mime_preferences: vec![
                "video/webm;codecs=vp9,opus".to_string(),
                "video/webm;codecs=vp8,opus".to_string(),
                "video/webm".to_string(),
            ],
            border_width: 4,
            acquire_on_select: true,
            screen_microphone: true,
            finalize_timeout_ms: 5000,
        }
    }
}

/// Remote video hosting credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HostingSettings {
    pub account_id: Option<String>,
    pub api_token: Option<String>,
    /// Domain serving playback, e.g. `customer-abc123.cloudflarestream.com`
    pub delivery_domain: Option<String>,
    pub api_base: String,
}

impl Default for HostingSettings {
    fn default() -> Self {
        Self {
            account_id: None,
            api_token: None,
            delivery_domain: None,
            api_base: "https://api.cloudflare.com/client/v4".to_string(),
        }
    }
}

impl HostingSettings {
    /// Whether both required credentials are present and non-empty
    pub fn is_configured(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.account_id) && present(&self.api_token)
    }
}

/// Local storage locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub download_dir: PathBuf,
    pub index_path: PathBuf,
    /// Prefix used in downloaded file names
    pub context: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            download_dir: PathBuf::from("./recordings"),
            index_path: PathBuf::from("./recordings/recent.json"),
            context: "screen".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file, falling back to defaults when it does not exist
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        tracing::debug!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Load from file and apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut config = Self::load_from_file(path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply hosting overrides from a variable lookup
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_ACCOUNT_ID) {
            self.hosting.account_id = Some(value);
        }
        if let Some(value) = lookup(ENV_API_TOKEN) {
            self.hosting.api_token = Some(value);
        }
        if let Some(value) = lookup(ENV_DELIVERY_DOMAIN) {
            self.hosting.delivery_domain = Some(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load_from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.recording.frame_rate, 30);
        assert_eq!(config.recording.timeslice_ms, 1000);
        assert!(!config.hosting.is_configured());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("recorder.toml");
        fs::write(
            &path,
            "[recording]\nframe_width = 640\nframe_height = 360\n\n[hosting]\naccount_id = \"acc\"\napi_token = \"tok\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(config.recording.frame_width, 640);
        assert_eq!(config.recording.frame_rate, 30);
        assert_eq!(config.recording.mime_preferences.len(), 3);
        assert!(config.hosting.is_configured());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| match key {
            ENV_ACCOUNT_ID => Some("from-env".to_string()),
            ENV_API_TOKEN => Some("secret".to_string()),
            _ => None,
        });
        assert_eq!(config.hosting.account_id.as_deref(), Some("from-env"));
        assert!(config.hosting.is_configured());
        assert!(config.hosting.delivery_domain.is_none());
    }

    #[test]
    fn test_blank_credentials_are_not_configured() {
        let hosting = HostingSettings {
            account_id: Some("acc".into()),
            api_token: Some("   ".into()),
            ..Default::default()
        };
        assert!(!hosting.is_configured());
    }
}
