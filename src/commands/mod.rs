//! Command handlers
//!
//! The host-facing surface: each command takes the shared [`AppState`] and
//! returns a serializable value or an [`ErrorResponse`] for display.

pub mod export;
pub mod library;
pub mod recording;
pub mod system;

use crate::capture::platform::MediaPlatform;
use crate::config::{AppConfig, HostingSettings, StorageSettings};
use crate::export::hosting::{StreamHostClient, VideoHost};
use crate::export::upload::UploadHandle;
use crate::library::recent::RecentRecordings;
use crate::library::store::JsonFileStore;
use crate::recorder::RecordingCoordinator;
use crate::utils::error::{AppResult, ErrorResponse};
use parking_lot::Mutex;
use std::sync::Arc;

/// Result type returned by every command
pub type CommandResult<T> = Result<T, ErrorResponse>;

/// Application state shared by the commands
pub struct AppState {
    pub coordinator: RecordingCoordinator,
    pub recent: RecentRecordings,
    pub storage: StorageSettings,
    hosting: HostingSettings,
    host: Mutex<Option<Arc<dyn VideoHost>>>,
    upload: Mutex<Option<UploadHandle>>,
}

impl AppState {
    /// State backed by the configured index file
    pub fn new(platform: Arc<dyn MediaPlatform>, config: AppConfig) -> Self {
        let recent = RecentRecordings::new(Arc::new(JsonFileStore::new(&config.storage.index_path)));
        Self::with_parts(
            RecordingCoordinator::new(platform, config.recording),
            recent,
            config.storage,
            config.hosting,
        )
    }

    pub fn with_parts(
        coordinator: RecordingCoordinator,
        recent: RecentRecordings,
        storage: StorageSettings,
        hosting: HostingSettings,
    ) -> Self {
        Self {
            coordinator,
            recent,
            storage,
            hosting,
            host: Mutex::new(None),
            upload: Mutex::new(None),
        }
    }

    /// Use `host` instead of a client built from the hosting settings
    pub fn with_host(self, host: Arc<dyn VideoHost>) -> Self {
        *self.host.lock() = Some(host);
        self
    }

    /// The video host, built from the hosting settings on first use
    pub fn host(&self) -> AppResult<Arc<dyn VideoHost>> {
        let mut host = self.host.lock();
        if let Some(host) = host.as_ref() {
            return Ok(host.clone());
        }
        let client: Arc<dyn VideoHost> = Arc::new(StreamHostClient::new(&self.hosting)?);
        *host = Some(client.clone());
        Ok(client)
    }
}
