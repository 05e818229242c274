//! Open Recorder - screen and camera recordings, composited live.
//!
//! This is the main library crate. It captures screen and camera sources,
//! composites the camera as a circular overlay, records the result through a
//! streaming encoder and exports the finished recording.

pub mod capture;
pub mod commands;
pub mod compositor;
pub mod config;
pub mod export;
pub mod library;
pub mod recorder;
pub mod utils;

pub use config::AppConfig;
pub use recorder::{RecordingCoordinator, RecordingEvent, RecordingMode};
pub use utils::error::{AppError, AppResult, ErrorResponse};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "open_recorder=debug";

/// Initialize tracing/logging. Safe to call more than once.
pub fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
