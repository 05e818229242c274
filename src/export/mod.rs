//! Recording export
//!
//! This module turns a finished artifact into a downloadable file or hands
//! it to a remote video host in the background.

pub mod download;
pub mod hosting;
pub mod upload;

pub use download::{download_filename, to_downloadable, Download};
pub use hosting::{
    DeliveryUrls, PlaybackUrls, RemoteVideo, StreamHostClient, UploadMetadata, VideoHost,
};
pub use upload::{spawn_upload, wait_settled, UploadHandle, UploadStatus};
