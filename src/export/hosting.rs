//! Remote video hosting
//!
//! [`VideoHost`] is the collaborator finished recordings are uploaded to.
//! [`StreamHostClient`] talks to a Cloudflare-Stream-style REST API; it is
//! constructed explicitly from [`HostingSettings`] and refuses to exist
//! without credentials.

use crate::config::HostingSettings;
use crate::utils::error::{AppError, AppResult};
use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_DELIVERY_DOMAIN: &str = "videodelivery.net";

/// Name and optional description attached to an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadMetadata {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl UploadMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
        }
    }
}

/// Streaming manifests for a hosted video
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackUrls {
    pub hls: Option<String>,
    pub dash: Option<String>,
}

/// A video stored on the host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVideo {
    pub id: String,
    /// Processing state reported by the host (`queued`, `inprogress`, `ready`, ...)
    pub status: String,
    pub playback: PlaybackUrls,
    pub thumbnail: Option<String>,
    /// Watch page
    pub preview: Option<String>,
    pub duration_seconds: Option<f64>,
    pub name: Option<String>,
}

/// Remote video storage
#[async_trait]
pub trait VideoHost: Send + Sync {
    async fn upload(
        &self,
        bytes: Bytes,
        mime_type: &str,
        metadata: &UploadMetadata,
    ) -> AppResult<RemoteVideo>;

    async fn get(&self, id: &str) -> AppResult<RemoteVideo>;

    async fn delete(&self, id: &str) -> AppResult<()>;

    /// Most recent uploads, newest first
    async fn list_recent(&self, limit: usize) -> AppResult<Vec<RemoteVideo>>;

    /// Embeddable player URL for a video
    fn embed_url(&self, id: &str) -> String;
}

/// Envelope around every API response
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    result: Option<T>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiStatus {
    #[serde(default)]
    state: String,
}

#[derive(Debug, Default, Deserialize)]
struct ApiMeta {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiVideo {
    uid: String,
    #[serde(default)]
    status: ApiStatus,
    #[serde(default)]
    playback: PlaybackUrls,
    thumbnail: Option<String>,
    preview: Option<String>,
    duration: Option<f64>,
    #[serde(default)]
    meta: ApiMeta,
}

impl From<ApiVideo> for RemoteVideo {
    fn from(video: ApiVideo) -> Self {
        RemoteVideo {
            id: video.uid,
            status: video.status.state,
            playback: video.playback,
            thumbnail: video.thumbnail,
            preview: video.preview,
            // Negative while the host is still processing
            duration_seconds: video.duration.filter(|d| *d >= 0.0),
            name: video.meta.name,
        }
    }
}

/// Unwrap an API envelope into its result
fn parse_envelope<T: DeserializeOwned>(body: &str) -> AppResult<T> {
    let envelope: ApiEnvelope<T> = serde_json::from_str(body)
        .map_err(|e| AppError::UploadError(format!("unexpected response from video host: {e}")))?;

    if !envelope.success {
        let reasons: Vec<String> = envelope
            .errors
            .iter()
            .map(|e| format!("{} ({})", e.message, e.code))
            .collect();
        return Err(AppError::UploadError(if reasons.is_empty() {
            "video host rejected the request".to_string()
        } else {
            reasons.join("; ")
        }));
    }

    envelope
        .result
        .ok_or_else(|| AppError::UploadError("video host returned no result".to_string()))
}

/// URL builders over the configured delivery domain
#[derive(Debug, Clone)]
pub struct DeliveryUrls {
    domain: String,
}

impl DeliveryUrls {
    pub fn new(domain: Option<&str>) -> Self {
        let domain = domain
            .map(|d| d.trim().trim_start_matches("https://").trim_end_matches('/'))
            .filter(|d| !d.is_empty())
            .unwrap_or(DEFAULT_DELIVERY_DOMAIN);
        Self {
            domain: domain.to_string(),
        }
    }

    pub fn embed_url(&self, id: &str) -> String {
        format!("https://{}/{}/iframe", self.domain, urlencoding::encode(id))
    }

    pub fn download_url(&self, id: &str) -> String {
        format!(
            "https://{}/{}/downloads/default.mp4",
            self.domain,
            urlencoding::encode(id)
        )
    }

    pub fn thumbnail_url(&self, id: &str) -> String {
        format!(
            "https://{}/{}/thumbnails/thumbnail.jpg",
            self.domain,
            urlencoding::encode(id)
        )
    }
}

/// HTTP client for the hosting API
pub struct StreamHostClient {
    http: reqwest::Client,
    api_base: String,
    account_id: String,
    api_token: String,
    urls: DeliveryUrls,
}

impl StreamHostClient {
    /// Fails with `ConfigurationError` unless account id and token are set
    pub fn new(settings: &HostingSettings) -> AppResult<Self> {
        let (Some(account_id), Some(api_token)) = (
            settings.account_id.as_deref().map(str::trim).filter(|s| !s.is_empty()),
            settings.api_token.as_deref().map(str::trim).filter(|s| !s.is_empty()),
        ) else {
            return Err(AppError::ConfigurationError(
                "video hosting needs both an account ID and an API token".to_string(),
            ));
        };

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AppError::ConfigurationError(format!("HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            api_token: api_token.to_string(),
            urls: DeliveryUrls::new(settings.delivery_domain.as_deref()),
        })
    }

    pub fn urls(&self) -> &DeliveryUrls {
        &self.urls
    }

    fn stream_url(&self, suffix: &str) -> String {
        format!(
            "{}/accounts/{}/stream{}",
            self.api_base,
            urlencoding::encode(&self.account_id),
            suffix
        )
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> AppResult<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| AppError::UploadError(format!("video host unreachable: {e}")))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::UploadError(format!("reading video host response: {e}")))?;

        tracing::debug!("Video host answered {}", status);
        parse_envelope(&body).map_err(|e| match e {
            AppError::UploadError(reason) if !status.is_success() => {
                AppError::UploadError(format!("HTTP {status}: {reason}"))
            }
            other => other,
        })
    }
}

#[async_trait]
impl VideoHost for StreamHostClient {
    async fn upload(
        &self,
        bytes: Bytes,
        mime_type: &str,
        metadata: &UploadMetadata,
    ) -> AppResult<RemoteVideo> {
        let size = bytes.len();
        let essence = mime_type.split(';').next().unwrap_or("video/webm").trim();
        let part = reqwest::multipart::Part::bytes(bytes.to_vec())
            .file_name(format!("{}.webm", metadata.name))
            .mime_str(essence)
            .map_err(|e| AppError::UploadError(format!("invalid content type: {e}")))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::info!("Uploading {} bytes as '{}'", size, metadata.name);
        let uploaded: ApiVideo = self.send(self.http.post(self.stream_url("")).multipart(form)).await?;

        let body = serde_json::json!({ "meta": metadata });
        let updated: ApiVideo = self
            .send(self.http.post(self.stream_url(&format!("/{}", uploaded.uid))).json(&body))
            .await?;

        let video = RemoteVideo::from(updated);
        tracing::info!("Upload complete: video {}", video.id);
        Ok(video)
    }

    async fn get(&self, id: &str) -> AppResult<RemoteVideo> {
        let url = self.stream_url(&format!("/{}", urlencoding::encode(id)));
        let video: ApiVideo = self.send(self.http.get(url)).await?;
        Ok(video.into())
    }

    async fn delete(&self, id: &str) -> AppResult<()> {
        let url = self.stream_url(&format!("/{}", urlencoding::encode(id)));
        let response = self
            .http
            .delete(url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| AppError::UploadError(format!("video host unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(AppError::UploadError(format!(
                "deleting video {id} failed with HTTP {}",
                response.status()
            )));
        }
        tracing::info!("Deleted remote video {}", id);
        Ok(())
    }

    async fn list_recent(&self, limit: usize) -> AppResult<Vec<RemoteVideo>> {
        let videos: Vec<ApiVideo> = self.send(self.http.get(self.stream_url("?asc=false"))).await?;
        Ok(videos.into_iter().take(limit).map(RemoteVideo::from).collect())
    }

    fn embed_url(&self, id: &str) -> String {
        self.urls.embed_url(id)
    }
}
