use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::types::{CameraSnapshot, ImageUrls};
use crate::webhook_url::probe_url;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(100);

#[derive(Debug, thiserror::Error)]
pub enum CameraError {
    #[error("camera request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("camera server {url} answered {status}")]
    Status { url: String, status: StatusCode },
    #[error("camera response from {url} is not valid JSON")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("camera server reported failure: {0}")]
    Reported(String),
    #[error("camera response is missing the {0} url")]
    MissingUrl(&'static str),
}

impl CameraSnapshot {
    pub fn into_image_urls(self) -> Result<ImageUrls, CameraError> {
        if self.status.as_deref() == Some("NG") {
            return Err(CameraError::Reported(
                self.message.unwrap_or_else(|| "unknown error".into()),
            ));
        }
        let original = self.original.ok_or(CameraError::MissingUrl("original"))?;
        let preview = self.preview.ok_or(CameraError::MissingUrl("preview"))?;
        Ok(ImageUrls { original, preview })
    }
}

/// The external camera server registered through `set_webhook`.
#[async_trait]
pub trait CameraServer: Send + Sync {
    /// `GET <webhook url>/test`; any transport error or non-2xx is a failure.
    async fn probe(&self, webhook_url: &str) -> Result<(), CameraError>;

    /// `GET <webhook url>`, expecting `{original, preview}`.
    async fn fetch_image_urls(&self, webhook_url: &str) -> Result<ImageUrls, CameraError>;
}

#[derive(Clone)]
pub struct HttpCameraServer {
    client: Client,
    fetch_timeout: Duration,
}

impl HttpCameraServer {
    pub fn new(client: Client, fetch_timeout: Option<Duration>) -> Self {
        Self {
            client,
            fetch_timeout: fetch_timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

#[async_trait]
impl CameraServer for HttpCameraServer {
    async fn probe(&self, webhook_url: &str) -> Result<(), CameraError> {
        let url = probe_url(webhook_url);
        let res = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| CameraError::Request {
                url: url.clone(),
                source,
            })?;
        let status = res.status();
        if !status.is_success() {
            return Err(CameraError::Status { url, status });
        }
        Ok(())
    }

    async fn fetch_image_urls(&self, webhook_url: &str) -> Result<ImageUrls, CameraError> {
        let url = webhook_url.to_string();
        let res = self
            .client
            .get(&url)
            .timeout(self.fetch_timeout)
            .send()
            .await
            .map_err(|source| CameraError::Request {
                url: url.clone(),
                source,
            })?;
        let status = res.status();
        if !status.is_success() {
            return Err(CameraError::Status { url, status });
        }
        let snapshot: CameraSnapshot = res
            .json()
            .await
            .map_err(|source| CameraError::Decode { url, source })?;
        snapshot.into_image_urls()
    }
}
