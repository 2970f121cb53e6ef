//! Backend transports for document content and preview metadata.
//!
//! The [`Transport`] trait is the seam between citation handling and the
//! network. [`HttpTransport`] talks to the answer backend with `reqwest`;
//! tests substitute in-memory implementations.
//!
//! # Endpoints
//!
//! | Method | Path | Body | Returns |
//! |--------|------|------|---------|
//! | `GET`  | `<content path or absolute URL>` | none | document bytes |
//! | `POST` | `/sharepoint/content` | `{ "url": … }` | document bytes |
//! | `POST` | `/sharepoint/preview` | `{ "url": … }` | [`PreviewMetadataResponse`] |
//!
//! Every request carries `Authorization: Bearer <token>` when a token is
//! available.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::config::Config;

/// Raw answer from a content request. Non-2xx statuses are returned, not
/// raised, so callers can classify them.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    /// Canonical reason phrase for `status`, e.g. `"Not Found"`.
    pub reason: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl TransportResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Fetched document bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Nested preview details returned by the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewInfo {
    #[serde(default)]
    pub embed_url: Option<String>,
}

/// Response of the preview metadata endpoint.
///
/// Two response shapes are in use: the embed address either sits under
/// `preview_info.embed_url` or at the top level as `embed_url`. Both are
/// accepted; the nested field takes precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewMetadataResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub preview_info: Option<PreviewInfo>,
    #[serde(default)]
    pub embed_url: Option<String>,
}

impl PreviewMetadataResponse {
    /// The usable embed address, if the service reported success and
    /// supplied a non-empty one.
    pub fn embed_url(&self) -> Option<&str> {
        if !self.success {
            return None;
        }
        let nested = self
            .preview_info
            .as_ref()
            .and_then(|info| info.embed_url.as_deref());
        nested
            .into_iter()
            .chain(self.embed_url.as_deref())
            .map(str::trim)
            .find(|url| !url.is_empty())
    }
}

/// Network access used by the fetcher and the preview driver.
///
/// `Err` means the request could not be completed at all (connection
/// refused, timeout, undecodable body). HTTP error statuses from the content
/// endpoints come back as `Ok` with a non-2xx [`TransportResponse`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// `GET` a content path (relative to the backend) or an absolute URL.
    async fn get_content(&self, url: &str, token: Option<&str>) -> Result<TransportResponse>;

    /// Download a SharePoint document through the backend.
    async fn get_sharepoint_content(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<TransportResponse>;

    /// Ask the backend for an embeddable preview of a SharePoint document.
    async fn preview_metadata(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<PreviewMetadataResponse>;
}

/// [`Transport`] over HTTP using `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    sharepoint_content_path: String,
    sharepoint_preview_path: String,
}

impl HttpTransport {
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.backend.base_url)
            .with_context(|| format!("Invalid backend.base_url: {}", config.backend.base_url))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.backend.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url,
            sharepoint_content_path: config.backend.sharepoint_content_path.clone(),
            sharepoint_preview_path: config.backend.sharepoint_preview_path.clone(),
        })
    }

    /// Absolute URLs pass through. Anything else is a path under the base;
    /// each segment is percent-encoded, so `?` or `#` in a file name stay
    /// part of the path.
    fn absolute(&self, url: &str) -> Result<Url> {
        if url.starts_with("http://") || url.starts_with("https://") {
            return Url::parse(url).with_context(|| format!("Invalid URL: {}", url));
        }

        let mut target = self.base_url.clone();
        target.set_query(None);
        target.set_fragment(None);
        target
            .path_segments_mut()
            .map_err(|_| anyhow!("backend.base_url cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(url.trim_start_matches('/').split('/'));
        Ok(target)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        token: Option<&str>,
    ) -> Result<TransportResponse> {
        let request = match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        let response = request.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            content_type,
            body,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_content(&self, url: &str, token: Option<&str>) -> Result<TransportResponse> {
        let target = self.absolute(url)?;
        tracing::debug!(url = %target, "GET content");
        self.send(self.client.get(target), token).await
    }

    async fn get_sharepoint_content(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<TransportResponse> {
        let endpoint = self.absolute(&self.sharepoint_content_path)?;
        tracing::debug!(%endpoint, sharepoint_url = url, "POST sharepoint content");
        let request = self
            .client
            .post(endpoint)
            .json(&serde_json::json!({ "url": url }));
        self.send(request, token).await
    }

    async fn preview_metadata(
        &self,
        url: &str,
        token: Option<&str>,
    ) -> Result<PreviewMetadataResponse> {
        let endpoint = self.absolute(&self.sharepoint_preview_path)?;
        let request = self
            .client
            .post(endpoint)
            .json(&serde_json::json!({ "url": url }));
        let response = self.send(request, token).await?;

        if !response.is_success() {
            bail!(
                "preview metadata request failed (HTTP {}): {}",
                response.status,
                String::from_utf8_lossy(&response.body)
                    .chars()
                    .take(200)
                    .collect::<String>()
            );
        }

        serde_json::from_slice(&response.body).context("Invalid preview metadata response")
    }
}
