//! TOML configuration parsing.
//!
//! Every section has defaults, so an empty file is a valid configuration.
//!
//! ```toml
//! [content]
//! root = "/content"
//!
//! [backend]
//! base_url = "http://127.0.0.1:50505"
//! sharepoint_content_path = "/sharepoint/content"
//! sharepoint_preview_path = "/sharepoint/preview"
//! timeout_secs = 30
//!
//! [sharepoint]
//! hosts = ["sharepoint.com"]
//! inline_preview = true
//!
//! [preview]
//! attempt_timeout_secs = 15
//!
//! [server]
//! bind = "127.0.0.1:7341"
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub sharepoint: SharePointConfig,
    #[serde(default)]
    pub preview: PreviewConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    /// Path prefix under which the backend serves locally stored documents.
    #[serde(default = "default_content_root")]
    pub root: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            root: default_content_root(),
        }
    }
}

fn default_content_root() -> String {
    "/content".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct BackendConfig {
    /// Base URL that relative content paths are joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_sharepoint_content_path")]
    pub sharepoint_content_path: String,
    #[serde(default = "default_sharepoint_preview_path")]
    pub sharepoint_preview_path: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            sharepoint_content_path: default_sharepoint_content_path(),
            sharepoint_preview_path: default_sharepoint_preview_path(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:50505".to_string()
}
fn default_sharepoint_content_path() -> String {
    "/sharepoint/content".to_string()
}
fn default_sharepoint_preview_path() -> String {
    "/sharepoint/preview".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct SharePointConfig {
    /// Host substrings that mark an address as SharePoint-hosted.
    ///
    /// Matching is a plain substring test, so vanity domains must be
    /// listed explicitly.
    #[serde(default = "default_sharepoint_hosts")]
    pub hosts: Vec<String>,
    /// When true, SharePoint citations open in the embed preview instead of
    /// being downloaded through the content endpoint.
    #[serde(default = "default_inline_preview")]
    pub inline_preview: bool,
}

impl Default for SharePointConfig {
    fn default() -> Self {
        Self {
            hosts: default_sharepoint_hosts(),
            inline_preview: default_inline_preview(),
        }
    }
}

fn default_sharepoint_hosts() -> Vec<String> {
    vec!["sharepoint.com".to_string()]
}
fn default_inline_preview() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct PreviewConfig {
    /// Upper bound on a single metadata lookup before falling back to the
    /// synthesized embed address.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: default_attempt_timeout_secs(),
        }
    }
}

fn default_attempt_timeout_secs() -> u64 {
    15
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

/// Rejects configurations that would make resolution or fetching ambiguous.
pub fn validate(config: &Config) -> Result<()> {
    if !config.content.root.starts_with('/') {
        anyhow::bail!("content.root must start with '/'");
    }

    url::Url::parse(&config.backend.base_url)
        .with_context(|| format!("backend.base_url is not a URL: {}", config.backend.base_url))?;

    for path in [
        &config.backend.sharepoint_content_path,
        &config.backend.sharepoint_preview_path,
    ] {
        if !path.starts_with('/') {
            anyhow::bail!("backend endpoint paths must start with '/': {}", path);
        }
    }

    if config.backend.timeout_secs == 0 {
        anyhow::bail!("backend.timeout_secs must be > 0");
    }

    if config.preview.attempt_timeout_secs == 0 {
        anyhow::bail!("preview.attempt_timeout_secs must be > 0");
    }

    if config.sharepoint.hosts.iter().any(|h| h.trim().is_empty()) {
        anyhow::bail!("sharepoint.hosts must not contain empty entries");
    }

    Ok(())
}
