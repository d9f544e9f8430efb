//! Transfer providers: where archive bytes come from
//!
//! [`HttpTransfer`] downloads over HTTP(S) and probes freshness with a HEAD
//! request; [`FileTransfer`] reads archives from the local filesystem. Both
//! report the source's modification time when it is known. Neither retries;
//! a failed transfer fails the run.

use crate::error::{ImportError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gtfs_common::types::Source;
use reqwest::header::LAST_MODIFIED;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A fully downloaded archive
#[derive(Debug, Clone)]
pub struct FetchedArchive {
    pub bytes: Vec<u8>,
    pub last_modified: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait Transfer: Send + Sync {
    /// Download the whole archive
    async fn fetch_all(&self, source: &Source) -> Result<FetchedArchive>;

    /// Cheap freshness probe; `None` when the source reports no timestamp
    async fn fetch_last_modified(&self, source: &Source) -> Result<Option<DateTime<Utc>>>;
}

/// Provider for the source's URL scheme
pub fn transfer_for(source: &Source, config: HttpTransferConfig) -> Result<Arc<dyn Transfer>> {
    match source.scheme() {
        "file" => Ok(Arc::new(FileTransfer::new())),
        _ => Ok(Arc::new(HttpTransfer::new(config)?)),
    }
}

// ============================================================================
// HTTP
// ============================================================================

/// HTTP client settings
#[derive(Debug, Clone)]
pub struct HttpTransferConfig {
    /// Whole-request timeout, download included
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpTransferConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            user_agent: format!("gtfs-ingest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpTransferConfig {
    /// Defaults overridden by `GTFS_HTTP_TIMEOUT_SECS` and `GTFS_USER_AGENT`
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("GTFS_HTTP_TIMEOUT_SECS") {
            config.timeout_secs = value.parse().map_err(|_| {
                ImportError::Config(format!("GTFS_HTTP_TIMEOUT_SECS must be an integer, got '{}'", value))
            })?;
        }

        if let Ok(value) = std::env::var("GTFS_USER_AGENT") {
            config.user_agent = value;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ImportError::Config("HTTP timeout must be greater than 0".to_string()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(ImportError::Config("HTTP user agent cannot be empty".to_string()));
        }
        Ok(())
    }
}

pub struct HttpTransfer {
    client: Client,
}

impl HttpTransfer {
    pub fn new(config: HttpTransferConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| ImportError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

/// Parse an HTTP `Last-Modified` value (`Tue, 15 Nov 1994 08:12:31 GMT`)
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn last_modified(response: &reqwest::Response, source: &Source) -> Option<DateTime<Utc>> {
    let value = response.headers().get(LAST_MODIFIED)?;
    let parsed = value.to_str().ok().and_then(parse_http_date);
    if parsed.is_none() {
        warn!(url = %source, header = ?value, "Ignoring unparseable Last-Modified header");
    }
    parsed
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch_all(&self, source: &Source) -> Result<FetchedArchive> {
        info!(url = %source, "Downloading feed archive");

        let response = self
            .client
            .get(source.url().clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ImportError::transfer(source.as_str(), e))?;

        let last_modified = last_modified(&response, source);
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ImportError::transfer(source.as_str(), e))?;

        info!(
            url = %source,
            bytes = bytes.len(),
            last_modified = ?last_modified,
            "Downloaded feed archive"
        );

        Ok(FetchedArchive {
            bytes: bytes.to_vec(),
            last_modified,
        })
    }

    async fn fetch_last_modified(&self, source: &Source) -> Result<Option<DateTime<Utc>>> {
        let response = self
            .client
            .head(source.url().clone())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ImportError::transfer(source.as_str(), e))?;

        let last_modified = last_modified(&response, source);
        debug!(url = %source, last_modified = ?last_modified, "Probed feed freshness");
        Ok(last_modified)
    }
}

// ============================================================================
// Local files
// ============================================================================

/// Reads `file://` sources; the timestamp is the file's mtime
#[derive(Debug, Default)]
pub struct FileTransfer;

impl FileTransfer {
    pub fn new() -> Self {
        Self
    }

    fn path(source: &Source) -> Result<PathBuf> {
        source
            .url()
            .to_file_path()
            .map_err(|()| ImportError::transfer(source.as_str(), "not a local file URL"))
    }

    async fn modified(source: &Source, path: &Path) -> Result<Option<DateTime<Utc>>> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| ImportError::transfer(source.as_str(), e))?;
        Ok(metadata.modified().ok().map(DateTime::<Utc>::from))
    }
}

#[async_trait]
impl Transfer for FileTransfer {
    async fn fetch_all(&self, source: &Source) -> Result<FetchedArchive> {
        let path = Self::path(source)?;
        let last_modified = Self::modified(source, &path).await?;
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|e| ImportError::transfer(source.as_str(), e))?;

        info!(path = %path.display(), bytes = bytes.len(), "Loaded feed archive from disk");

        Ok(FetchedArchive {
            bytes,
            last_modified,
        })
    }

    async fn fetch_last_modified(&self, source: &Source) -> Result<Option<DateTime<Utc>>> {
        let path = Self::path(source)?;
        Self::modified(source, &path).await
    }
}
