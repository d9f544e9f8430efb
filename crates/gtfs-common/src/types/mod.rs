//! Common types used across the GTFS sync workspace

use crate::error::{CommonError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Key prefix reserved for per-source bookkeeping records.
///
/// Feed documents live under `{namespace}/…`; namespaces may not start with
/// `_`, so nothing under this prefix is ever touched by a namespace wipe.
pub const RESERVED_PREFIX: &str = "_local/";

// ============================================================================
// Source
// ============================================================================

/// A remote (or local) GTFS feed archive.
///
/// Identity is the URL string; it keys the sync metadata record.
///
/// # Examples
///
/// ```rust
/// use gtfs_common::types::Source;
///
/// let source = Source::parse("https://www.itsmarta.com/google_transit_feed/google_transit.zip").unwrap();
/// assert_eq!(source.scheme(), "https");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Source {
    url: Url,
}

impl Source {
    /// Parse an `http`, `https` or `file` URL
    pub fn parse(url: &str) -> Result<Self> {
        let parsed = Url::parse(url).map_err(|e| CommonError::InvalidSource {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" | "file" => Ok(Self { url: parsed }),
            other => Err(CommonError::InvalidSource {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }

    /// Build a `file://` source from a local path (relative paths are
    /// resolved against the current directory)
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let absolute = std::path::absolute(path)?;
        let url = Url::from_file_path(&absolute).map_err(|()| CommonError::InvalidSource {
            url: path.display().to_string(),
            reason: "path cannot be expressed as a file URL".to_string(),
        })?;
        Ok(Self { url })
    }

    /// Accept either a URL or a bare filesystem path
    pub fn from_arg(arg: &str) -> Result<Self> {
        match Url::parse(arg) {
            Ok(_) => Self::parse(arg),
            Err(url::ParseError::RelativeUrlWithoutBase) => Self::from_path(arg),
            Err(e) => Err(CommonError::InvalidSource {
                url: arg.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.url.as_str())
    }
}

// ============================================================================
// Sync Metadata
// ============================================================================

/// Bookkeeping written after a feed has been fully imported.
///
/// Only the presence of the record and `last_updated` drive the sync
/// decision; the remaining fields describe what was imported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncMetadata {
    /// Remote modification time reported when the archive was downloaded
    pub last_updated: Option<DateTime<Utc>>,

    /// Source URL this record belongs to
    pub url: String,

    /// SHA-256 of the imported archive payload
    #[serde(default)]
    pub archive_sha256: Option<String>,

    /// Number of documents written by the import
    #[serde(default)]
    pub document_count: u64,

    /// Wall-clock time the import finished
    #[serde(default)]
    pub synced_at: Option<DateTime<Utc>>,
}

impl SyncMetadata {
    /// Storage key of the metadata record for `url` within `namespace`
    pub fn document_id(namespace: &str, url: &str) -> String {
        format!("{}{}/{}", RESERVED_PREFIX, namespace, url)
    }

    /// Whether a probed remote timestamp proves the stored data is stale.
    ///
    /// A probe without a timestamp cannot prove anything; a stored record
    /// without one is treated as older than any known timestamp.
    pub fn is_stale(&self, remote: Option<DateTime<Utc>>) -> bool {
        match (remote, self.last_updated) {
            (Some(remote), Some(stored)) => remote > stored,
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Encode as a JSON object suitable for a document body
    pub fn to_fields(&self) -> Result<serde_json::Map<String, serde_json::Value>> {
        match serde_json::to_value(self)? {
            serde_json::Value::Object(map) => Ok(map),
            other => Err(CommonError::InvalidMetadata(format!(
                "expected an object, got {}",
                other
            ))),
        }
    }

    /// Decode from a document body
    pub fn from_fields(fields: serde_json::Map<String, serde_json::Value>) -> Result<Self> {
        Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn metadata(last_updated: Option<DateTime<Utc>>) -> SyncMetadata {
        SyncMetadata {
            last_updated,
            url: "https://example.com/gtfs.zip".to_string(),
            archive_sha256: None,
            document_count: 0,
            synced_at: None,
        }
    }

    #[test]
    fn test_source_parse_accepts_http_and_file() {
        assert!(Source::parse("https://example.com/gtfs.zip").is_ok());
        assert!(Source::parse("http://example.com/gtfs.zip").is_ok());
        assert!(Source::parse("file:///tmp/gtfs.zip").is_ok());
    }

    #[test]
    fn test_source_parse_rejects_other_schemes() {
        let err = Source::parse("ftp://example.com/gtfs.zip").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme 'ftp'"));
        assert!(Source::parse("not a url").is_err());
    }

    #[test]
    fn test_source_from_arg_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feed.zip");
        let source = Source::from_arg(path.to_str().unwrap()).unwrap();
        assert_eq!(source.scheme(), "file");
        assert_eq!(source.url().to_file_path().unwrap(), path);
    }

    #[test]
    fn test_metadata_document_id_is_reserved() {
        let id = SyncMetadata::document_id("gtfs", "https://example.com/gtfs.zip");
        assert_eq!(id, "_local/gtfs/https://example.com/gtfs.zip");
        assert!(id.starts_with(RESERVED_PREFIX));
    }

    #[test]
    fn test_is_stale() {
        let t0 = Utc.with_ymd_and_hms(2019, 12, 6, 15, 19, 59).unwrap();
        let t1 = Utc.with_ymd_and_hms(2020, 3, 9, 0, 52, 48).unwrap();

        assert!(metadata(Some(t0)).is_stale(Some(t1)));
        assert!(!metadata(Some(t1)).is_stale(Some(t0)));
        assert!(!metadata(Some(t0)).is_stale(Some(t0)));
        assert!(metadata(None).is_stale(Some(t0)));
        assert!(!metadata(Some(t0)).is_stale(None));
    }

    #[test]
    fn test_metadata_fields_use_camel_case() {
        let t0 = Utc.with_ymd_and_hms(2019, 12, 6, 15, 19, 59).unwrap();
        let mut meta = metadata(Some(t0));
        meta.document_count = 42;

        let fields = meta.to_fields().unwrap();
        assert_eq!(fields["url"], "https://example.com/gtfs.zip");
        assert_eq!(fields["documentCount"], 42);
        assert!(fields.contains_key("lastUpdated"));

        assert_eq!(SyncMetadata::from_fields(fields).unwrap(), meta);
    }

    #[test]
    fn test_metadata_from_minimal_fields() {
        let mut fields = serde_json::Map::new();
        fields.insert("lastUpdated".to_string(), serde_json::Value::Null);
        fields.insert("url".to_string(), "https://example.com/gtfs.zip".into());

        let meta = SyncMetadata::from_fields(fields).unwrap();
        assert_eq!(meta.last_updated, None);
        assert_eq!(meta.document_count, 0);
    }
}
