//! Error taxonomy for an import run
//!
//! Every variant is fatal to the run and propagates to the caller of
//! [`crate::importer::initialize`]. The only storage error ever treated as
//! control flow is [`StoreError::NotFound`] while reading sync metadata,
//! and that conversion happens inside [`crate::sync`], not here.

use crate::store::StoreError;
use thiserror::Error;

/// Result type for import operations
pub type Result<T> = std::result::Result<T, ImportError>;

#[derive(Debug, Error)]
pub enum ImportError {
    /// Fetching the archive or probing its freshness failed
    #[error("Transfer error for {url}: {reason}")]
    Transfer { url: String, reason: String },

    /// The archive container (or one of its entries) could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// A row of a table file could not be parsed
    #[error("Parse error in {entry}: {source}")]
    Parse {
        entry: String,
        #[source]
        source: csv::Error,
    },

    #[error("Unknown GTFS table: {0}")]
    UnknownTable(String),

    #[error("Table '{table}' row is missing primary key column '{column}'")]
    MissingKeyColumn { table: String, column: String },

    /// Reading stored sync metadata failed for a reason other than absence
    #[error("Failed to read sync metadata: {0}")]
    MetadataRead(#[source] StoreError),

    /// Opening the store, wiping, or writing documents failed
    #[error("Storage write failed: {0}")]
    StorageWrite(#[source] StoreError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Import cancelled")]
    Cancelled,

    /// The blocking decode worker panicked or was aborted
    #[error("Import worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl ImportError {
    pub fn transfer(url: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        ImportError::Transfer {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-friendly name of the error class
    pub fn kind(&self) -> &'static str {
        match self {
            ImportError::Transfer { .. } => "transfer",
            ImportError::Decode(_) => "decode",
            ImportError::Parse { .. } => "parse",
            ImportError::UnknownTable(_) => "unknown_table",
            ImportError::MissingKeyColumn { .. } => "missing_key_column",
            ImportError::MetadataRead(_) => "metadata_read",
            ImportError::StorageWrite(_) => "storage_write",
            ImportError::Config(_) => "config",
            ImportError::Cancelled => "cancelled",
            ImportError::Worker(_) => "worker",
        }
    }
}

impl From<zip::result::ZipError> for ImportError {
    fn from(err: zip::result::ZipError) -> Self {
        ImportError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ImportError::UnknownTable("widgets".to_string());
        assert_eq!(err.to_string(), "Unknown GTFS table: widgets");
        assert_eq!(err.kind(), "unknown_table");

        let err = ImportError::transfer("https://example.com/gtfs.zip", "HTTP 404");
        assert_eq!(
            err.to_string(),
            "Transfer error for https://example.com/gtfs.zip: HTTP 404"
        );
    }

    #[test]
    fn test_storage_errors_keep_source() {
        use std::error::Error as _;

        let err = ImportError::MetadataRead(StoreError::Backend("disk on fire".to_string()));
        assert!(err.source().is_some());
        assert_eq!(err.kind(), "metadata_read");
    }
}
