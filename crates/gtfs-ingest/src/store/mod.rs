//! Document storage
//!
//! The importer only ever talks to storage through [`DocumentStore`], so
//! engines can be swapped without touching the pipeline. Two engines ship
//! with the crate:
//!
//! - [`MemoryStore`]: ordered in-memory map, used by tests and short-lived runs
//! - [`SqliteStore`]: single-file SQLite database, the CLI default
//!
//! Keys are compared as raw UTF-8 bytes in both engines, which is what the
//! namespace range scans used by the wipe rely on.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised by storage engines
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt document '{id}': {reason}")]
    Corrupt { id: String, reason: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// A keyed JSON object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub fields: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// One page of a key range scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Matching ids in ascending order, at most `limit` of them
    pub ids: Vec<String>,

    /// Number of ids in the whole range, ignoring the limit
    pub total_matching: u64,
}

/// Storage operations consumed by the importer
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document; an absent id yields [`StoreError::NotFound`]
    async fn get(&self, id: &str) -> Result<Document, StoreError>;

    /// Insert or overwrite one document
    async fn put(&self, document: Document) -> Result<(), StoreError>;

    /// Insert or overwrite many documents
    async fn bulk_put(&self, documents: Vec<Document>) -> Result<(), StoreError>;

    /// Ids in `start..=end` (byte order), first `limit` of them
    async fn range_scan(&self, start: &str, end: &str, limit: usize)
        -> Result<ScanPage, StoreError>;

    /// Like [`DocumentStore::range_scan`] without counting the whole range
    async fn range_ids(
        &self,
        start: &str,
        end: &str,
        limit: usize,
    ) -> Result<Vec<String>, StoreError> {
        Ok(self.range_scan(start, end, limit).await?.ids)
    }

    /// Delete the given ids; unknown ids are ignored
    async fn bulk_delete(&self, ids: &[String]) -> Result<(), StoreError>;
}
