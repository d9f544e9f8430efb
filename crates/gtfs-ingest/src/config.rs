//! Import configuration
//!
//! [`ImportOptions`] carries everything a run needs beyond the source URL.
//! Defaults match a plain `gtfs-ingest import <url>`:
//!
//! | option          | default               | env                  |
//! |-----------------|-----------------------|----------------------|
//! | `namespace`     | `gtfs`                | `GTFS_NAMESPACE`     |
//! | `auto_update`   | `false`               | `GTFS_AUTO_UPDATE`   |
//! | `wipe_existing` | `false`               | `GTFS_WIPE_EXISTING` |
//! | `batch_size`    | `100`                 | `GTFS_BATCH_SIZE`    |
//! | `store`         | `Named("gtfs.db")`    | `GTFS_DATABASE`      |

use crate::error::{ImportError, Result};
use crate::store::{DocumentStore, SqliteStore};
use crate::transfer::Transfer;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_NAMESPACE: &str = "gtfs";
pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_DATABASE: &str = "gtfs.db";

/// Where documents are written
#[derive(Clone)]
pub enum StoreTarget {
    /// SQLite database file, opened when the importer is built
    Named(PathBuf),
    /// An already open store shared with the caller
    Handle(Arc<dyn DocumentStore>),
}

impl StoreTarget {
    /// Resolve to a store handle
    pub fn open(&self) -> Result<Arc<dyn DocumentStore>> {
        match self {
            StoreTarget::Named(path) => {
                let store = SqliteStore::open(path).map_err(ImportError::StorageWrite)?;
                Ok(Arc::new(store))
            },
            StoreTarget::Handle(store) => Ok(Arc::clone(store)),
        }
    }
}

impl std::fmt::Debug for StoreTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreTarget::Named(path) => f.debug_tuple("Named").field(path).finish(),
            StoreTarget::Handle(_) => f.write_str("Handle(..)"),
        }
    }
}

/// Options for one import run
#[derive(Clone)]
pub struct ImportOptions {
    /// Prefix of every document id written by the run
    pub namespace: String,

    /// Probe the source for a newer archive when metadata already exists
    pub auto_update: bool,

    /// Force a wipe and full resync
    pub wipe_existing: bool,

    /// Records per storage write; also bounds wipe page size
    pub batch_size: usize,

    pub store: StoreTarget,

    /// Overrides the scheme-based transfer provider
    pub transfer: Option<Arc<dyn Transfer>>,

    /// Cancels the run at its next suspension point
    pub cancel: Option<CancellationToken>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            auto_update: false,
            wipe_existing: false,
            batch_size: DEFAULT_BATCH_SIZE,
            store: StoreTarget::Named(PathBuf::from(DEFAULT_DATABASE)),
            transfer: None,
            cancel: None,
        }
    }
}

impl ImportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `GTFS_*` environment variables
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Ok(namespace) = std::env::var("GTFS_NAMESPACE") {
            options.namespace = namespace;
        }

        if let Ok(value) = std::env::var("GTFS_AUTO_UPDATE") {
            options.auto_update = parse_bool("GTFS_AUTO_UPDATE", &value)?;
        }

        if let Ok(value) = std::env::var("GTFS_WIPE_EXISTING") {
            options.wipe_existing = parse_bool("GTFS_WIPE_EXISTING", &value)?;
        }

        if let Ok(value) = std::env::var("GTFS_BATCH_SIZE") {
            options.batch_size = value.parse().map_err(|_| {
                ImportError::Config(format!("GTFS_BATCH_SIZE must be an integer, got '{}'", value))
            })?;
        }

        if let Ok(path) = std::env::var("GTFS_DATABASE") {
            options.store = StoreTarget::Named(PathBuf::from(path));
        }

        options.validate()?;
        Ok(options)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_auto_update(mut self, auto_update: bool) -> Self {
        self.auto_update = auto_update;
        self
    }

    pub fn with_wipe_existing(mut self, wipe_existing: bool) -> Self {
        self.wipe_existing = wipe_existing;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.store = StoreTarget::Named(path.into());
        self
    }

    pub fn with_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = StoreTarget::Handle(store);
        self
    }

    pub fn with_transfer(mut self, transfer: Arc<dyn Transfer>) -> Self {
        self.transfer = Some(transfer);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() {
            return Err(ImportError::Config("Namespace cannot be empty".to_string()));
        }

        // `_` is reserved for sync metadata keys
        if self.namespace.starts_with('_') {
            return Err(ImportError::Config(format!(
                "Namespace '{}' cannot start with '_'",
                self.namespace
            )));
        }

        if self.namespace.contains('/') {
            return Err(ImportError::Config(format!(
                "Namespace '{}' cannot contain '/'",
                self.namespace
            )));
        }

        if self.batch_size == 0 {
            return Err(ImportError::Config("Batch size must be greater than 0".to_string()));
        }

        Ok(())
    }
}

impl std::fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOptions")
            .field("namespace", &self.namespace)
            .field("auto_update", &self.auto_update)
            .field("wipe_existing", &self.wipe_existing)
            .field("batch_size", &self.batch_size)
            .field("store", &self.store)
            .field("transfer", &self.transfer.as_ref().map(|_| ".."))
            .field("cancellable", &self.cancel.is_some())
            .finish()
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ImportError::Config(format!(
            "{} must be a boolean, got '{}'",
            name, value
        ))),
    }
}
