//! GTFS Ingest Library
//!
//! Streams a zipped GTFS feed into a keyed document store in bounded-memory
//! batches, skipping the import entirely when the stored copy is current.
//!
//! # Pipeline
//!
//! ```text
//! Transfer -> ArchiveSource -> RowSource -> Batcher -> KeyAssigner -> DocumentStore
//!                                                   \-> ProgressReporter -> observer
//! ```
//!
//! - [`archive`] and [`rows`]: lazy entry and record sequences over the payload
//! - [`batch`]: fixed-size grouping for any iterator
//! - [`keys`]: `{namespace}/{table}/{primary key}` document ids
//! - [`progress`]: two-level completion fractions for observers
//! - [`sync`]: whether a run has to import at all
//! - [`wipe`]: paged deletion of a namespace before a resync
//! - [`importer`]: the orchestrator and [`initialize`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use gtfs_common::types::Source;
//! use gtfs_ingest::{initialize, ImportOptions, MemoryStore, ProgressSnapshot};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = Source::from_arg("./google_transit.zip")?;
//!     let options = ImportOptions::new().with_store(Arc::new(MemoryStore::new()));
//!
//!     let feed = initialize(source, options, |_: &ProgressSnapshot| {}).await?;
//!     println!("{}", feed.report.summary());
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod archive;
pub mod batch;
pub mod config;
pub mod error;
pub mod importer;
pub mod keys;
pub mod pipeline;
pub mod progress;
pub mod rows;
pub mod store;
pub mod sync;
pub mod transfer;
pub mod wipe;

#[cfg(test)]
mod test_support;

pub use config::{ImportOptions, StoreTarget};
pub use error::{ImportError, Result};
pub use importer::{initialize, ImportPhase, ImportReport, ImportedFeed, Importer};
pub use progress::{ProgressObserver, ProgressSnapshot, StepProgress};
pub use store::{Document, DocumentStore, MemoryStore, SqliteStore};
pub use sync::{SyncDecision, SyncReason};
pub use transfer::{FetchedArchive, FileTransfer, HttpTransfer, HttpTransferConfig, Transfer};
