//! GTFS Sync Common Library
//!
//! Shared types, utilities, and error handling for the GTFS sync workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`CommonError`] and its [`Result`] alias
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Checksums**: digests recorded alongside each successful sync
//! - **Types**: feed sources and per-source sync metadata
//!
//! # Example
//!
//! ```no_run
//! use gtfs_common::types::{Source, SyncMetadata};
//! use gtfs_common::Result;
//!
//! fn metadata_key(namespace: &str, url: &str) -> Result<String> {
//!     let source = Source::parse(url)?;
//!     Ok(SyncMetadata::document_id(namespace, source.as_str()))
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod checksum;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
