//! Shared fixtures for integration tests

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gtfs_common::types::Source;
use gtfs_ingest::{FetchedArchive, ImportError, ProgressSnapshot, Transfer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[path = "../../src/test_support.rs"]
mod test_support;

pub use test_support::{build_archive, ArchiveItem};

pub const FEED_URL: &str = "https://feeds.example.com/gtfs.zip";

pub fn source() -> Source {
    Source::parse(FEED_URL).unwrap()
}

/// Transfer serving an in-memory archive with scripted timestamps
pub struct ScriptedTransfer {
    archive: Mutex<Vec<u8>>,
    last_modified: Mutex<Option<DateTime<Utc>>>,
    pub fetches: AtomicUsize,
    pub probes: AtomicUsize,
}

impl ScriptedTransfer {
    pub fn new(archive: Vec<u8>, last_modified: Option<DateTime<Utc>>) -> Arc<Self> {
        Arc::new(Self {
            archive: Mutex::new(archive),
            last_modified: Mutex::new(last_modified),
            fetches: AtomicUsize::new(0),
            probes: AtomicUsize::new(0),
        })
    }

    /// Publish a new archive version
    pub fn publish(&self, archive: Vec<u8>, last_modified: Option<DateTime<Utc>>) {
        *self.archive.lock().unwrap() = archive;
        *self.last_modified.lock().unwrap() = last_modified;
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transfer for ScriptedTransfer {
    async fn fetch_all(&self, _source: &Source) -> Result<FetchedArchive, ImportError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(FetchedArchive {
            bytes: self.archive.lock().unwrap().clone(),
            last_modified: *self.last_modified.lock().unwrap(),
        })
    }

    async fn fetch_last_modified(
        &self,
        _source: &Source,
    ) -> Result<Option<DateTime<Utc>>, ImportError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(*self.last_modified.lock().unwrap())
    }
}

/// Observer collecting every snapshot it sees
#[derive(Clone, Default)]
pub struct Recorder {
    snapshots: Arc<Mutex<Vec<ProgressSnapshot>>>,
}

impl Recorder {
    pub fn observer(&self) -> impl Fn(&ProgressSnapshot) + Send + Sync + 'static {
        let snapshots = Arc::clone(&self.snapshots);
        move |snapshot: &ProgressSnapshot| snapshots.lock().unwrap().push(snapshot.clone())
    }

    pub fn snapshots(&self) -> Vec<ProgressSnapshot> {
        self.snapshots.lock().unwrap().clone()
    }

    /// Snapshots of one step, in emission order
    pub fn for_step(&self, step_name: &str) -> Vec<ProgressSnapshot> {
        self.snapshots()
            .into_iter()
            .filter(|s| s.step_name == step_name)
            .collect()
    }
}
