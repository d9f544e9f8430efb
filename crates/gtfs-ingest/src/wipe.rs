//! Namespace wipe
//!
//! Deletes every document under `{namespace}/` in pages of at most
//! `batch_size + 1` ids, reporting progress after each page. Sync metadata
//! lives under `_local/` and is never in range.

use crate::error::{ImportError, Result};
use crate::progress::{ProgressReporter, StepProgress};
use crate::store::DocumentStore;
use std::num::NonZeroUsize;
use tracing::{debug, info};

pub const WIPE_STEP: &str = "wipe";

/// Inclusive key range covering every document id of a namespace
pub fn namespace_range(namespace: &str) -> (String, String) {
    (
        format!("{}/", namespace),
        format!("{}/{}", namespace, char::MAX),
    )
}

/// Delete all documents of `namespace`; returns how many were deleted
///
/// Only the first page counts the range. Later pages fetch ids alone and
/// progress counts down from that first total.
pub async fn wipe_namespace(
    store: &dyn DocumentStore,
    namespace: &str,
    batch_size: NonZeroUsize,
    progress: &ProgressReporter,
) -> Result<u64> {
    let (mut start, end) = namespace_range(namespace);
    let limit = batch_size.get().saturating_add(1);

    let first = store
        .range_scan(&start, &end, limit)
        .await
        .map_err(ImportError::StorageWrite)?;
    let total = first.total_matching;
    let mut ids = first.ids;
    let mut deleted: u64 = 0;

    loop {
        let Some(last) = ids.last() else {
            break;
        };
        start = last.clone();

        store
            .bulk_delete(&ids)
            .await
            .map_err(ImportError::StorageWrite)?;

        deleted += ids.len() as u64;
        progress.report(StepProgress {
            step_name: WIPE_STEP.to_string(),
            step_number: 0,
            step_count: 1,
            step_progress: deleted,
            step_total: total.max(deleted),
        });
        debug!(
            namespace,
            deleted,
            remaining = total.saturating_sub(deleted),
            "Wiped page"
        );

        if ids.len() < 2 {
            break;
        }

        ids = store
            .range_ids(&start, &end, limit)
            .await
            .map_err(ImportError::StorageWrite)?;
    }

    info!(namespace, deleted, "Wiped namespace");
    Ok(deleted)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::progress::ProgressSnapshot;
    use crate::store::{Document, MemoryStore, ScanPage, StoreError};
    use async_trait::async_trait;
    use gtfs_common::types::SyncMetadata;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    async fn seeded_store(ids: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        let documents = ids
            .iter()
            .map(|id| Document::new(*id, serde_json::Map::new()))
            .collect();
        store.bulk_put(documents).await.unwrap();
        store
    }

    fn recording_reporter() -> (ProgressReporter, Arc<Mutex<Vec<ProgressSnapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ProgressReporter::new(Arc::new(move |s: &ProgressSnapshot| {
            sink.lock().unwrap().push(s.clone());
        }));
        (reporter, seen)
    }

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[tokio::test]
    async fn test_wipe_empty_namespace_is_a_no_op() {
        let store = seeded_store(&["other/agency/1"]).await;
        let (reporter, seen) = recording_reporter();

        let deleted = wipe_namespace(&store, "gtfs", size(10), &reporter).await.unwrap();

        assert_eq!(deleted, 0);
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_wipe_pages_through_namespace() {
        let ids: Vec<String> = (0..23).map(|i| format!("gtfs/stops/{:03}", i)).collect();
        let mut all: Vec<&str> = ids.iter().map(String::as_str).collect();
        let metadata_id = SyncMetadata::document_id("gtfs", "https://example.com/gtfs.zip");
        all.push(&metadata_id);
        all.push("gtfsx/stops/1");
        let store = seeded_store(&all).await;
        let (reporter, seen) = recording_reporter();

        let deleted = wipe_namespace(&store, "gtfs", size(4), &reporter).await.unwrap();

        assert_eq!(deleted, 23);
        assert_eq!(store.ids().await, vec![metadata_id.clone(), "gtfsx/stops/1".to_string()]);

        let snapshots = seen.lock().unwrap();
        assert!(snapshots.len() >= 5);
        assert!(snapshots.iter().all(|s| s.step_name == WIPE_STEP));
        assert!(snapshots
            .windows(2)
            .all(|w| w[0].step_progress <= w[1].step_progress));
        let last = snapshots.last().unwrap();
        assert_eq!(last.step_progress, 23);
        assert_eq!(last.step_percent, 1.0);
    }

    #[tokio::test]
    async fn test_wipe_single_document() {
        let store = seeded_store(&["gtfs/agency/1"]).await;
        let deleted = wipe_namespace(&store, "gtfs", size(100), &ProgressReporter::silent())
            .await
            .unwrap();
        assert_eq!(deleted, 1);
        assert!(store.is_empty().await);
    }

    /// Delegates to a memory store, tallying full-range counts
    #[derive(Default)]
    struct CountingScans {
        inner: MemoryStore,
        counted_scans: AtomicUsize,
        id_scans: AtomicUsize,
    }

    #[async_trait]
    impl DocumentStore for CountingScans {
        async fn get(&self, id: &str) -> std::result::Result<Document, StoreError> {
            self.inner.get(id).await
        }

        async fn put(&self, document: Document) -> std::result::Result<(), StoreError> {
            self.inner.put(document).await
        }

        async fn bulk_put(&self, documents: Vec<Document>) -> std::result::Result<(), StoreError> {
            self.inner.bulk_put(documents).await
        }

        async fn range_scan(
            &self,
            start: &str,
            end: &str,
            limit: usize,
        ) -> std::result::Result<ScanPage, StoreError> {
            self.counted_scans.fetch_add(1, Ordering::SeqCst);
            self.inner.range_scan(start, end, limit).await
        }

        async fn range_ids(
            &self,
            start: &str,
            end: &str,
            limit: usize,
        ) -> std::result::Result<Vec<String>, StoreError> {
            self.id_scans.fetch_add(1, Ordering::SeqCst);
            self.inner.range_ids(start, end, limit).await
        }

        async fn bulk_delete(&self, ids: &[String]) -> std::result::Result<(), StoreError> {
            self.inner.bulk_delete(ids).await
        }
    }

    #[tokio::test]
    async fn test_wipe_counts_the_range_once() {
        let store = CountingScans::default();
        let documents = (0..1000)
            .map(|i| Document::new(format!("gtfs/stop_times/T{:04}/1", i), serde_json::Map::new()))
            .collect();
        store.inner.bulk_put(documents).await.unwrap();
        let (reporter, seen) = recording_reporter();

        let deleted = wipe_namespace(&store, "gtfs", size(10), &reporter).await.unwrap();

        assert_eq!(deleted, 1000);
        assert!(store.inner.is_empty().await);
        assert_eq!(store.counted_scans.load(Ordering::SeqCst), 1);
        // pages of 11 ids, each rescan starts at the last deleted id
        assert!(store.id_scans.load(Ordering::SeqCst) <= 1000 / 11 + 2);

        let snapshots = seen.lock().unwrap();
        assert!(snapshots.iter().all(|s| s.step_total == 1000));
        assert_eq!(snapshots.last().unwrap().step_progress, 1000);
    }

    #[test]
    fn test_namespace_range_excludes_neighbours() {
        let (start, end) = namespace_range("gtfs");
        assert!("gtfs/zzz".to_string() >= start && "gtfs/zzz".to_string() <= end);
        assert!("gtfs/\u{fff0}x".to_string() <= end);
        assert!("gtfsx/agency/1".to_string() > end);
        assert!("_local/gtfs/url".to_string() < start);
    }
}
