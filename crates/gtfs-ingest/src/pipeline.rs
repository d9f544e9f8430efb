//! Decode pipeline: archive -> rows -> batches -> keyed documents
//!
//! Zip inflation and CSV parsing are blocking work, so the whole chain runs
//! on a blocking thread and hands write-ready batches to the async writer
//! over a channel with room for a single batch. The producer parks until
//! the writer takes the previous batch, which keeps at most two batches of
//! records alive besides the archive payload.
//!
//! The producer stops when it runs out of entries, hits an error, or finds
//! the receiving side gone. Its outcome (entry counts or the first error)
//! is the value of the returned [`JoinHandle`]; every batch sent before an
//! error is still delivered.

use crate::archive::ArchiveSource;
use crate::batch::BatchExt;
use crate::error::{ImportError, Result};
use crate::keys::{self, KeyAssigner};
use crate::progress::StepProgress;
use crate::store::Document;
use std::num::NonZeroUsize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Documents of one batch plus the progress counters after its last record
#[derive(Debug)]
pub struct WriteBatch {
    pub documents: Vec<Document>,
    pub progress: StepProgress,
}

/// What the producer got through
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerSummary {
    pub entries: usize,
    pub records: u64,
}

/// Start the blocking producer for an archive payload
pub fn spawn_producer(
    archive: Vec<u8>,
    namespace: String,
    batch_size: NonZeroUsize,
) -> (mpsc::Receiver<WriteBatch>, JoinHandle<Result<ProducerSummary>>) {
    let (tx, rx) = mpsc::channel(1);
    let handle =
        tokio::task::spawn_blocking(move || produce(archive, &namespace, batch_size, &tx));
    (rx, handle)
}

/// Run the decode chain, sending each batch through `tx`
pub fn produce(
    archive: Vec<u8>,
    namespace: &str,
    batch_size: NonZeroUsize,
    tx: &mpsc::Sender<WriteBatch>,
) -> Result<ProducerSummary> {
    let mut archive = ArchiveSource::open(archive)?;
    let mut summary = ProducerSummary::default();

    while let Some(entry) = archive.next_entry() {
        let entry = entry?;
        let file_number = entry.file_number() as u64;
        let total_files = entry.total_files() as u64;
        let assigner = KeyAssigner::new(namespace, keys::table_name(entry.name()))?;

        info!(
            entry = entry.name(),
            table = assigner.table(),
            file_number,
            total_files,
            "Streaming entry"
        );

        let mut records: u64 = 0;
        for batch in entry.into_rows().try_batched(batch_size) {
            let batch = batch?;
            let Some(last) = batch.last() else {
                continue;
            };
            let progress = StepProgress {
                step_name: assigner.table().to_string(),
                step_number: file_number,
                step_count: total_files,
                step_progress: last.bytes_read,
                step_total: last.total_bytes,
            };

            records += batch.len() as u64;
            let documents = batch
                .into_iter()
                .map(|record| assigner.document(record))
                .collect::<Result<Vec<_>>>()?;

            tx.blocking_send(WriteBatch {
                documents,
                progress,
            })
            .map_err(|_| ImportError::Cancelled)?;
        }

        debug!(table = assigner.table(), records, "Finished entry");
        summary.entries += 1;
        summary.records += records;
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::test_support::{build_archive, ArchiveItem};

    fn size(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    async fn drain(
        mut rx: mpsc::Receiver<WriteBatch>,
        handle: JoinHandle<Result<ProducerSummary>>,
    ) -> (Vec<WriteBatch>, Result<ProducerSummary>) {
        let mut batches = Vec::new();
        while let Some(batch) = rx.recv().await {
            batches.push(batch);
        }
        (batches, handle.await.unwrap())
    }

    #[tokio::test]
    async fn test_batches_follow_archive_order() {
        let archive = build_archive(&[
            ArchiveItem::File("agency.txt", "agency_id,agency_name\n1,A\n2,B\n"),
            ArchiveItem::Dir("extras/"),
            ArchiveItem::File("stops.txt", "stop_id\n10\n11\n12\n"),
        ]);

        let (rx, handle) = spawn_producer(archive, "gtfs".to_string(), size(2));
        let (batches, summary) = drain(rx, handle).await;

        let summary = summary.unwrap();
        assert_eq!(summary.entries, 2);
        assert_eq!(summary.records, 5);

        let ids: Vec<Vec<&str>> = batches
            .iter()
            .map(|b| b.documents.iter().map(|d| d.id.as_str()).collect())
            .collect();
        assert_eq!(
            ids,
            vec![
                vec!["gtfs/agency/1", "gtfs/agency/2"],
                vec!["gtfs/stops/10", "gtfs/stops/11"],
                vec!["gtfs/stops/12"],
            ]
        );

        let stops = &batches[2].progress;
        assert_eq!(stops.step_name, "stops");
        assert_eq!((stops.step_number, stops.step_count), (3, 3));
        assert_eq!(stops.step_progress, stops.step_total);
    }

    #[tokio::test]
    async fn test_unknown_table_fails_before_its_rows() {
        let archive = build_archive(&[
            ArchiveItem::File("agency.txt", "agency_id\n1\n"),
            ArchiveItem::File("widgets.txt", "widget_id\n1\n"),
        ]);

        let (rx, handle) = spawn_producer(archive, "gtfs".to_string(), size(10));
        let (batches, result) = drain(rx, handle).await;

        assert_eq!(batches.len(), 1);
        assert!(batches[0].documents.iter().all(|d| d.id.starts_with("gtfs/agency/")));
        assert!(matches!(result, Err(ImportError::UnknownTable(ref t)) if t == "widgets"));
    }

    #[tokio::test]
    async fn test_parse_error_keeps_earlier_batches() {
        let archive = build_archive(&[ArchiveItem::File(
            "stops.txt",
            "stop_id,stop_name\n1,A\n2,B\n3\n",
        )]);

        let (rx, handle) = spawn_producer(archive, "gtfs".to_string(), size(1));
        let (batches, result) = drain(rx, handle).await;

        assert_eq!(batches.len(), 2);
        assert!(matches!(result, Err(ImportError::Parse { .. })));
    }

    #[tokio::test]
    async fn test_dropped_receiver_stops_producer() {
        let body: String = std::iter::once("stop_id\n".to_string())
            .chain((0..1000).map(|i| format!("{}\n", i)))
            .collect();
        let archive = build_archive(&[ArchiveItem::File("stops.txt", &body)]);

        let (rx, handle) = spawn_producer(archive, "gtfs".to_string(), size(1));
        drop(rx);

        assert!(matches!(handle.await.unwrap(), Err(ImportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_corrupt_archive() {
        let (rx, handle) = spawn_producer(b"PK\x03\x04garbage".to_vec(), "gtfs".to_string(), size(1));
        let (batches, result) = drain(rx, handle).await;

        assert!(batches.is_empty());
        assert!(matches!(result, Err(ImportError::Decode(_))));
    }
}
