//! Import orchestrator
//!
//! Drives one run through its phases:
//!
//! ```text
//! Deciding ──(up to date)──────────────────────────────────────────────┐
//!    │                                                                  v
//!    └─> Wiping -> Fetching -> StreamingEntries -> Writing* -> RecordingMetadata -> Done
//! ```
//!
//! A failure in any phase ends the run in `Failed` and propagates the error.
//! Documents written before the failure stay in the store, but sync
//! metadata is only recorded after every batch has been written, so the
//! next run treats an interrupted import as never synced. Cancellation is
//! checked at every suspension point and behaves like a failure.

use crate::config::ImportOptions;
use crate::error::{ImportError, Result};
use crate::pipeline;
use crate::progress::{ProgressObserver, ProgressReporter};
use crate::store::DocumentStore;
use crate::sync::{self, SyncDecision, SyncPolicy};
use crate::transfer::{transfer_for, HttpTransferConfig, Transfer};
use crate::wipe;
use chrono::{DateTime, Utc};
use gtfs_common::checksum::sha256_hex;
use gtfs_common::types::{Source, SyncMetadata};
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument};

/// Where a run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportPhase {
    Deciding,
    Wiping,
    Fetching,
    StreamingEntries,
    Writing,
    RecordingMetadata,
    Done,
    Failed,
}

impl ImportPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportPhase::Deciding => "deciding",
            ImportPhase::Wiping => "wiping",
            ImportPhase::Fetching => "fetching",
            ImportPhase::StreamingEntries => "streaming_entries",
            ImportPhase::Writing => "writing",
            ImportPhase::RecordingMetadata => "recording_metadata",
            ImportPhase::Done => "done",
            ImportPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ImportPhase::Done | ImportPhase::Failed)
    }
}

impl std::fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub decision: SyncDecision,
    pub documents_deleted: u64,
    pub documents_written: u64,
    pub entries_imported: usize,
    /// Modification time of the imported archive; `None` when skipped or unknown
    pub last_updated: Option<DateTime<Utc>>,
}

impl ImportReport {
    fn skipped(decision: SyncDecision) -> Self {
        Self {
            decision,
            documents_deleted: 0,
            documents_written: 0,
            entries_imported: 0,
            last_updated: None,
        }
    }

    /// Whether the run found the store up to date and did nothing
    pub fn is_skipped(&self) -> bool {
        !self.decision.is_required()
    }

    pub fn summary(&self) -> String {
        if self.is_skipped() {
            "Import skipped - feed is up to date".to_string()
        } else {
            format!(
                "Imported {} documents from {} entries ({}, {} stale documents removed)",
                self.documents_written,
                self.entries_imported,
                self.decision,
                self.documents_deleted
            )
        }
    }
}

/// Handle to an imported feed: the store and the namespace holding it
pub struct ImportedFeed {
    pub store: Arc<dyn DocumentStore>,
    pub namespace: String,
    pub report: ImportReport,
}

impl std::fmt::Debug for ImportedFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportedFeed")
            .field("namespace", &self.namespace)
            .field("report", &self.report)
            .finish_non_exhaustive()
    }
}

/// One import run, configured and ready to start
pub struct Importer {
    source: Source,
    namespace: String,
    policy: SyncPolicy,
    batch_size: NonZeroUsize,
    store: Arc<dyn DocumentStore>,
    transfer: Arc<dyn Transfer>,
    cancel: CancellationToken,
    progress: ProgressReporter,
    phase: ImportPhase,
}

impl Importer {
    /// Validate options and resolve the store and transfer provider
    pub fn new(source: Source, options: ImportOptions) -> Result<Self> {
        options.validate()?;

        let batch_size = NonZeroUsize::new(options.batch_size)
            .ok_or_else(|| ImportError::Config("Batch size must be greater than 0".to_string()))?;
        let store = options.store.open()?;
        let transfer = match options.transfer {
            Some(transfer) => transfer,
            None => transfer_for(&source, HttpTransferConfig::from_env()?)?,
        };

        Ok(Self {
            source,
            namespace: options.namespace,
            policy: SyncPolicy {
                auto_update: options.auto_update,
                force: options.wipe_existing,
            },
            batch_size,
            store,
            transfer,
            cancel: options.cancel.unwrap_or_default(),
            progress: ProgressReporter::silent(),
            phase: ImportPhase::Deciding,
        })
    }

    pub fn with_observer(mut self, observer: impl ProgressObserver + 'static) -> Self {
        self.progress = ProgressReporter::new(Arc::new(observer));
        self
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    /// Run to completion
    #[instrument(skip_all, fields(url = %self.source, namespace = %self.namespace))]
    pub async fn run(mut self) -> Result<ImportedFeed> {
        let started = Instant::now();
        info!(
            auto_update = self.policy.auto_update,
            force = self.policy.force,
            batch_size = self.batch_size.get(),
            "Starting import"
        );

        match self.execute().await {
            Ok(report) => {
                info!(
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "{}",
                    report.summary()
                );
                Ok(ImportedFeed {
                    store: self.store,
                    namespace: self.namespace,
                    report,
                })
            },
            Err(e) => {
                let failed_in = self.phase;
                self.enter(ImportPhase::Failed);
                error!(phase = %failed_in, kind = e.kind(), error = %e, "Import failed");
                Err(e)
            },
        }
    }

    fn enter(&mut self, phase: ImportPhase) {
        if self.phase != phase {
            debug!(from = %self.phase, to = %phase, "Import phase changed");
            self.phase = phase;
        }
    }

    async fn execute(&mut self) -> Result<ImportReport> {
        self.enter(ImportPhase::Deciding);
        let decision = until_cancelled(
            &self.cancel,
            sync::decide(
                self.store.as_ref(),
                self.transfer.as_ref(),
                &self.source,
                &self.namespace,
                self.policy,
            ),
        )
        .await?;

        if !decision.is_required() {
            self.enter(ImportPhase::Done);
            return Ok(ImportReport::skipped(decision));
        }

        self.enter(ImportPhase::Wiping);
        let documents_deleted = until_cancelled(
            &self.cancel,
            wipe::wipe_namespace(
                self.store.as_ref(),
                &self.namespace,
                self.batch_size,
                &self.progress,
            ),
        )
        .await?;

        self.enter(ImportPhase::Fetching);
        let fetched = until_cancelled(&self.cancel, self.transfer.fetch_all(&self.source)).await?;
        let archive_sha256 = sha256_hex(&fetched.bytes);
        let last_updated = fetched.last_modified;

        self.enter(ImportPhase::StreamingEntries);
        let (mut batches, producer) =
            pipeline::spawn_producer(fetched.bytes, self.namespace.clone(), self.batch_size);

        let mut documents_written: u64 = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(ImportError::Cancelled),
                batch = batches.recv() => batch,
            };
            let Some(batch) = next else {
                break;
            };

            self.enter(ImportPhase::Writing);
            let count = batch.documents.len() as u64;
            let store = self.store.as_ref();
            until_cancelled(&self.cancel, async {
                store
                    .bulk_put(batch.documents)
                    .await
                    .map_err(ImportError::StorageWrite)
            })
            .await?;

            documents_written += count;
            self.progress.report(batch.progress);
        }

        let summary = producer.await??;

        self.enter(ImportPhase::RecordingMetadata);
        let metadata = SyncMetadata {
            last_updated,
            url: self.source.as_str().to_string(),
            archive_sha256: Some(archive_sha256),
            document_count: documents_written,
            synced_at: Some(Utc::now()),
        };
        until_cancelled(
            &self.cancel,
            sync::record_metadata(self.store.as_ref(), &self.namespace, &metadata),
        )
        .await?;

        self.enter(ImportPhase::Done);
        Ok(ImportReport {
            decision,
            documents_deleted,
            documents_written,
            entries_imported: summary.entries,
            last_updated,
        })
    }
}

/// Await `fut` unless the token fires first
async fn until_cancelled<T>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ImportError::Cancelled),
        result = fut => result,
    }
}

/// Import `source` according to `options`, reporting progress to `observer`
///
/// # Example
///
/// ```no_run
/// use gtfs_common::types::Source;
/// use gtfs_ingest::{initialize, ImportOptions, ProgressSnapshot};
///
/// # async fn run() -> gtfs_ingest::Result<()> {
/// let source = Source::parse("https://www.itsmarta.com/google_transit_feed/google_transit.zip")
///     .map_err(|e| gtfs_ingest::ImportError::Config(e.to_string()))?;
/// let options = ImportOptions::new().with_auto_update(true);
///
/// let feed = initialize(source, options, |p: &ProgressSnapshot| {
///     println!("{} {:.0}%", p.step_name, p.step_percent * 100.0);
/// })
/// .await?;
/// println!("{}", feed.report.summary());
/// # Ok(())
/// # }
/// ```
pub async fn initialize(
    source: Source,
    options: ImportOptions,
    observer: impl ProgressObserver + 'static,
) -> Result<ImportedFeed> {
    Importer::new(source, options)?.with_observer(observer).run().await
}
