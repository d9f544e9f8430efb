//! Sync Decision and sync metadata persistence
//!
//! Decides once per run whether the feed has to be (re)imported:
//!
//! | stored metadata | force | auto-update | probe            | decision                 |
//! |-----------------|-------|-------------|------------------|--------------------------|
//! | any             | yes   | any         | not run          | required (forced)        |
//! | absent          | no    | any         | not run          | required (no metadata)   |
//! | present         | no    | off         | not run          | not required             |
//! | present         | no    | on          | newer than store | required (remote newer)  |
//! | present         | no    | on          | otherwise        | not required             |
//!
//! A missing metadata record is the only storage error treated as an
//! answer; every other read failure aborts the decision.

use crate::error::{ImportError, Result};
use crate::store::{Document, DocumentStore};
use crate::transfer::Transfer;
use gtfs_common::types::{Source, SyncMetadata};
use tracing::{debug, info};

/// Why a sync has to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    /// The caller asked for a wipe and full resync
    Forced,
    /// The source has never been synced into this namespace
    NoMetadata,
    /// The probe reported a newer archive than the one imported
    RemoteNewer,
}

impl SyncReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncReason::Forced => "forced",
            SyncReason::NoMetadata => "no_metadata",
            SyncReason::RemoteNewer => "remote_newer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    Required(SyncReason),
    NotRequired,
}

impl SyncDecision {
    pub fn is_required(&self) -> bool {
        matches!(self, SyncDecision::Required(_))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncDecision::Required(reason) => reason.as_str(),
            SyncDecision::NotRequired => "up_to_date",
        }
    }
}

impl std::fmt::Display for SyncDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncDecision::Required(reason) => write!(f, "sync required ({})", reason.as_str()),
            SyncDecision::NotRequired => f.write_str("up to date"),
        }
    }
}

/// Inputs of the decision besides stored state
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncPolicy {
    pub auto_update: bool,
    pub force: bool,
}

/// Stored metadata for `source`, or `None` if it was never synced
pub async fn load_metadata(
    store: &dyn DocumentStore,
    namespace: &str,
    source: &Source,
) -> Result<Option<SyncMetadata>> {
    let id = SyncMetadata::document_id(namespace, source.as_str());
    match store.get(&id).await {
        Ok(document) => SyncMetadata::from_fields(document.fields)
            .map(Some)
            .map_err(|e| {
                ImportError::MetadataRead(crate::store::StoreError::Corrupt {
                    id,
                    reason: e.to_string(),
                })
            }),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(ImportError::MetadataRead(e)),
    }
}

/// Persist metadata after a completed sync
pub async fn record_metadata(
    store: &dyn DocumentStore,
    namespace: &str,
    metadata: &SyncMetadata,
) -> Result<()> {
    let id = SyncMetadata::document_id(namespace, &metadata.url);
    let fields = metadata.to_fields().map_err(|e| {
        ImportError::StorageWrite(crate::store::StoreError::Backend(e.to_string()))
    })?;

    store
        .put(Document::new(id, fields))
        .await
        .map_err(ImportError::StorageWrite)
}

/// Evaluate the decision for one run
pub async fn decide(
    store: &dyn DocumentStore,
    transfer: &dyn Transfer,
    source: &Source,
    namespace: &str,
    policy: SyncPolicy,
) -> Result<SyncDecision> {
    if policy.force {
        info!(url = %source, "Full resync forced");
        return Ok(SyncDecision::Required(SyncReason::Forced));
    }

    let Some(stored) = load_metadata(store, namespace, source).await? else {
        info!(url = %source, namespace, "No sync metadata, import required");
        return Ok(SyncDecision::Required(SyncReason::NoMetadata));
    };

    if !policy.auto_update {
        debug!(url = %source, "Metadata present and auto-update disabled");
        return Ok(SyncDecision::NotRequired);
    }

    let remote = transfer.fetch_last_modified(source).await?;
    let decision = if stored.is_stale(remote) {
        SyncDecision::Required(SyncReason::RemoteNewer)
    } else {
        SyncDecision::NotRequired
    };

    info!(
        url = %source,
        stored = ?stored.last_updated,
        remote = ?remote,
        decision = decision.as_str(),
        "Probed source freshness"
    );
    Ok(decision)
}
