//! Purge sweep for files marked for deletion.
//!
//! Each pass is independent and safe to repeat. A file restored while a pass
//! runs is left alone: its record is only removed while still marked, and the
//! blob is only removed after its record. Removing the record leaves the blob
//! on the store's orphan list, so a blob whose delete failed is retried by the
//! next pass.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{error, info};

use super::ServiceError;
use crate::database::models::{BlobRef, FileRecord};
use crate::database::Store;
use crate::storage::BlobStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub purged: usize,
    /// Restored between listing and removal
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Purged,
    Skipped,
    Failed,
}

async fn remove_blob(store: &dyn Store, blobs: &dyn BlobStore, blob_ref: &BlobRef) -> Outcome {
    if let Err(e) = blobs.delete(blob_ref).await {
        error!("Failed to delete blob {}, will retry next pass: {}", blob_ref, e);
        return Outcome::Failed;
    }
    match store.forget_orphaned_blob(blob_ref).await {
        Ok(()) => Outcome::Purged,
        Err(e) => {
            error!("Deleted blob {} but could not clear it from the orphan list: {}", blob_ref, e);
            Outcome::Failed
        }
    }
}

async fn purge_one(store: &dyn Store, blobs: &dyn BlobStore, candidate: FileRecord) -> Outcome {
    match store.delete_file_if_marked(candidate.id).await {
        Ok(Some(removed)) => remove_blob(store, blobs, &removed.blob_ref).await,
        Ok(None) => Outcome::Skipped,
        Err(e) => {
            error!("Failed to purge file {}: {}", candidate.id, e);
            Outcome::Failed
        }
    }
}

/// Removes every file still marked for deletion, its favorites and its blob.
/// Blobs left behind by earlier passes are retried first. Failures of one
/// file are logged and do not stop the others.
pub async fn purge_marked_files(store: &dyn Store, blobs: &dyn BlobStore) -> Result<PurgeReport, ServiceError> {
    let orphans = store.orphaned_blobs().await?;
    let candidates = store.files_marked_for_deletion().await?;
    if orphans.is_empty() && candidates.is_empty() {
        return Ok(PurgeReport::default());
    }

    let mut outcomes = join_all(orphans.iter().map(|blob_ref| remove_blob(store, blobs, blob_ref))).await;
    outcomes.extend(join_all(candidates.into_iter().map(|file| purge_one(store, blobs, file))).await);

    let mut report = PurgeReport::default();
    for outcome in outcomes {
        match outcome {
            Outcome::Purged => report.purged += 1,
            Outcome::Skipped => report.skipped += 1,
            Outcome::Failed => report.failed += 1,
        }
    }
    info!(
        "Purge sweep finished: {} purged, {} skipped, {} failed",
        report.purged, report.skipped, report.failed
    );
    Ok(report)
}

/// Runs the sweep on a fixed interval until the task is aborted.
pub fn spawn_purge_task(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>, every: Duration) -> JoinHandle<()> {
    info!("Purge sweep scheduled every {:?}", every);
    tokio::spawn(async move {
        let mut interval = time::interval(every);
        loop {
            interval.tick().await;
            if let Err(e) = purge_marked_files(store.as_ref(), blobs.as_ref()).await {
                error!("Purge sweep failed: {}", e);
            }
        }
    })
}
