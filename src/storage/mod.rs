//! Blob storage behind an opaque [`BlobRef`].
//!
//! Bytes never pass through this service. The store hands out upload
//! tickets, resolves download URLs and removes blobs during the purge sweep.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::database::models::BlobRef;

pub mod local;
pub mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Invalid blob reference: {0}")]
    InvalidRef(String),

    #[error("Invalid blob URL: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Where a client should send the bytes of a new upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTicket {
    pub blob_ref: BlobRef,
    pub upload_url: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn generate_upload_url(&self) -> Result<UploadTicket, BlobError>;

    /// Download URL, or `None` when no such blob is stored.
    async fn get_url(&self, blob_ref: &BlobRef) -> Result<Option<String>, BlobError>;

    /// Removing a blob that is already gone succeeds.
    async fn delete(&self, blob_ref: &BlobRef) -> Result<(), BlobError>;

    async fn exists(&self, blob_ref: &BlobRef) -> Result<bool, BlobError>;
}

pub(crate) fn checked(blob_ref: &BlobRef) -> Result<&str, BlobError> {
    if blob_ref.is_well_formed() {
        Ok(blob_ref.as_str())
    } else {
        Err(BlobError::InvalidRef(blob_ref.to_string()))
    }
}

/// Parses a base URL so that `join` appends to its path instead of replacing the last segment.
pub(crate) fn base_url(raw: &str) -> Result<url::Url, BlobError> {
    let mut base = url::Url::parse(raw)?;
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    Ok(base)
}
