use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::{base_url, checked, BlobError, BlobStore, UploadTicket};
use crate::database::models::BlobRef;

/// Blob store that only tracks which references exist.
///
/// A ticket reserves its reference right away, standing in for the client
/// upload that would follow it.
#[derive(Clone)]
pub struct MemoryBlobStore {
    base: url::Url,
    blobs: Arc<RwLock<HashSet<BlobRef>>>,
}

impl MemoryBlobStore {
    pub fn new(public_base_url: &str) -> Result<Self, BlobError> {
        Ok(Self {
            base: base_url(public_base_url)?,
            blobs: Arc::new(RwLock::new(HashSet::new())),
        })
    }

    pub async fn insert(&self, blob_ref: BlobRef) {
        self.blobs.write().await.insert(blob_ref);
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn generate_upload_url(&self) -> Result<UploadTicket, BlobError> {
        let blob_ref = BlobRef::generate();
        let upload_url = self.base.join(&format!("upload/{}", blob_ref))?.to_string();
        self.blobs.write().await.insert(blob_ref.clone());
        Ok(UploadTicket { blob_ref, upload_url })
    }

    async fn get_url(&self, blob_ref: &BlobRef) -> Result<Option<String>, BlobError> {
        let name = checked(blob_ref)?;
        if !self.blobs.read().await.contains(blob_ref) {
            return Ok(None);
        }
        Ok(Some(self.base.join(&format!("blobs/{}", name))?.to_string()))
    }

    async fn delete(&self, blob_ref: &BlobRef) -> Result<(), BlobError> {
        self.blobs.write().await.remove(blob_ref);
        Ok(())
    }

    async fn exists(&self, blob_ref: &BlobRef) -> Result<bool, BlobError> {
        Ok(self.blobs.read().await.contains(blob_ref))
    }
}
