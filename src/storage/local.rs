use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs;
use tracing::{debug, info};

use super::{base_url, checked, BlobError, BlobStore, UploadTicket};
use crate::database::models::BlobRef;

/// Blobs stored as flat files under one directory.
///
/// Uploads land in `root` through whatever serves `public_base_url/upload/`;
/// downloads are served from `public_base_url/blobs/`.
pub struct LocalBlobStore {
    root: PathBuf,
    base: url::Url,
}

impl LocalBlobStore {
    pub async fn open(root: impl Into<PathBuf>, public_base_url: &str) -> Result<Self, BlobError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!("Blob directory ready at {}", root.display());
        Ok(Self {
            root,
            base: base_url(public_base_url)?,
        })
    }

    fn path_for(&self, blob_ref: &BlobRef) -> Result<PathBuf, BlobError> {
        Ok(self.root.join(checked(blob_ref)?))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn generate_upload_url(&self) -> Result<UploadTicket, BlobError> {
        let blob_ref = BlobRef::generate();
        let upload_url = self.base.join(&format!("upload/{}", blob_ref))?.to_string();
        Ok(UploadTicket { blob_ref, upload_url })
    }

    async fn get_url(&self, blob_ref: &BlobRef) -> Result<Option<String>, BlobError> {
        if !self.exists(blob_ref).await? {
            return Ok(None);
        }
        Ok(Some(self.base.join(&format!("blobs/{}", blob_ref))?.to_string()))
    }

    async fn delete(&self, blob_ref: &BlobRef) -> Result<(), BlobError> {
        let path = self.path_for(blob_ref)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Blob {} already removed", blob_ref);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, blob_ref: &BlobRef) -> Result<bool, BlobError> {
        let path = self.path_for(blob_ref)?;
        Ok(fs::try_exists(&path).await?)
    }
}
