use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::access::{can_delete_file, has_access_to_file, has_access_to_org, require_caller};
use super::ServiceError;
use crate::database::models::{BlobRef, FileRecord, NewFile};
use crate::database::Store;
use crate::filter::FileFilter;
use crate::storage::{BlobError, BlobStore, UploadTicket};

/// File metadata scoped to organizations, plus the soft-delete transitions
#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn Store>,
    blobs: Arc<dyn BlobStore>,
    strict_blob_access: bool,
}

impl FileService {
    pub fn new(store: Arc<dyn Store>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            blobs,
            strict_blob_access: false,
        }
    }

    /// Only hand out blob URLs to callers with access to a file referencing the blob.
    pub fn with_strict_blob_access(mut self, strict: bool) -> Self {
        self.strict_blob_access = strict;
        self
    }

    pub async fn generate_upload_url(&self, identity: Option<&str>) -> Result<UploadTicket, ServiceError> {
        let user = require_caller(self.store.as_ref(), identity).await?;
        let ticket = self.blobs.generate_upload_url().await?;
        info!("Issued upload ticket {} to user {}", ticket.blob_ref, user.id);
        Ok(ticket)
    }

    pub async fn create_file(
        &self,
        identity: Option<&str>,
        org_id: &str,
        new_file: NewFile,
    ) -> Result<FileRecord, ServiceError> {
        require_caller(self.store.as_ref(), identity).await?;
        let access = has_access_to_org(self.store.as_ref(), identity, org_id)
            .await?
            .ok_or_else(|| {
                warn!("Rejected upload to org {}", org_id);
                ServiceError::access_denied("you do not have access to this org")
            })?;
        if !new_file.blob_ref.is_well_formed() {
            return Err(BlobError::InvalidRef(new_file.blob_ref.to_string()).into());
        }

        let file = FileRecord::new(new_file, org_id, access.user.id);
        self.store.insert_file(&file).await?;
        info!("User {} created file {} in org {}", access.user.id, file.id, org_id);
        Ok(file)
    }

    /// Callers without access to the organization get an empty list.
    pub async fn list_files(
        &self,
        identity: Option<&str>,
        org_id: &str,
        filter: &FileFilter,
    ) -> Result<Vec<FileRecord>, ServiceError> {
        let Some(access) = has_access_to_org(self.store.as_ref(), identity, org_id).await? else {
            return Ok(Vec::new());
        };

        let files = self.store.files_by_org(org_id).await?;
        let favorite_ids: HashSet<Uuid> = if filter.needs_favorites() {
            self.store
                .favorites_for(access.user.id, org_id)
                .await?
                .into_iter()
                .map(|f| f.file_id)
                .collect()
        } else {
            HashSet::new()
        };

        Ok(filter.apply(files, &favorite_ids))
    }

    pub async fn get_file_url(&self, identity: Option<&str>, blob_ref: &BlobRef) -> Result<Option<String>, ServiceError> {
        require_caller(self.store.as_ref(), identity).await?;

        if self.strict_blob_access {
            let mut allowed = false;
            for file in self.store.files_by_blob(blob_ref).await? {
                if has_access_to_org(self.store.as_ref(), identity, &file.org_id).await?.is_some() {
                    allowed = true;
                    break;
                }
            }
            if !allowed {
                warn!("Refused URL for blob {}", blob_ref);
                return Err(ServiceError::access_denied("you do not have access to this file"));
            }
        }

        Ok(self.blobs.get_url(blob_ref).await?)
    }

    pub async fn mark_for_deletion(&self, identity: Option<&str>, file_id: Uuid) -> Result<(), ServiceError> {
        self.set_marked(identity, file_id, true).await
    }

    pub async fn restore(&self, identity: Option<&str>, file_id: Uuid) -> Result<(), ServiceError> {
        self.set_marked(identity, file_id, false).await
    }

    async fn set_marked(&self, identity: Option<&str>, file_id: Uuid, marked: bool) -> Result<(), ServiceError> {
        require_caller(self.store.as_ref(), identity).await?;
        let access = has_access_to_file(self.store.as_ref(), identity, file_id)
            .await?
            .ok_or_else(|| ServiceError::access_denied("you do not have access to this file"))?;

        if !can_delete_file(&access.user, &access.file) {
            warn!("User {} may not delete or restore file {}", access.user.id, file_id);
            return Err(ServiceError::access_denied("you do not have permission to delete this file"));
        }

        // the row may have been purged since the access check
        if !self.store.set_marked_for_deletion(file_id, marked).await? {
            return Err(ServiceError::access_denied("you do not have access to this file"));
        }
        info!(
            "User {} {} file {}",
            access.user.id,
            if marked { "marked for deletion" } else { "restored" },
            file_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{FileType, Role, User};
    use crate::database::MemoryStore;
    use crate::storage::MemoryBlobStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        blobs: Arc<MemoryBlobStore>,
        files: FileService,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let blobs = Arc::new(MemoryBlobStore::new("http://localhost/files/").unwrap());
        let mut uploader = User::new("issuer|u1", "U1", "");
        uploader.upsert_membership("orgA", Role::Member);
        let mut admin = User::new("issuer|admin", "Admin", "");
        admin.upsert_membership("orgA", Role::Admin);
        let mut peer = User::new("issuer|peer", "Peer", "");
        peer.upsert_membership("orgA", Role::Member);
        let outsider = User::new("issuer|u2", "U2", "");
        for user in [&uploader, &admin, &peer, &outsider] {
            store.insert_user(user).await.unwrap();
        }
        let files = FileService::new(store.clone(), blobs.clone());
        Fixture { store, blobs, files }
    }

    fn csv(name: &str) -> NewFile {
        NewFile {
            name: name.to_string(),
            blob_ref: BlobRef::generate(),
            file_type: FileType::Csv,
        }
    }

    #[tokio::test]
    async fn create_requires_org_access() {
        let fx = fixture().await;
        let file = fx.files.create_file(Some("issuer|u1"), "orgA", csv("report.csv")).await.unwrap();
        assert!(!file.marked_for_deletion);

        let err = fx.files.create_file(Some("issuer|u2"), "orgA", csv("x.csv")).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
        let err = fx.files.create_file(None, "orgA", csv("x.csv")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthenticated));
    }

    #[tokio::test]
    async fn list_is_empty_without_access() {
        let fx = fixture().await;
        fx.files.create_file(Some("issuer|u1"), "orgA", csv("report.csv")).await.unwrap();

        let filter = FileFilter::default();
        assert_eq!(fx.files.list_files(Some("issuer|u1"), "orgA", &filter).await.unwrap().len(), 1);
        assert!(fx.files.list_files(Some("issuer|u2"), "orgA", &filter).await.unwrap().is_empty());
        assert!(fx.files.list_files(None, "orgA", &filter).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn only_uploader_or_admin_can_delete_and_restore() {
        let fx = fixture().await;
        let file = fx.files.create_file(Some("issuer|u1"), "orgA", csv("report.csv")).await.unwrap();

        let err = fx.files.mark_for_deletion(Some("issuer|peer"), file.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
        assert!(!fx.store.get_file(file.id).await.unwrap().unwrap().marked_for_deletion);

        fx.files.mark_for_deletion(Some("issuer|admin"), file.id).await.unwrap();
        // idempotent
        fx.files.mark_for_deletion(Some("issuer|u1"), file.id).await.unwrap();
        assert!(fx.store.get_file(file.id).await.unwrap().unwrap().marked_for_deletion);

        let err = fx.files.restore(Some("issuer|peer"), file.id).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
        fx.files.restore(Some("issuer|u1"), file.id).await.unwrap();
        assert!(!fx.store.get_file(file.id).await.unwrap().unwrap().marked_for_deletion);
    }

    #[tokio::test]
    async fn marked_files_move_between_listings() {
        let fx = fixture().await;
        let file = fx.files.create_file(Some("issuer|u1"), "orgA", csv("report.csv")).await.unwrap();
        fx.files.mark_for_deletion(Some("issuer|u1"), file.id).await.unwrap();

        let active = fx.files.list_files(Some("issuer|u1"), "orgA", &FileFilter::default()).await.unwrap();
        assert!(active.is_empty());
        let trash = FileFilter {
            deleted_only: true,
            ..Default::default()
        };
        let pending = fx.files.list_files(Some("issuer|u1"), "orgA", &trash).await.unwrap();
        assert_eq!(pending.iter().map(|f| f.id).collect::<Vec<_>>(), [file.id]);
    }

    #[tokio::test]
    async fn unknown_file_is_denied() {
        let fx = fixture().await;
        let err = fx.files.mark_for_deletion(Some("issuer|u1"), Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, ServiceError::AccessDenied(_)));
    }

    #[tokio::test]
    async fn file_url_needs_only_a_caller_unless_strict() {
        let fx = fixture().await;
        let ticket = fx.files.generate_upload_url(Some("issuer|u1")).await.unwrap();
        let new_file = NewFile {
            blob_ref: ticket.blob_ref.clone(),
            ..csv("report.csv")
        };
        fx.files.create_file(Some("issuer|u1"), "orgA", new_file).await.unwrap();
        assert!(fx.blobs.exists(&ticket.blob_ref).await.unwrap());

        assert!(fx.files.get_file_url(Some("issuer|u2"), &ticket.blob_ref).await.unwrap().is_some());
        assert!(matches!(
            fx.files.get_file_url(None, &ticket.blob_ref).await,
            Err(ServiceError::Unauthenticated)
        ));

        let strict = fx.files.clone().with_strict_blob_access(true);
        assert!(strict.get_file_url(Some("issuer|u1"), &ticket.blob_ref).await.unwrap().is_some());
        assert!(matches!(
            strict.get_file_url(Some("issuer|u2"), &ticket.blob_ref).await,
            Err(ServiceError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn upload_ticket_requires_a_provisioned_caller() {
        let fx = fixture().await;
        assert!(matches!(
            fx.files.generate_upload_url(Some("issuer|ghost")).await,
            Err(ServiceError::Unauthenticated)
        ));
        assert!(fx.files.generate_upload_url(Some("issuer|u2")).await.is_ok());
    }

    #[tokio::test]
    async fn writes_from_unprovisioned_token_are_unauthenticated() {
        let fx = fixture().await;
        let file = fx.files.create_file(Some("issuer|u1"), "orgA", csv("report.csv")).await.unwrap();

        let ghost = Some("issuer|ghost");
        assert!(matches!(
            fx.files.create_file(ghost, "orgA", csv("x.csv")).await,
            Err(ServiceError::Unauthenticated)
        ));
        assert!(matches!(
            fx.files.mark_for_deletion(ghost, file.id).await,
            Err(ServiceError::Unauthenticated)
        ));
        assert!(matches!(fx.files.restore(ghost, file.id).await, Err(ServiceError::Unauthenticated)));
    }
}
