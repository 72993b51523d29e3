use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use super::models::{BlobRef, Favorite, FileRecord, Role, User};

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Persistence surface for users, files and favorites.
///
/// Every method is a single logical storage operation. Methods documented as
/// atomic must stay atomic with respect to concurrent callers.
#[async_trait]
pub trait Store: Send + Sync {
    async fn health_check(&self) -> Result<(), StoreError>;

    async fn find_user_by_token(&self, token_identifier: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    /// Fails with `Conflict` when the token identifier is already taken.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    /// Returns false when no user has this token identifier.
    async fn update_user_profile(&self, token_identifier: &str, name: &str, image: &str) -> Result<bool, StoreError>;

    /// Adds the membership or replaces the role of the existing one.
    async fn upsert_membership(&self, user_id: Uuid, org_id: &str, role: Role) -> Result<(), StoreError>;

    /// Updates the role of the membership for `org_id` only.
    /// Returns false when the user has no membership in that organization.
    async fn update_membership_role(&self, user_id: Uuid, org_id: &str, role: Role) -> Result<bool, StoreError>;

    async fn insert_file(&self, file: &FileRecord) -> Result<(), StoreError>;

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError>;

    /// Files of one organization in creation order.
    async fn files_by_org(&self, org_id: &str) -> Result<Vec<FileRecord>, StoreError>;

    async fn files_by_blob(&self, blob_ref: &BlobRef) -> Result<Vec<FileRecord>, StoreError>;

    async fn files_marked_for_deletion(&self) -> Result<Vec<FileRecord>, StoreError>;

    /// Returns false when the file does not exist.
    async fn set_marked_for_deletion(&self, id: Uuid, marked: bool) -> Result<bool, StoreError>;

    /// Atomically deletes the file and its favorites if, and only if, it is
    /// still marked for deletion. Returns the deleted record.
    ///
    /// The blob of a deleted file is recorded as orphaned in the same
    /// operation and stays listed until `forget_orphaned_blob`.
    async fn delete_file_if_marked(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError>;

    /// Blobs whose file record is gone but whose removal has not been confirmed.
    async fn orphaned_blobs(&self) -> Result<Vec<BlobRef>, StoreError>;

    async fn forget_orphaned_blob(&self, blob_ref: &BlobRef) -> Result<(), StoreError>;

    /// Atomic toggle keyed by (user, file). Returns true when the favorite now exists.
    async fn toggle_favorite(&self, favorite: &Favorite) -> Result<bool, StoreError>;

    async fn favorites_for(&self, user_id: Uuid, org_id: &str) -> Result<Vec<Favorite>, StoreError>;
}
