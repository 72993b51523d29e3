pub mod access;
pub mod favorites;
pub mod files;
pub mod identity;
pub mod sweep;

use thiserror::Error;

use crate::database::StoreError;
use crate::storage::BlobError;

pub use access::{can_delete_file, has_access_to_file, has_access_to_org, AccessVia, FileAccess, OrgAccess};
pub use favorites::FavoriteService;
pub use files::FileService;
pub use identity::{IdentityService, UserProfile};
pub use sweep::{purge_marked_files, spawn_purge_task, PurgeReport};

/// Failures of the file-sharing operations
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("you must be logged in")]
    Unauthenticated,

    #[error("{0}")]
    AccessDenied(String),

    #[error("no user with token '{0}' found")]
    UserNotProvisioned(String),

    #[error("user '{token_identifier}' has no membership in org '{org_id}'")]
    MembershipNotFound { token_identifier: String, org_id: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Blob(#[from] BlobError),
}

impl ServiceError {
    pub fn access_denied(message: impl Into<String>) -> Self {
        ServiceError::AccessDenied(message.into())
    }
}
