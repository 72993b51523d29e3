//! Access decisions for organizations and files.
//!
//! Access is always derived from the caller's current memberships; nothing is
//! cached between requests.

use tracing::debug;
use uuid::Uuid;

use super::ServiceError;
use crate::database::models::{FileRecord, Role, User};
use crate::database::Store;

/// Why a caller was let into an organization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessVia {
    Membership(Role),
    /// The organization id is part of the caller's own identity token, which
    /// is how personal (single-user) workspaces are addressed.
    PersonalNamespace,
}

#[derive(Debug, Clone)]
pub struct OrgAccess {
    pub user: User,
    pub via: AccessVia,
}

#[derive(Debug, Clone)]
pub struct FileAccess {
    pub user: User,
    pub file: FileRecord,
}

/// Membership is checked by organization id first; the personal namespace
/// rule only applies to non-empty ids.
pub fn access_via(user: &User, org_id: &str) -> Option<AccessVia> {
    if let Some(role) = user.role_in(org_id) {
        return Some(AccessVia::Membership(role));
    }
    if !org_id.is_empty() && user.token_identifier.contains(org_id) {
        return Some(AccessVia::PersonalNamespace);
    }
    None
}

/// Resolves the caller for write paths. A missing token and a token with no
/// provisioned user are both unauthenticated.
pub async fn require_caller(store: &dyn Store, identity: Option<&str>) -> Result<User, ServiceError> {
    let token_identifier = identity.ok_or(ServiceError::Unauthenticated)?;
    store
        .find_user_by_token(token_identifier)
        .await?
        .ok_or(ServiceError::Unauthenticated)
}

pub async fn has_access_to_org(
    store: &dyn Store,
    identity: Option<&str>,
    org_id: &str,
) -> Result<Option<OrgAccess>, ServiceError> {
    let Some(token_identifier) = identity else {
        return Ok(None);
    };
    let Some(user) = store.find_user_by_token(token_identifier).await? else {
        debug!("Denied org {}: identity {} not provisioned", org_id, token_identifier);
        return Ok(None);
    };

    match access_via(&user, org_id) {
        Some(via) => {
            debug!("User {} granted org {} via {:?}", user.id, org_id, via);
            Ok(Some(OrgAccess { user, via }))
        }
        None => {
            debug!("User {} has no access to org {}", user.id, org_id);
            Ok(None)
        }
    }
}

pub async fn has_access_to_file(
    store: &dyn Store,
    identity: Option<&str>,
    file_id: Uuid,
) -> Result<Option<FileAccess>, ServiceError> {
    let Some(file) = store.get_file(file_id).await? else {
        debug!("Denied file {}: not found", file_id);
        return Ok(None);
    };
    Ok(has_access_to_org(store, identity, &file.org_id)
        .await?
        .map(|access| FileAccess { user: access.user, file }))
}

/// Uploader, or admin of the file's organization. Gates delete and restore.
pub fn can_delete_file(user: &User, file: &FileRecord) -> bool {
    user.id == file.user_id || user.role_in(&file.org_id) == Some(Role::Admin)
}
