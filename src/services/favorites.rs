use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::access::{has_access_to_file, has_access_to_org, require_caller};
use super::ServiceError;
use crate::database::models::Favorite;
use crate::database::Store;

#[derive(Clone)]
pub struct FavoriteService {
    store: Arc<dyn Store>,
}

impl FavoriteService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Returns true when the file is now a favorite of the caller.
    pub async fn toggle_favorite(&self, identity: Option<&str>, file_id: Uuid) -> Result<bool, ServiceError> {
        require_caller(self.store.as_ref(), identity).await?;
        let access = has_access_to_file(self.store.as_ref(), identity, file_id)
            .await?
            .ok_or_else(|| {
                warn!("Rejected favorite toggle on file {}", file_id);
                ServiceError::access_denied("you do not have access to this file")
            })?;

        let favorite = Favorite::new(access.user.id, access.file.org_id.clone(), file_id);
        let favorited = self.store.toggle_favorite(&favorite).await?;
        info!(
            "User {} {} file {}",
            access.user.id,
            if favorited { "favorited" } else { "unfavorited" },
            file_id
        );
        Ok(favorited)
    }

    /// Callers without access to the organization get an empty list.
    pub async fn list_favorites(&self, identity: Option<&str>, org_id: &str) -> Result<Vec<Favorite>, ServiceError> {
        match has_access_to_org(self.store.as_ref(), identity, org_id).await? {
            Some(access) => Ok(self.store.favorites_for(access.user.id, org_id).await?),
            None => Ok(Vec::new()),
        }
    }
}
