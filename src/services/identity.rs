use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use super::ServiceError;
use crate::database::models::{Role, User};
use crate::database::{Store, StoreError};

/// Public details of an uploader
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub name: Option<String>,
    pub image: Option<String>,
}

/// Maps caller identities to users and applies provisioning events
#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn Store>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// `None` for unauthenticated callers and for identities not provisioned yet.
    pub async fn resolve_caller(&self, identity: Option<&str>) -> Result<Option<User>, ServiceError> {
        let Some(token_identifier) = identity else {
            return Ok(None);
        };
        let user = self.store.find_user_by_token(token_identifier).await?;
        if user.is_none() {
            debug!("No user provisioned for identity {}", token_identifier);
        }
        Ok(user)
    }

    /// Inserts a user without memberships. A re-delivered event refreshes the
    /// existing user instead of creating a second one.
    pub async fn create_user(&self, token_identifier: &str, name: &str, image: &str) -> Result<User, ServiceError> {
        if let Some(existing) = self.store.find_user_by_token(token_identifier).await? {
            self.store.update_user_profile(token_identifier, name, image).await?;
            debug!("User {} already provisioned, profile refreshed", token_identifier);
            return Ok(User {
                name: name.to_string(),
                image: image.to_string(),
                ..existing
            });
        }

        let user = User::new(token_identifier, name, image);
        match self.store.insert_user(&user).await {
            Ok(()) => {
                info!("Provisioned user {} ({})", user.id, token_identifier);
                Ok(user)
            }
            // lost a race against a concurrent delivery of the same event
            Err(StoreError::Conflict(_)) => {
                self.store.update_user_profile(token_identifier, name, image).await?;
                self.require_user(token_identifier).await
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update_user(&self, token_identifier: &str, name: &str, image: &str) -> Result<(), ServiceError> {
        if !self.store.update_user_profile(token_identifier, name, image).await? {
            return Err(ServiceError::UserNotProvisioned(token_identifier.to_string()));
        }
        Ok(())
    }

    /// Adds the membership, or replaces the role when the user already belongs to `org_id`.
    pub async fn add_org_id_to_user(&self, token_identifier: &str, org_id: &str, role: Role) -> Result<(), ServiceError> {
        let user = self.require_user(token_identifier).await?;
        self.store.upsert_membership(user.id, org_id, role).await?;
        info!("User {} joined org {} as {}", user.id, org_id, role);
        Ok(())
    }

    pub async fn update_role_in_org_for_user(
        &self,
        token_identifier: &str,
        org_id: &str,
        role: Role,
    ) -> Result<(), ServiceError> {
        let user = self.require_user(token_identifier).await?;
        if !self.store.update_membership_role(user.id, org_id, role).await? {
            return Err(ServiceError::MembershipNotFound {
                token_identifier: token_identifier.to_string(),
                org_id: org_id.to_string(),
            });
        }
        info!("User {} is now {} in org {}", user.id, role, org_id);
        Ok(())
    }

    pub async fn get_user_profile(&self, user_id: Uuid) -> Result<UserProfile, ServiceError> {
        let user = self.store.find_user_by_id(user_id).await?;
        Ok(UserProfile {
            name: user.as_ref().map(|u| u.name.clone()),
            image: user.map(|u| u.image),
        })
    }

    pub async fn get_me(&self, identity: Option<&str>) -> Result<Option<User>, ServiceError> {
        self.resolve_caller(identity).await
    }

    async fn require_user(&self, token_identifier: &str) -> Result<User, ServiceError> {
        self.store
            .find_user_by_token(token_identifier)
            .await?
            .ok_or_else(|| ServiceError::UserNotProvisioned(token_identifier.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;

    fn service() -> IdentityService {
        IdentityService::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn unauthenticated_caller_resolves_to_none() {
        let identity = service();
        assert!(identity.resolve_caller(None).await.unwrap().is_none());
        assert!(identity.resolve_caller(Some("nobody")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_user_is_idempotent() {
        let identity = service();
        let first = identity.create_user("issuer|u1", "Ada", "a.png").await.unwrap();
        let again = identity.create_user("issuer|u1", "Ada L.", "b.png").await.unwrap();
        assert_eq!(first.id, again.id);

        let me = identity.get_me(Some("issuer|u1")).await.unwrap().unwrap();
        assert_eq!(me.name, "Ada L.");
        assert!(me.memberships.is_empty());
    }

    #[tokio::test]
    async fn update_user_requires_existing_user() {
        let identity = service();
        let err = identity.update_user("issuer|ghost", "x", "y").await.unwrap_err();
        assert!(matches!(err, ServiceError::UserNotProvisioned(_)));
    }

    #[tokio::test]
    async fn role_update_targets_the_named_org() {
        let identity = service();
        identity.create_user("issuer|u1", "U1", "").await.unwrap();
        identity.add_org_id_to_user("issuer|u1", "orgA", Role::Member).await.unwrap();
        identity.add_org_id_to_user("issuer|u1", "orgB", Role::Member).await.unwrap();

        identity.update_role_in_org_for_user("issuer|u1", "orgB", Role::Admin).await.unwrap();

        let user = identity.get_me(Some("issuer|u1")).await.unwrap().unwrap();
        assert_eq!(user.role_in("orgA"), Some(Role::Member));
        assert_eq!(user.role_in("orgB"), Some(Role::Admin));

        let err = identity
            .update_role_in_org_for_user("issuer|u1", "orgC", Role::Admin)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::MembershipNotFound { .. }));
    }

    #[tokio::test]
    async fn repeated_membership_event_does_not_duplicate() {
        let identity = service();
        identity.create_user("issuer|u1", "U1", "").await.unwrap();
        identity.add_org_id_to_user("issuer|u1", "orgA", Role::Member).await.unwrap();
        identity.add_org_id_to_user("issuer|u1", "orgA", Role::Admin).await.unwrap();

        let user = identity.get_me(Some("issuer|u1")).await.unwrap().unwrap();
        assert_eq!(user.memberships.len(), 1);
        assert_eq!(user.role_in("orgA"), Some(Role::Admin));
    }

    #[tokio::test]
    async fn profile_of_unknown_user_is_empty() {
        let identity = service();
        assert_eq!(identity.get_user_profile(Uuid::new_v4()).await.unwrap(), UserProfile::default());

        let user = identity.create_user("issuer|u1", "U1", "u1.png").await.unwrap();
        let profile = identity.get_user_profile(user.id).await.unwrap();
        assert_eq!(profile.name.as_deref(), Some("U1"));
        assert_eq!(profile.image.as_deref(), Some("u1.png"));
    }
}
