use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{BlobRef, Favorite, FileRecord, Role, User};
use super::store::{Store, StoreError};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    users_by_token: HashMap<String, Uuid>,
    files: HashMap<Uuid, FileRecord>,
    /// Favorites keyed by (user, file); the organization lives on the record
    favorites: HashMap<(Uuid, Uuid), Favorite>,
    /// Blobs of purged files, oldest first
    orphaned_blobs: Vec<BlobRef>,
}

/// In-process store used by tests and local development.
/// All mutations take the single write lock, which makes each one atomic.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn in_creation_order(mut files: Vec<FileRecord>) -> Vec<FileRecord> {
    files.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    files
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn find_user_by_token(&self, token_identifier: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users_by_token
            .get(token_identifier)
            .and_then(|id| tables.users.get(id))
            .cloned())
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users_by_token.contains_key(&user.token_identifier) {
            return Err(StoreError::Conflict(format!(
                "user with token '{}' already exists",
                user.token_identifier
            )));
        }
        tables.users_by_token.insert(user.token_identifier.clone(), user.id);
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update_user_profile(&self, token_identifier: &str, name: &str, image: &str) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let Some(id) = tables.users_by_token.get(token_identifier).copied() else {
            return Ok(false);
        };
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.name = name.to_string();
                user.image = image.to_string();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_membership(&self, user_id: Uuid, org_id: &str, role: Role) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StoreError::Conflict(format!("user {} does not exist", user_id)))?;
        user.upsert_membership(org_id, role);
        Ok(())
    }

    async fn update_membership_role(&self, user_id: Uuid, org_id: &str, role: Role) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .users
            .get_mut(&user_id)
            .map(|user| user.set_role(org_id, role))
            .unwrap_or(false))
    }

    async fn insert_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.files.contains_key(&file.id) {
            return Err(StoreError::Conflict(format!("file {} already exists", file.id)));
        }
        tables.files.insert(file.id, file.clone());
        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError> {
        Ok(self.tables.read().await.files.get(&id).cloned())
    }

    async fn files_by_org(&self, org_id: &str) -> Result<Vec<FileRecord>, StoreError> {
        let tables = self.tables.read().await;
        let files = tables.files.values().filter(|f| f.org_id == org_id).cloned().collect();
        Ok(in_creation_order(files))
    }

    async fn files_by_blob(&self, blob_ref: &BlobRef) -> Result<Vec<FileRecord>, StoreError> {
        let tables = self.tables.read().await;
        let files = tables.files.values().filter(|f| &f.blob_ref == blob_ref).cloned().collect();
        Ok(in_creation_order(files))
    }

    async fn files_marked_for_deletion(&self) -> Result<Vec<FileRecord>, StoreError> {
        let tables = self.tables.read().await;
        let files = tables.files.values().filter(|f| f.marked_for_deletion).cloned().collect();
        Ok(in_creation_order(files))
    }

    async fn set_marked_for_deletion(&self, id: Uuid, marked: bool) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        match tables.files.get_mut(&id) {
            Some(file) => {
                file.marked_for_deletion = marked;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_file_if_marked(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError> {
        let mut tables = self.tables.write().await;
        let still_marked = tables.files.get(&id).map(|f| f.marked_for_deletion).unwrap_or(false);
        if !still_marked {
            return Ok(None);
        }
        tables.favorites.retain(|(_, file_id), _| *file_id != id);
        let removed = tables.files.remove(&id);
        if let Some(file) = &removed {
            if !tables.orphaned_blobs.contains(&file.blob_ref) {
                tables.orphaned_blobs.push(file.blob_ref.clone());
            }
        }
        Ok(removed)
    }

    async fn orphaned_blobs(&self) -> Result<Vec<BlobRef>, StoreError> {
        Ok(self.tables.read().await.orphaned_blobs.clone())
    }

    async fn forget_orphaned_blob(&self, blob_ref: &BlobRef) -> Result<(), StoreError> {
        self.tables.write().await.orphaned_blobs.retain(|b| b != blob_ref);
        Ok(())
    }

    async fn toggle_favorite(&self, favorite: &Favorite) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let key = (favorite.user_id, favorite.file_id);
        if tables.favorites.remove(&key).is_some() {
            Ok(false)
        } else {
            tables.favorites.insert(key, favorite.clone());
            Ok(true)
        }
    }

    async fn favorites_for(&self, user_id: Uuid, org_id: &str) -> Result<Vec<Favorite>, StoreError> {
        let tables = self.tables.read().await;
        let mut favorites: Vec<Favorite> = tables
            .favorites
            .values()
            .filter(|f| f.user_id == user_id && f.org_id == org_id)
            .cloned()
            .collect();
        favorites.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.file_id.cmp(&b.file_id)));
        Ok(favorites)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{FileType, NewFile};

    fn file(org: &str, user: Uuid, name: &str) -> FileRecord {
        FileRecord::new(
            NewFile {
                name: name.to_string(),
                blob_ref: BlobRef::generate(),
                file_type: FileType::Csv,
            },
            org,
            user,
        )
    }

    #[tokio::test]
    async fn rejects_duplicate_token() {
        let store = MemoryStore::new();
        store.insert_user(&User::new("t|1", "a", "")).await.unwrap();
        let err = store.insert_user(&User::new("t|1", "b", "")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_if_marked_skips_restored_file() {
        let store = MemoryStore::new();
        let f = file("orgA", Uuid::new_v4(), "a.csv");
        store.insert_file(&f).await.unwrap();

        assert!(store.delete_file_if_marked(f.id).await.unwrap().is_none());
        store.set_marked_for_deletion(f.id, true).await.unwrap();
        store.set_marked_for_deletion(f.id, false).await.unwrap();
        assert!(store.delete_file_if_marked(f.id).await.unwrap().is_none());
        assert!(store.get_file(f.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn purge_removes_favorites_of_file() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let f = file("orgA", user, "a.csv");
        store.insert_file(&f).await.unwrap();
        assert!(store.toggle_favorite(&Favorite::new(user, "orgA", f.id)).await.unwrap());

        store.set_marked_for_deletion(f.id, true).await.unwrap();
        let removed = store.delete_file_if_marked(f.id).await.unwrap();
        assert_eq!(removed.map(|r| r.id), Some(f.id));
        assert!(store.favorites_for(user, "orgA").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purged_blob_stays_orphaned_until_forgotten() {
        let store = MemoryStore::new();
        let f = file("orgA", Uuid::new_v4(), "a.csv");
        store.insert_file(&f).await.unwrap();
        assert!(store.orphaned_blobs().await.unwrap().is_empty());

        store.set_marked_for_deletion(f.id, true).await.unwrap();
        store.delete_file_if_marked(f.id).await.unwrap();
        assert_eq!(store.orphaned_blobs().await.unwrap(), vec![f.blob_ref.clone()]);

        store.forget_orphaned_blob(&f.blob_ref).await.unwrap();
        assert!(store.orphaned_blobs().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_toggles_never_duplicate() {
        let store = MemoryStore::new();
        let user = Uuid::new_v4();
        let file_id = Uuid::new_v4();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.toggle_favorite(&Favorite::new(user, "orgA", file_id)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // an even number of toggles lands back on "not favorited"
        assert!(store.favorites_for(user, "orgA").await.unwrap().is_empty());
    }
}
