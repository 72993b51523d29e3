use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use super::models::{BlobRef, Favorite, FileRecord, Membership, Role, User};
use super::store::{Store, StoreError};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS users (
        id UUID PRIMARY KEY,
        token_identifier TEXT NOT NULL UNIQUE,
        name TEXT NOT NULL DEFAULT '',
        image TEXT NOT NULL DEFAULT '',
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS memberships (
        user_id UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        org_id TEXT NOT NULL,
        role TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (user_id, org_id)
    )",
    "CREATE TABLE IF NOT EXISTS files (
        id UUID PRIMARY KEY,
        name TEXT NOT NULL,
        org_id TEXT NOT NULL,
        user_id UUID NOT NULL,
        file_type TEXT NOT NULL,
        blob_ref TEXT NOT NULL,
        marked_for_deletion BOOLEAN NOT NULL DEFAULT false,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE INDEX IF NOT EXISTS files_by_org_id ON files (org_id, created_at)",
    "CREATE INDEX IF NOT EXISTS files_by_marked ON files (marked_for_deletion) WHERE marked_for_deletion",
    "CREATE INDEX IF NOT EXISTS files_by_blob_ref ON files (blob_ref)",
    "CREATE TABLE IF NOT EXISTS favorites (
        user_id UUID NOT NULL,
        org_id TEXT NOT NULL,
        file_id UUID NOT NULL REFERENCES files(id) ON DELETE CASCADE,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        PRIMARY KEY (user_id, file_id)
    )",
    "CREATE INDEX IF NOT EXISTS favorites_by_user_org ON favorites (user_id, org_id)",
    "CREATE TABLE IF NOT EXISTS orphaned_blobs (
        blob_ref TEXT PRIMARY KEY,
        orphaned_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

const FILE_COLUMNS: &str = "id, name, org_id, user_id, file_type, blob_ref, marked_for_deletion, created_at";

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    token_identifier: String,
    name: String,
    image: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct MembershipRow {
    org_id: String,
    role: String,
}

#[derive(FromRow)]
struct FileRow {
    id: Uuid,
    name: String,
    org_id: String,
    user_id: Uuid,
    file_type: String,
    blob_ref: String,
    marked_for_deletion: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<FileRow> for FileRecord {
    type Error = StoreError;

    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(FileRecord {
            file_type: row.file_type.parse().map_err(StoreError::CorruptRow)?,
            id: row.id,
            name: row.name,
            org_id: row.org_id,
            user_id: row.user_id,
            blob_ref: BlobRef(row.blob_ref),
            marked_for_deletion: row.marked_for_deletion,
            created_at: row.created_at,
        })
    }
}

#[derive(FromRow)]
struct FavoriteRow {
    user_id: Uuid,
    org_id: String,
    file_id: Uuid,
    created_at: DateTime<Utc>,
}

impl From<FavoriteRow> for Favorite {
    fn from(row: FavoriteRow) -> Self {
        Favorite {
            user_id: row.user_id,
            org_id: row.org_id,
            file_id: row.file_id,
            created_at: row.created_at,
        }
    }
}

fn into_files(rows: Vec<FileRow>) -> Result<Vec<FileRecord>, StoreError> {
    rows.into_iter().map(FileRecord::try_from).collect()
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        if database_url.is_empty() {
            return Err(StoreError::ConfigMissing("DATABASE_URL"));
        }
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!("Connected database pool (max {} connections)", max_connections);
        Ok(Self { pool })
    }

    /// Creates tables and indexes that do not exist yet.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        for statement in SCHEMA {
            sqlx::query(statement).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        info!("Database schema is up to date");
        Ok(())
    }

    async fn load_user(&self, row: UserRow) -> Result<User, StoreError> {
        let memberships = sqlx::query_as::<_, MembershipRow>(
            "SELECT org_id, role FROM memberships WHERE user_id = $1 ORDER BY created_at, org_id",
        )
        .bind(row.id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|m| {
            Ok(Membership {
                role: m.role.parse::<Role>().map_err(StoreError::CorruptRow)?,
                org_id: m.org_id,
            })
        })
        .collect::<Result<Vec<_>, StoreError>>()?;

        Ok(User {
            id: row.id,
            token_identifier: row.token_identifier,
            name: row.name,
            image: row.image,
            memberships,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user_by_token(&self, token_identifier: &str) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, token_identifier, name, image, created_at FROM users WHERE token_identifier = $1",
        )
        .bind(token_identifier)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_user(row).await?)),
            None => Ok(None),
        }
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, token_identifier, name, image, created_at FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(Some(self.load_user(row).await?)),
            None => Ok(None),
        }
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let inserted = sqlx::query(
            "INSERT INTO users (id, token_identifier, name, image, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (token_identifier) DO NOTHING",
        )
        .bind(user.id)
        .bind(&user.token_identifier)
        .bind(&user.name)
        .bind(&user.image)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await?;

        if inserted.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "user with token '{}' already exists",
                user.token_identifier
            )));
        }

        for membership in &user.memberships {
            sqlx::query("INSERT INTO memberships (user_id, org_id, role) VALUES ($1, $2, $3)")
                .bind(user.id)
                .bind(&membership.org_id)
                .bind(membership.role.as_str())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn update_user_profile(&self, token_identifier: &str, name: &str, image: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE users SET name = $2, image = $3 WHERE token_identifier = $1")
            .bind(token_identifier)
            .bind(name)
            .bind(image)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn upsert_membership(&self, user_id: Uuid, org_id: &str, role: Role) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO memberships (user_id, org_id, role) VALUES ($1, $2, $3)
             ON CONFLICT (user_id, org_id) DO UPDATE SET role = EXCLUDED.role",
        )
        .bind(user_id)
        .bind(org_id)
        .bind(role.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_membership_role(&self, user_id: Uuid, org_id: &str, role: Role) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE memberships SET role = $3 WHERE user_id = $1 AND org_id = $2")
            .bind(user_id)
            .bind(org_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_file(&self, file: &FileRecord) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO files ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            FILE_COLUMNS
        ))
        .bind(file.id)
        .bind(&file.name)
        .bind(&file.org_id)
        .bind(file.user_id)
        .bind(file.file_type.as_str())
        .bind(file.blob_ref.as_str())
        .bind(file.marked_for_deletion)
        .bind(file.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_file(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError> {
        let row = sqlx::query_as::<_, FileRow>(&format!("SELECT {} FROM files WHERE id = $1", FILE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(FileRecord::try_from).transpose()
    }

    async fn files_by_org(&self, org_id: &str) -> Result<Vec<FileRecord>, StoreError> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE org_id = $1 ORDER BY created_at, id",
            FILE_COLUMNS
        ))
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        into_files(rows)
    }

    async fn files_by_blob(&self, blob_ref: &BlobRef) -> Result<Vec<FileRecord>, StoreError> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE blob_ref = $1 ORDER BY created_at, id",
            FILE_COLUMNS
        ))
        .bind(blob_ref.as_str())
        .fetch_all(&self.pool)
        .await?;
        into_files(rows)
    }

    async fn files_marked_for_deletion(&self) -> Result<Vec<FileRecord>, StoreError> {
        let rows = sqlx::query_as::<_, FileRow>(&format!(
            "SELECT {} FROM files WHERE marked_for_deletion ORDER BY created_at, id",
            FILE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        into_files(rows)
    }

    async fn set_marked_for_deletion(&self, id: Uuid, marked: bool) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE files SET marked_for_deletion = $2 WHERE id = $1")
            .bind(id)
            .bind(marked)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_file_if_marked(&self, id: Uuid) -> Result<Option<FileRecord>, StoreError> {
        // favorites go with the row through ON DELETE CASCADE
        let row = sqlx::query_as::<_, FileRow>(&format!(
            "WITH removed AS (
                 DELETE FROM files WHERE id = $1 AND marked_for_deletion RETURNING {columns}
             ),
             orphaned AS (
                 INSERT INTO orphaned_blobs (blob_ref) SELECT blob_ref FROM removed
                 ON CONFLICT (blob_ref) DO NOTHING
             )
             SELECT {columns} FROM removed",
            columns = FILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(FileRecord::try_from).transpose()
    }

    async fn orphaned_blobs(&self) -> Result<Vec<BlobRef>, StoreError> {
        let refs: Vec<String> = sqlx::query_scalar("SELECT blob_ref FROM orphaned_blobs ORDER BY orphaned_at, blob_ref")
            .fetch_all(&self.pool)
            .await?;
        Ok(refs.into_iter().map(BlobRef).collect())
    }

    async fn forget_orphaned_blob(&self, blob_ref: &BlobRef) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM orphaned_blobs WHERE blob_ref = $1")
            .bind(blob_ref.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn toggle_favorite(&self, favorite: &Favorite) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        // serializes toggles of the same (user, file) until commit
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1::text || ':' || $2::text, 0))")
            .bind(favorite.user_id)
            .bind(favorite.file_id)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND file_id = $2")
            .bind(favorite.user_id)
            .bind(favorite.file_id)
            .execute(&mut *tx)
            .await?;

        let now_favorited = if removed.rows_affected() > 0 {
            false
        } else {
            sqlx::query(
                "INSERT INTO favorites (user_id, org_id, file_id, created_at) VALUES ($1, $2, $3, $4)
                 ON CONFLICT (user_id, file_id) DO NOTHING",
            )
            .bind(favorite.user_id)
            .bind(&favorite.org_id)
            .bind(favorite.file_id)
            .bind(favorite.created_at)
            .execute(&mut *tx)
            .await?;
            true
        };

        tx.commit().await?;
        Ok(now_favorited)
    }

    async fn favorites_for(&self, user_id: Uuid, org_id: &str) -> Result<Vec<Favorite>, StoreError> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            "SELECT user_id, org_id, file_id, created_at FROM favorites
             WHERE user_id = $1 AND org_id = $2 ORDER BY created_at, file_id",
        )
        .bind(user_id)
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Favorite::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{FileType, NewFile};

    // Run with: DATABASE_URL=postgres://... cargo test -- --ignored
    async fn test_store() -> Option<PgStore> {
        let url = std::env::var("DATABASE_URL").ok()?;
        let store = PgStore::connect(&url, 10).await.unwrap();
        store.migrate().await.unwrap();
        Some(store)
    }

    async fn stored_file(store: &PgStore, org: &str, user: Uuid) -> FileRecord {
        let file = FileRecord::new(
            NewFile {
                name: "report.csv".to_string(),
                blob_ref: BlobRef::generate(),
                file_type: FileType::Csv,
            },
            org,
            user,
        );
        store.insert_file(&file).await.unwrap();
        file
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn concurrent_toggles_never_duplicate() {
        let Some(store) = test_store().await else { return };
        let user = Uuid::new_v4();
        let org = format!("org-{}", Uuid::new_v4());
        let file = stored_file(&store, &org, user).await;

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = store.clone();
                let favorite = Favorite::new(user, org.clone(), file.id);
                tokio::spawn(async move { store.toggle_favorite(&favorite).await })
            })
            .collect();
        let mut favorited = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                favorited += 1;
            }
        }

        assert_eq!(favorited, 5);
        assert!(store.favorites_for(user, &org).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "needs DATABASE_URL"]
    async fn delete_if_marked_cascades_and_orphans_blob() {
        let Some(store) = test_store().await else { return };
        let user = Uuid::new_v4();
        let org = format!("org-{}", Uuid::new_v4());
        let file = stored_file(&store, &org, user).await;
        assert!(store.toggle_favorite(&Favorite::new(user, org.clone(), file.id)).await.unwrap());

        // not marked: untouched
        assert!(store.delete_file_if_marked(file.id).await.unwrap().is_none());
        store.set_marked_for_deletion(file.id, true).await.unwrap();
        store.set_marked_for_deletion(file.id, false).await.unwrap();
        assert!(store.delete_file_if_marked(file.id).await.unwrap().is_none());
        assert!(store.get_file(file.id).await.unwrap().is_some());

        store.set_marked_for_deletion(file.id, true).await.unwrap();
        let removed = store.delete_file_if_marked(file.id).await.unwrap();
        assert_eq!(removed.map(|f| f.id), Some(file.id));
        assert!(store.get_file(file.id).await.unwrap().is_none());
        assert!(store.favorites_for(user, &org).await.unwrap().is_empty());
        assert!(store.orphaned_blobs().await.unwrap().contains(&file.blob_ref));

        store.forget_orphaned_blob(&file.blob_ref).await.unwrap();
        assert!(!store.orphaned_blobs().await.unwrap().contains(&file.blob_ref));
    }
}
