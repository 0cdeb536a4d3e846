//! Resource catalog repository.
//!
//! Resources are files and per-owner home directories. Rows are never
//! removed; deletion sets `deleted_at` and leaves the row as a tombstone.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{is_unique_violation, DbPool};
use crate::datetime::{from_unix, to_unix};
use crate::{FshareError, Result};

/// Lifecycle state of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    /// Visible and addressable.
    Active,
    /// Soft-deleted at the given time.
    Deleted(DateTime<Utc>),
}

/// A catalog entry for a file or a home directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    /// Resource ID (UUIDv7).
    pub id: String,
    /// File name on disk (final, possibly suffixed).
    pub name: String,
    /// Whether reads require the owner's credential.
    pub is_private: bool,
    /// File (`true`) or directory (`false`).
    pub is_file: bool,
    /// Parent resource, `None` for top-level entries.
    pub parent_id: Option<String>,
    /// Owning credential.
    pub owner_credential_id: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Scheduled deletion time.
    pub expires_at: Option<DateTime<Utc>>,
    /// Soft-delete time.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Set when the backing file went missing under an active row.
    pub is_broken: bool,
}

impl Resource {
    /// Get the lifecycle state.
    pub fn state(&self) -> ResourceState {
        match self.deleted_at {
            Some(at) => ResourceState::Deleted(at),
            None => ResourceState::Active,
        }
    }

    /// Whether the resource is soft-deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Whether this is an owner's home directory.
    pub fn is_home(&self) -> bool {
        !self.is_file && self.parent_id.is_none()
    }

    /// Whether the resource has expired at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: String,
    name: String,
    is_private: bool,
    is_file: bool,
    parent_id: Option<String>,
    owner_credential_id: String,
    created_at: i64,
    expires_at: Option<i64>,
    deleted_at: Option<i64>,
    is_broken: bool,
}

impl ResourceRow {
    fn into_resource(self) -> Resource {
        Resource {
            id: self.id,
            name: self.name,
            is_private: self.is_private,
            is_file: self.is_file,
            parent_id: self.parent_id,
            owner_credential_id: self.owner_credential_id,
            created_at: from_unix(self.created_at),
            expires_at: self.expires_at.map(from_unix),
            deleted_at: self.deleted_at.map(from_unix),
            is_broken: self.is_broken,
        }
    }
}

/// New resource for insertion.
#[derive(Debug, Clone)]
pub struct NewResource {
    /// Final file name.
    pub name: String,
    /// Owning credential.
    pub owner_credential_id: String,
    /// Whether reads require the owner's credential.
    pub is_private: bool,
    /// File or directory.
    pub is_file: bool,
    /// Parent resource.
    pub parent_id: Option<String>,
    /// Scheduled deletion time.
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewResource {
    /// A top-level file owned by `owner_credential_id`.
    pub fn file(name: impl Into<String>, owner_credential_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner_credential_id: owner_credential_id.into(),
            is_private: false,
            is_file: true,
            parent_id: None,
            expires_at: None,
        }
    }

    /// The private home directory of `owner_credential_id`, named after it.
    pub fn home(owner_credential_id: impl Into<String>) -> Self {
        let owner = owner_credential_id.into();
        Self {
            name: owner.clone(),
            owner_credential_id: owner,
            is_private: true,
            is_file: false,
            parent_id: None,
            expires_at: None,
        }
    }

    /// Set the privacy flag.
    pub fn private(mut self, is_private: bool) -> Self {
        self.is_private = is_private;
        self
    }

    /// Set the expiry.
    pub fn expires_at(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = expires_at;
        self
    }
}

const SELECT_COLUMNS: &str = "SELECT id, name, is_private, is_file, parent_id, owner_credential_id,
    created_at, expires_at, deleted_at, is_broken FROM resource";

/// Repository for resource catalog operations.
pub struct ResourceRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> ResourceRepository<'a> {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a new active resource.
    ///
    /// Fails with `AlreadyExists` when an active resource with the same
    /// (name, parent, owner) exists.
    pub async fn create(&self, new: &NewResource) -> Result<Resource> {
        let resource = Resource {
            id: Uuid::now_v7().to_string(),
            name: new.name.clone(),
            is_private: new.is_private,
            is_file: new.is_file,
            parent_id: new.parent_id.clone(),
            owner_credential_id: new.owner_credential_id.clone(),
            created_at: from_unix(to_unix(Utc::now())),
            expires_at: new.expires_at.map(|at| from_unix(to_unix(at))),
            deleted_at: None,
            is_broken: false,
        };

        sqlx::query(
            "INSERT INTO resource (id, name, is_private, is_file, parent_id, owner_credential_id,
                                   created_at, expires_at, deleted_at, is_broken)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NULL, FALSE)",
        )
        .bind(&resource.id)
        .bind(&resource.name)
        .bind(resource.is_private)
        .bind(resource.is_file)
        .bind(&resource.parent_id)
        .bind(&resource.owner_credential_id)
        .bind(to_unix(resource.created_at))
        .bind(resource.expires_at.map(to_unix))
        .execute(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                FshareError::AlreadyExists
            } else {
                FshareError::Database(e.to_string())
            }
        })?;

        Ok(resource)
    }

    /// Get a resource by ID, including soft-deleted ones.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Resource>> {
        let row = sqlx::query_as::<_, ResourceRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| FshareError::Database(e.to_string()))?;

        Ok(row.map(ResourceRow::into_resource))
    }

    /// Find the active resource with the given (name, parent, owner).
    pub async fn find_active(
        &self,
        name: &str,
        parent_id: Option<&str>,
        owner_credential_id: &str,
    ) -> Result<Option<Resource>> {
        let row = sqlx::query_as::<_, ResourceRow>(&format!(
            "{SELECT_COLUMNS}
             WHERE name = $1
               AND COALESCE(parent_id, '') = COALESCE($2, '')
               AND owner_credential_id = $3
               AND deleted_at IS NULL"
        ))
        .bind(name)
        .bind(parent_id)
        .bind(owner_credential_id)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| FshareError::Database(e.to_string()))?;

        Ok(row.map(ResourceRow::into_resource))
    }

    /// Persist every mutable column of `resource`.
    ///
    /// Returns `false` when no row has that ID.
    pub async fn update(&self, resource: &Resource) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE resource
             SET name = $1, is_private = $2, is_file = $3, parent_id = $4,
                 owner_credential_id = $5, expires_at = $6, deleted_at = $7, is_broken = $8
             WHERE id = $9",
        )
        .bind(&resource.name)
        .bind(resource.is_private)
        .bind(resource.is_file)
        .bind(&resource.parent_id)
        .bind(&resource.owner_credential_id)
        .bind(resource.expires_at.map(to_unix))
        .bind(resource.deleted_at.map(to_unix))
        .bind(resource.is_broken)
        .bind(&resource.id)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                FshareError::AlreadyExists
            } else {
                FshareError::Database(e.to_string())
            }
        })?;

        Ok(result.rows_affected() > 0)
    }

    /// Set `deleted_at` on an active resource.
    ///
    /// Returns `false` when the resource is unknown or already deleted, so
    /// that only one of several concurrent deleters wins.
    pub async fn mark_deleted(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result =
            sqlx::query("UPDATE resource SET deleted_at = $1 WHERE id = $2 AND deleted_at IS NULL")
                .bind(to_unix(at))
                .bind(id)
                .execute(self.pool)
                .await
                .map_err(|e| FshareError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// Set `is_broken` on an active resource. Deleted rows are left alone.
    pub async fn mark_broken(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE resource SET is_broken = TRUE WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(self.pool)
        .await
        .map_err(|e| FshareError::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    /// List active resources whose expiry is at or before `now`, oldest first.
    pub async fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Resource>> {
        let rows = sqlx::query_as::<_, ResourceRow>(&format!(
            "{SELECT_COLUMNS}
             WHERE expires_at IS NOT NULL AND expires_at <= $1 AND deleted_at IS NULL
             ORDER BY expires_at"
        ))
        .bind(to_unix(now))
        .fetch_all(self.pool)
        .await
        .map_err(|e| FshareError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(ResourceRow::into_resource).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CredentialRepository, Database, NewCredential};
    use chrono::TimeDelta;

    async fn setup() -> (Database, String) {
        let db = Database::open_in_memory().await.unwrap();
        let owner = CredentialRepository::new(db.pool())
            .create(&NewCredential::new("a".repeat(64)))
            .await
            .unwrap();
        (db, owner.id)
    }

    #[tokio::test]
    async fn test_create_and_get_resource() {
        let (db, owner) = setup().await;
        let repo = ResourceRepository::new(db.pool());

        let created = repo
            .create(&NewResource::file("report.txt", &owner).private(true))
            .await
            .unwrap();

        let fetched = repo.get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched, created);
        assert!(fetched.is_file);
        assert!(fetched.is_private);
        assert_eq!(fetched.state(), ResourceState::Active);
        assert!(!fetched.is_home());
    }

    #[tokio::test]
    async fn test_home_resource() {
        let (db, owner) = setup().await;
        let repo = ResourceRepository::new(db.pool());

        let home = repo.create(&NewResource::home(&owner)).await.unwrap();
        assert!(home.is_home());
        assert!(home.is_private);
        assert_eq!(home.name, owner);

        let found = repo.find_active(&owner, None, &owner).await.unwrap();
        assert_eq!(found.map(|r| r.id), Some(home.id));
    }

    #[tokio::test]
    async fn test_unknown_owner_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = ResourceRepository::new(db.pool());

        let result = repo.create(&NewResource::file("a.txt", "nobody")).await;
        assert!(matches!(result, Err(FshareError::Database(_))));
    }

    #[tokio::test]
    async fn test_active_name_is_unique() {
        let (db, owner) = setup().await;
        let repo = ResourceRepository::new(db.pool());

        repo.create(&NewResource::file("a.txt", &owner)).await.unwrap();
        let result = repo.create(&NewResource::file("a.txt", &owner)).await;

        assert!(matches!(result, Err(FshareError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_name_reusable_after_delete() {
        let (db, owner) = setup().await;
        let repo = ResourceRepository::new(db.pool());

        let first = repo.create(&NewResource::file("a.txt", &owner)).await.unwrap();
        assert!(repo.mark_deleted(&first.id, Utc::now()).await.unwrap());

        let second = repo.create(&NewResource::file("a.txt", &owner)).await.unwrap();
        assert_ne!(first.id, second.id);

        let found = repo.find_active("a.txt", None, &owner).await.unwrap().unwrap();
        assert_eq!(found.id, second.id);
    }

    #[tokio::test]
    async fn test_mark_deleted_only_once() {
        let (db, owner) = setup().await;
        let repo = ResourceRepository::new(db.pool());

        let res = repo.create(&NewResource::file("a.txt", &owner)).await.unwrap();
        assert!(repo.mark_deleted(&res.id, Utc::now()).await.unwrap());
        assert!(!repo.mark_deleted(&res.id, Utc::now()).await.unwrap());
        assert!(!repo.mark_deleted("missing", Utc::now()).await.unwrap());

        let fetched = repo.get_by_id(&res.id).await.unwrap().unwrap();
        assert!(matches!(fetched.state(), ResourceState::Deleted(_)));
    }

    #[tokio::test]
    async fn test_mark_broken_skips_deleted() {
        let (db, owner) = setup().await;
        let repo = ResourceRepository::new(db.pool());

        let live = repo.create(&NewResource::file("a.txt", &owner)).await.unwrap();
        let gone = repo.create(&NewResource::file("b.txt", &owner)).await.unwrap();
        repo.mark_deleted(&gone.id, Utc::now()).await.unwrap();

        assert!(repo.mark_broken(&live.id).await.unwrap());
        assert!(!repo.mark_broken(&gone.id).await.unwrap());

        assert!(repo.get_by_id(&live.id).await.unwrap().unwrap().is_broken);
        assert!(!repo.get_by_id(&gone.id).await.unwrap().unwrap().is_broken);
    }

    #[tokio::test]
    async fn test_update_resource() {
        let (db, owner) = setup().await;
        let repo = ResourceRepository::new(db.pool());

        let mut res = repo.create(&NewResource::file("a.txt", &owner)).await.unwrap();
        res.is_broken = true;
        res.expires_at = Some(from_unix(2_000_000_000));
        assert!(repo.update(&res).await.unwrap());

        let fetched = repo.get_by_id(&res.id).await.unwrap().unwrap();
        assert_eq!(fetched, res);

        res.id = "missing".to_string();
        assert!(!repo.update(&res).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_expired() {
        let (db, owner) = setup().await;
        let repo = ResourceRepository::new(db.pool());
        let now = Utc::now();

        let past = repo
            .create(&NewResource::file("old.txt", &owner).expires_at(Some(now - TimeDelta::hours(1))))
            .await
            .unwrap();
        repo.create(&NewResource::file("new.txt", &owner).expires_at(Some(now + TimeDelta::hours(1))))
            .await
            .unwrap();
        repo.create(&NewResource::file("keep.txt", &owner)).await.unwrap();
        let deleted = repo
            .create(&NewResource::file("gone.txt", &owner).expires_at(Some(now - TimeDelta::hours(2))))
            .await
            .unwrap();
        repo.mark_deleted(&deleted.id, now).await.unwrap();

        let expired = repo.list_expired(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, past.id);
        assert!(expired[0].is_expired(now));
    }
}
