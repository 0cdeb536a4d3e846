//! Credential repository.
//!
//! Credentials are API keys stored by their SHA-256 hash. The raw key is
//! never persisted.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{is_unique_violation, DbPool};
use crate::datetime::{from_unix, to_unix};
use crate::{FshareError, Result};

/// A registered API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// Credential ID (UUIDv7).
    pub id: String,
    /// Lowercase hex SHA-256 of the raw key.
    pub hashed_secret: String,
    /// Free-form note supplied at registration.
    pub comment: String,
    /// Whether this key may register other keys.
    pub is_highly_trusted: bool,
    /// Registration time.
    pub created_at: DateTime<Utc>,
    /// Credential that registered this one, if any.
    pub created_by: Option<String>,
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: String,
    hashed_secret: String,
    comment: String,
    is_highly_trusted: bool,
    created_at: i64,
    created_by: Option<String>,
}

impl CredentialRow {
    fn into_credential(self) -> Credential {
        Credential {
            id: self.id,
            hashed_secret: self.hashed_secret,
            comment: self.comment,
            is_highly_trusted: self.is_highly_trusted,
            created_at: from_unix(self.created_at),
            created_by: self.created_by,
        }
    }
}

/// New credential for registration.
#[derive(Debug, Clone)]
pub struct NewCredential {
    /// Hex SHA-256 of the raw key.
    pub hashed_secret: String,
    /// Free-form note.
    pub comment: String,
    /// Whether the key is highly trusted.
    pub is_highly_trusted: bool,
    /// Registering credential.
    pub created_by: Option<String>,
}

impl NewCredential {
    /// Create a new credential with default values.
    pub fn new(hashed_secret: impl Into<String>) -> Self {
        Self {
            hashed_secret: hashed_secret.into(),
            comment: String::new(),
            is_highly_trusted: false,
            created_by: None,
        }
    }

    /// Set the comment.
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Mark the credential as highly trusted.
    pub fn highly_trusted(mut self, trusted: bool) -> Self {
        self.is_highly_trusted = trusted;
        self
    }

    /// Record which credential registered this one.
    pub fn created_by(mut self, creator_id: impl Into<String>) -> Self {
        self.created_by = Some(creator_id.into());
        self
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, hashed_secret, comment, is_highly_trusted, created_at, created_by FROM credential";

/// Repository for credential operations.
pub struct CredentialRepository<'a> {
    pool: &'a DbPool,
}

impl<'a> CredentialRepository<'a> {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: &'a DbPool) -> Self {
        Self { pool }
    }

    /// Insert a credential.
    ///
    /// Fails with `DuplicateCredential` when the hash is already registered.
    pub async fn create(&self, new: &NewCredential) -> Result<Credential> {
        let credential = Credential {
            id: Uuid::now_v7().to_string(),
            hashed_secret: new.hashed_secret.clone(),
            comment: new.comment.clone(),
            is_highly_trusted: new.is_highly_trusted,
            created_at: from_unix(to_unix(Utc::now())),
            created_by: new.created_by.clone(),
        };

        sqlx::query(
            "INSERT INTO credential (id, hashed_secret, comment, is_highly_trusted, created_at, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(&credential.id)
        .bind(&credential.hashed_secret)
        .bind(&credential.comment)
        .bind(credential.is_highly_trusted)
        .bind(to_unix(credential.created_at))
        .bind(&credential.created_by)
        .execute(self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                FshareError::DuplicateCredential
            } else {
                FshareError::Database(e.to_string())
            }
        })?;

        Ok(credential)
    }

    /// Get a credential by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<Credential>> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id)
            .fetch_optional(self.pool)
            .await
            .map_err(|e| FshareError::Database(e.to_string()))?;

        Ok(row.map(CredentialRow::into_credential))
    }

    /// Get a credential by its hashed secret.
    pub async fn get_by_hash(&self, hashed_secret: &str) -> Result<Option<Credential>> {
        let row = sqlx::query_as::<_, CredentialRow>(&format!(
            "{SELECT_COLUMNS} WHERE hashed_secret = $1"
        ))
        .bind(hashed_secret)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| FshareError::Database(e.to_string()))?;

        Ok(row.map(CredentialRow::into_credential))
    }

    /// Whether any credential is registered.
    pub async fn exists(&self) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credential")
            .fetch_one(self.pool)
            .await
            .map_err(|e| FshareError::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Count registered credentials.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM credential")
            .fetch_one(self.pool)
            .await
            .map_err(|e| FshareError::Database(e.to_string()))?;
        Ok(count)
    }
}
