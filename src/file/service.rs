//! Resource service for fshare.
//!
//! This module provides the resource lifecycle:
//! - Upload with name validation, containment checks and collision renaming
//! - Home directory provisioning
//! - Ownership-checked soft deletion and the expiry sweep

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::db::{CredentialRepository, Database, NewResource, Resource, ResourceRepository};
use crate::{FshareError, Result};

use super::storage::FileStorage;
use super::{validate_filename, MAX_RENAME_ATTEMPTS};

/// Request data for an upload.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Declared file name.
    pub name: String,
    /// Uploading credential.
    pub owner: String,
    /// Whether reads require the owner's credential.
    pub is_private: bool,
    /// Scheduled deletion time.
    pub expires_at: Option<DateTime<Utc>>,
    /// Pick `0name`, `1name`, ... instead of failing on a name clash.
    pub allow_rename: bool,
}

impl UploadRequest {
    /// Create a public, non-expiring, strict upload request.
    pub fn new(name: impl Into<String>, owner: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            is_private: false,
            expires_at: None,
            allow_rename: false,
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

    /// Allow renaming on collision.
    pub fn allow_rename(mut self, allow: bool) -> Self {
        self.allow_rename = allow;
        self
    }
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Resources deleted by this sweep.
    pub deleted: usize,
    /// Resources that could not be deleted and are left for the next sweep.
    pub failed: usize,
}

/// Candidate name for the given probe attempt: `name`, `0name`, `1name`, ...
fn versioned_name(base: &str, attempt: usize) -> String {
    match attempt {
        0 => base.to_string(),
        n => format!("{}{base}", n - 1),
    }
}

/// Service managing resources on disk and in the catalog.
#[derive(Debug, Clone)]
pub struct ResourceService {
    db: Database,
    storage: FileStorage,
}

impl ResourceService {
    /// Create a new ResourceService.
    pub fn new(db: Database, storage: FileStorage) -> Self {
        Self { db, storage }
    }

    /// Get the underlying storage.
    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    /// Store an upload and record it in the catalog.
    ///
    /// The owner's home directory must already exist. Content is staged in a
    /// hidden temporary file next to the destination and only becomes visible
    /// under its final name through a no-clobber rename.
    ///
    /// # Returns
    /// The new resource's ID.
    pub async fn save(&self, content: impl Read, request: UploadRequest) -> Result<String> {
        let base = validate_filename(&request.name)?;

        let owner_dir = self.storage.owner_dir(&request.owner)?;
        if !owner_dir.is_dir() {
            return Err(FshareError::NotFound("home directory".to_string()));
        }
        // Checked before staging so that an escaping name never touches disk.
        self.storage.file_path(&request.owner, &base)?;

        let mut staged = self.storage.stage(&owner_dir, content)?;
        let repo = ResourceRepository::new(self.db.pool());

        for attempt in 0..MAX_RENAME_ATTEMPTS {
            let name = versioned_name(&base, attempt);
            let dest = self.storage.file_path(&request.owner, &name)?;

            // An active row may hold the name while its file is missing.
            if repo.find_active(&name, None, &request.owner).await?.is_some() {
                if !request.allow_rename {
                    return Err(FshareError::AlreadyExists);
                }
                debug!(name = %name, "Name taken in catalog, probing next");
                continue;
            }

            if let Err(e) = staged.persist_noclobber(&dest) {
                if e.error.kind() != io::ErrorKind::AlreadyExists {
                    return Err(e.error.into());
                }
                if !request.allow_rename {
                    return Err(FshareError::AlreadyExists);
                }
                staged = e.path;
                continue;
            }

            let new_resource = NewResource::file(&name, &request.owner)
                .private(request.is_private)
                .expires_at(request.expires_at);

            match repo.create(&new_resource).await {
                Ok(resource) => {
                    info!(
                        resource_id = %resource.id,
                        owner = %request.owner,
                        name = %name,
                        "File uploaded"
                    );
                    return Ok(resource.id);
                }
                Err(FshareError::AlreadyExists) if request.allow_rename => {
                    // Lost the name to a concurrent insert; take the file back off it.
                    debug!(name = %name, "Name taken in catalog, probing next");
                    staged = self.storage.restage(&dest)?;
                }
                Err(e) => {
                    if let Err(remove_err) = self.storage.remove_file(&dest) {
                        warn!(
                            path = %dest.display(),
                            error = %remove_err,
                            "Failed to remove file after catalog insert failure"
                        );
                    }
                    return Err(e);
                }
            }
        }

        Err(FshareError::AlreadyExists)
    }

    /// Get the home directory of the credential with `hashed_secret`,
    /// creating it on first use.
    pub async fn get_or_create_home(&self, hashed_secret: &str) -> Result<Resource> {
        let credential = CredentialRepository::new(self.db.pool())
            .get_by_hash(hashed_secret)
            .await?
            .ok_or(FshareError::UnknownCredential)?;

        let repo = ResourceRepository::new(self.db.pool());
        if let Some(home) = repo
            .find_active(&credential.id, None, &credential.id)
            .await?
        {
            return Ok(home);
        }

        let dir = self.storage.create_owner_dir(&credential.id)?;

        match repo.create(&NewResource::home(&credential.id)).await {
            Ok(home) => {
                info!(credential_id = %credential.id, path = %dir.display(), "Home directory created");
                Ok(home)
            }
            Err(e) => Err(self.discard_home_dir(&dir, e)),
        }
    }

    /// Remove a home directory whose catalog row could not be written.
    fn discard_home_dir(&self, dir: &Path, catalog_err: FshareError) -> FshareError {
        match self.storage.remove_dir(dir) {
            Ok(()) => catalog_err,
            Err(fs_err) => {
                warn!(
                    path = %dir.display(),
                    error = %fs_err,
                    "Failed to remove home directory after catalog insert failure"
                );
                FshareError::HomeSetup {
                    catalog: catalog_err.to_string(),
                    filesystem: fs_err.to_string(),
                }
            }
        }
    }

    /// Resolve the on-disk location of a resource, re-checking containment.
    pub fn resolve_path(&self, resource: &Resource) -> Result<PathBuf> {
        if resource.is_home() {
            self.storage.owner_dir(&resource.owner_credential_id)
        } else {
            self.storage
                .file_path(&resource.owner_credential_id, &resource.name)
        }
    }

    /// Get a resource by ID. Soft-deleted resources are returned as well.
    pub async fn get_by_id(&self, id: &str) -> Result<Resource> {
        ResourceRepository::new(self.db.pool())
            .get_by_id(id)
            .await?
            .ok_or_else(|| FshareError::NotFound("resource".to_string()))
    }

    /// Delete a resource on behalf of `requesting_credential_id`.
    ///
    /// Only the owner may delete; home directories are never deletable.
    pub async fn delete_by_id(&self, id: &str, requesting_credential_id: &str) -> Result<()> {
        let resource = self.get_by_id(id).await?;

        // Home directories are protected regardless of caller.
        if resource.is_home() {
            return Err(FshareError::ForbiddenHomeDeletion);
        }
        if resource.owner_credential_id != requesting_credential_id {
            return Err(FshareError::Forbidden);
        }
        if resource.is_deleted() {
            return Err(FshareError::AlreadyDeleted);
        }

        self.remove(&resource).await?;
        info!(resource_id = %id, owner = %requesting_credential_id, "Resource deleted");
        Ok(())
    }

    /// Remove the backing file, then tombstone the row.
    async fn remove(&self, resource: &Resource) -> Result<()> {
        let path = self.resolve_path(resource)?;
        let repo = ResourceRepository::new(self.db.pool());

        if let Err(e) = self.storage.remove_file(&path) {
            // Lost a race against another deleter.
            if e.kind() == io::ErrorKind::NotFound {
                if let Some(current) = repo.get_by_id(&resource.id).await? {
                    if current.is_deleted() {
                        return Err(FshareError::AlreadyDeleted);
                    }
                }
            }
            return Err(e.into());
        }

        if !repo.mark_deleted(&resource.id, Utc::now()).await? {
            return Err(FshareError::AlreadyDeleted);
        }
        Ok(())
    }

    /// Flag a resource whose backing file is gone. No-op for deleted resources.
    pub async fn mark_broken(&self, id: &str) -> Result<()> {
        let resource = self.get_by_id(id).await?;
        if resource.is_deleted() {
            return Ok(());
        }

        if ResourceRepository::new(self.db.pool())
            .mark_broken(id)
            .await?
        {
            warn!(resource_id = %id, "Resource marked as broken");
        }
        Ok(())
    }

    /// Check that the backing file of a resource is present.
    ///
    /// On failure the resource is marked broken and `NotFound` is returned.
    pub async fn verify_backing_file(&self, resource: &Resource) -> Result<PathBuf> {
        let path = self.resolve_path(resource)?;

        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Ok(path),
            result => {
                if let Err(e) = &result {
                    warn!(resource_id = %resource.id, error = %e, "Backing file missing");
                }
                self.mark_broken(&resource.id).await?;
                Err(FshareError::NotFound("file".to_string()))
            }
        }
    }

    /// Delete every active resource that expired at or before `now`.
    ///
    /// Runs with system authority (no ownership check). Per-resource failures
    /// are logged and counted; the remaining resources are still processed.
    pub async fn sweep_expired(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let expired = ResourceRepository::new(self.db.pool())
            .list_expired(now)
            .await?;

        let mut report = SweepReport::default();
        for resource in expired {
            match self.remove(&resource).await {
                Ok(()) => {
                    debug!(resource_id = %resource.id, "Expired resource deleted");
                    report.deleted += 1;
                }
                Err(FshareError::AlreadyDeleted) | Err(FshareError::NotFound(_)) => {
                    debug!(resource_id = %resource.id, "Expired resource already gone");
                }
                Err(e) => {
                    warn!(resource_id = %resource.id, error = %e, "Failed to delete expired resource");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}
