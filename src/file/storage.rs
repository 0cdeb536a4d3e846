//! File storage for fshare.
//!
//! This module provides physical file storage:
//! - One directory per owner under a canonical upload root
//! - Containment checks for every path handed out
//! - Staged writes that become visible through a single no-clobber rename

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};

use tempfile::TempPath;

use crate::{FshareError, Result};

/// Prefix of staged uploads. Valid resource names never start with a dot.
const STAGING_PREFIX: &str = ".upload-";

/// File storage rooted at the upload directory.
///
/// ```text
/// {root}/
/// ├── {owner credential id}/      home directory
/// │   ├── report.txt
/// │   └── 0report.txt
/// └── ...
/// ```
#[derive(Debug, Clone)]
pub struct FileStorage {
    /// Canonical upload root.
    root: PathBuf,
}

impl FileStorage {
    /// Create a new FileStorage rooted at `root`.
    ///
    /// The directory is created if it doesn't exist and then canonicalized.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        let root = root.as_ref().canonicalize()?;
        Ok(Self { root })
    }

    /// Get the canonical root of this storage.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of an owner's home directory.
    pub fn owner_dir(&self, owner: &str) -> Result<PathBuf> {
        let mut components = Path::new(owner).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => {}
            _ => return Err(FshareError::InvalidFilePath),
        }

        let dir = self.root.join(owner);
        self.ensure_contained(&dir)?;
        Ok(dir)
    }

    /// Path of the file `name` inside an owner's directory.
    ///
    /// Only the final component of `name` is used. The result is verified to
    /// stay under the root after resolving any symlinks that already exist.
    pub fn file_path(&self, owner: &str, name: &str) -> Result<PathBuf> {
        let file_name = Path::new(name)
            .file_name()
            .ok_or(FshareError::InvalidFilePath)?;

        let path = self.owner_dir(owner)?.join(file_name);
        self.ensure_contained(&path)?;
        Ok(path)
    }

    /// Copy `content` into a hidden temporary file inside `dir`.
    ///
    /// The data is flushed and synced before returning. Dropping the returned
    /// path removes the file.
    pub fn stage(&self, dir: &Path, mut content: impl Read) -> Result<TempPath> {
        self.ensure_contained(dir)?;

        let mut staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(dir)?;
        io::copy(&mut content, &mut staged)?;
        staged.flush()?;
        staged.as_file().sync_all()?;

        Ok(staged.into_temp_path())
    }

    /// Move a persisted file back to a fresh hidden staging name.
    pub fn restage(&self, path: &Path) -> Result<TempPath> {
        let dir = path.parent().ok_or(FshareError::InvalidFilePath)?;
        self.ensure_contained(dir)?;

        let staged = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .make_in(dir, |candidate| fs::rename(path, candidate))?;
        Ok(staged.into_temp_path())
    }

    /// Create an owner directory with owner-only permissions.
    ///
    /// Fails with `HomeDirConflict` if it already exists.
    pub fn create_owner_dir(&self, owner: &str) -> Result<PathBuf> {
        let dir = self.owner_dir(owner)?;

        let mut builder = fs::DirBuilder::new();
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }

        match builder.create(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                Err(FshareError::HomeDirConflict(dir.display().to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a stored file.
    pub fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    /// Remove an empty owner directory.
    pub fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    /// Verify that `path` lies under the root.
    ///
    /// The lexical remainder must consist of plain names, and the deepest
    /// existing ancestor must canonicalize to a location under the root.
    fn ensure_contained(&self, path: &Path) -> Result<()> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| FshareError::InvalidFilePath)?;
        if relative.as_os_str().is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(FshareError::InvalidFilePath);
        }

        let mut existing = path;
        loop {
            match existing.symlink_metadata() {
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    existing = existing.parent().ok_or(FshareError::InvalidFilePath)?;
                }
                Err(_) => return Err(FshareError::InvalidFilePath),
            }
        }

        let resolved = existing
            .canonicalize()
            .map_err(|_| FshareError::InvalidFilePath)?;
        if !resolved.starts_with(&self.root) {
            return Err(FshareError::InvalidFilePath);
        }
        Ok(())
    }
}
