//! File management module for fshare.
//!
//! This module provides upload storage and the resource lifecycle:
//! - Per-owner directories under a single upload root
//! - Name validation and path containment
//! - Soft deletion and expiry sweeps

mod service;
mod storage;

pub use service::{ResourceService, SweepReport, UploadRequest};
pub use storage::FileStorage;

use crate::{FshareError, Result};

/// Upper bound on collision probes for a single upload.
pub const MAX_RENAME_ATTEMPTS: usize = 1000;

fn check_name(name: &str) -> Result<()> {
    if name.is_empty()
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
        || name.starts_with('.')
    {
        return Err(FshareError::InvalidFilename);
    }
    Ok(())
}

/// Validate an uploaded file name and return it with surrounding whitespace
/// removed.
///
/// Names containing `..`, a path separator or NUL, and names starting with a
/// dot are rejected with `InvalidFilename`.
pub fn validate_filename(name: &str) -> Result<String> {
    check_name(name)?;
    let trimmed = name.trim();
    check_name(trimmed)?;
    Ok(trimmed.to_string())
}
