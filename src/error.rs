//! Error types for fshare.

use thiserror::Error;

/// Common error type for fshare.
#[derive(Error, Debug)]
pub enum FshareError {
    /// Uploaded name contains `..`, a path separator, or starts with a dot.
    #[error("filename not allowed")]
    InvalidFilename,

    /// Resolved path escapes the upload root or could not be resolved.
    #[error("filepath not allowed")]
    InvalidFilePath,

    /// API key contains characters outside `[A-Za-z0-9-_.]`.
    #[error("invalid characters (allowed: a-z, A-Z, 0-9, -, _, .)")]
    InvalidCharacters,

    /// A resource with the same name already exists for this owner.
    #[error("file already exists")]
    AlreadyExists,

    /// The resource has already been soft-deleted.
    #[error("file already deleted")]
    AlreadyDeleted,

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Requesting credential does not own the resource.
    #[error("not authorized")]
    Forbidden,

    /// Home directories can never be deleted.
    #[error("deleting the home directory is not allowed")]
    ForbiddenHomeDeletion,

    /// The credential could not be resolved.
    #[error("unknown credential")]
    UnknownCredential,

    /// An API key with the same hash is already registered.
    #[error("credential already registered")]
    DuplicateCredential,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Database error.
    ///
    /// Errors from sqlx are converted automatically; unique-index violations
    /// are mapped to domain errors by the repositories before reaching here.
    #[error("database error: {0}")]
    Database(String),

    /// The owner's directory exists on disk but not in the catalog.
    #[error("user directory already exists: {0}")]
    HomeDirConflict(String),

    /// Home provisioning failed and the created directory could not be removed.
    #[error("home directory setup failed: catalog error: {catalog}; cleanup error: {filesystem}")]
    HomeSetup {
        /// The catalog insert failure.
        catalog: String,
        /// The failure while removing the created directory.
        filesystem: String,
    },

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl FshareError {
    /// Whether a client may retry the same request (possibly with a new name).
    pub fn is_retryable(&self) -> bool {
        matches!(self, FshareError::AlreadyExists)
    }
}

// Conversion from sqlx errors
impl From<sqlx::Error> for FshareError {
    fn from(e: sqlx::Error) -> Self {
        FshareError::Database(e.to_string())
    }
}

/// Result type alias for fshare operations.
pub type Result<T> = std::result::Result<T, FshareError>;
