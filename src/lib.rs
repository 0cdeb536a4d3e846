//! fshare - self-hosted file sharing
//!
//! Stores uploaded files per API key, serves them publicly, privately or
//! through short-lived signed links, and sweeps expired uploads.

pub mod auth;
pub mod cleanup;
pub mod config;
pub mod datetime;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod signing;
pub mod web;

pub use auth::CredentialService;
pub use cleanup::{CleanupHandle, CleanupScheduler};
pub use config::Config;
pub use db::Database;
pub use error::{FshareError, Result};
pub use file::{FileStorage, ResourceService, UploadRequest};
pub use signing::{SigningSecret, UrlSigner};
