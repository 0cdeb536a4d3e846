//! Authentication module for fshare.
//!
//! This module provides API key hashing and the credential service used to
//! register and resolve keys.

mod api_key;
mod service;

pub use api_key::{generate_api_key, hash_api_key, validate_api_key, GENERATED_KEY_BYTES};
pub use service::CredentialService;
