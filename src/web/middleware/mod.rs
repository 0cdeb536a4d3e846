//! Middleware and extractors for the HTTP API.

pub mod auth;

pub use auth::{bearer_token, AuthCredential};
