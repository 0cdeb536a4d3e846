//! API handlers for the fshare HTTP surface.

pub mod apikey;
pub mod resource;

pub use apikey::*;
pub use resource::*;

use std::sync::Arc;

use chrono::TimeDelta;

use crate::auth::CredentialService;
use crate::file::ResourceService;
use crate::signing::UrlSigner;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// API key registration and lookup.
    pub credentials: CredentialService,
    /// Resource catalog and storage.
    pub resources: Arc<ResourceService>,
    /// Signed link issuer.
    pub signer: UrlSigner,
    /// Lifetime of issued signed links.
    pub link_ttl: TimeDelta,
}

impl AppState {
    /// Create a new application state.
    pub fn new(
        credentials: CredentialService,
        resources: Arc<ResourceService>,
        signer: UrlSigner,
        link_ttl_secs: u64,
    ) -> Self {
        let link_ttl = i64::try_from(link_ttl_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::seconds(30));

        Self {
            credentials,
            resources,
            signer,
            link_ttl,
        }
    }
}
