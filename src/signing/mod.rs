//! Signed URLs for fshare.
//!
//! A signed URL grants read access to one resource until its expiry without
//! a bearer credential. Validity depends only on the resource ID, the
//! expiry, the signature and the process secret; nothing is stored server
//! side.

mod secret;

pub use secret::{SigningSecret, SECRET_BYTES};

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::{FshareError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies signed resource URLs.
#[derive(Clone)]
pub struct UrlSigner {
    mac: HmacSha256,
}

impl UrlSigner {
    /// Create a signer keyed with `secret`.
    pub fn new(secret: &SigningSecret) -> Result<Self> {
        let mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| FshareError::Config(format!("invalid signing secret: {e}")))?;
        Ok(Self { mac })
    }

    /// Hex HMAC-SHA256 over `"{resource_id}|{expires}"`.
    pub fn sign(&self, resource_id: &str, expires: i64) -> String {
        self.sign_raw(resource_id, &expires.to_string())
    }

    /// Hex HMAC-SHA256 over the exact `expires` text.
    fn sign_raw(&self, resource_id: &str, expires: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(resource_id.as_bytes());
        mac.update(b"|");
        mac.update(expires.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Build `/{base}/{resource_id}?expires=..&signature=..`.
    pub fn issue_url(&self, base_path: &str, resource_id: &str, expiry: DateTime<Utc>) -> String {
        let expires = expiry.timestamp();
        let signature = self.sign(resource_id, expires);

        let base = base_path.trim_matches('/');
        let path = if base.is_empty() {
            format!("/{resource_id}")
        } else {
            format!("/{base}/{resource_id}")
        };

        format!("{path}?expires={expires}&signature={signature}")
    }

    /// Check a signed request.
    ///
    /// Returns `false` for missing or malformed parameters, for expired links
    /// and for signature mismatches. The MAC covers the `expires` text exactly as
    /// received, so `"01000"` does not verify against a link issued for `1000`.
    /// The signature is compared in constant time.
    pub fn verify(
        &self,
        resource_id: &str,
        expires: Option<&str>,
        signature: Option<&str>,
        now: i64,
    ) -> bool {
        let (Some(expires), Some(signature)) = (expires, signature) else {
            return false;
        };
        let Ok(deadline) = expires.parse::<i64>() else {
            return false;
        };
        if now > deadline {
            return false;
        }

        let expected = self.sign_raw(resource_id, expires);
        expected.as_bytes().ct_eq(signature.as_bytes()).into()
    }
}

impl std::fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlSigner").finish_non_exhaustive()
    }
}
