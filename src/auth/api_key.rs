//! API key hashing and generation.
//!
//! Keys are restricted to `[A-Za-z0-9-_.]` and stored as the lowercase hex
//! SHA-256 of their raw bytes.

use rand::Rng;
use sha2::{Digest, Sha256};

use crate::{FshareError, Result};

/// Number of random bytes in a generated key (hex-encoded to twice as many chars).
pub const GENERATED_KEY_BYTES: usize = 32;

/// Check that a key only contains allowed characters.
pub fn validate_api_key(secret: &str) -> Result<()> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.');
    if secret.is_empty() || !secret.chars().all(allowed) {
        return Err(FshareError::InvalidCharacters);
    }
    Ok(())
}

/// Hash an API key for storage and lookup.
///
/// # Examples
///
/// ```
/// use fshare::auth::hash_api_key;
///
/// let hash = hash_api_key("my-key").unwrap();
/// assert_eq!(hash.len(), 64);
/// assert!(hash_api_key("bad key!").is_err());
/// ```
pub fn hash_api_key(secret: &str) -> Result<String> {
    validate_api_key(secret)?;
    Ok(hex::encode(Sha256::digest(secret.as_bytes())))
}

/// Generate a random API key.
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; GENERATED_KEY_BYTES];
    rand::rng().fill(&mut bytes[..]);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_known_value() {
        // sha256("abc")
        assert_eq!(
            hash_api_key("abc").unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(
            hash_api_key("key-1_a.b").unwrap(),
            hash_api_key("key-1_a.b").unwrap()
        );
        assert_ne!(hash_api_key("key1").unwrap(), hash_api_key("key2").unwrap());
    }

    #[test]
    fn test_invalid_characters() {
        for bad in ["", "with space", "slash/", "quote'", "ümlaut", "semi;colon"] {
            assert!(
                matches!(hash_api_key(bad), Err(FshareError::InvalidCharacters)),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key();
        assert_eq!(key.len(), GENERATED_KEY_BYTES * 2);
        assert!(validate_api_key(&key).is_ok());
        assert_ne!(key, generate_api_key());
    }
}
