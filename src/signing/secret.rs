//! Persistent HMAC secret for signed URLs.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use rand::Rng;
use tracing::info;

use crate::{FshareError, Result};

/// Number of random bytes in a generated secret.
pub const SECRET_BYTES: usize = 32;

/// Hex-encoded signing secret.
///
/// The hex text itself is the HMAC key, so a secret file written by hand
/// keeps working as long as its content is unchanged.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningSecret {
    hex: String,
}

impl SigningSecret {
    /// Generate a new random secret.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SECRET_BYTES];
        rand::rng().fill(&mut bytes[..]);
        Self {
            hex: hex::encode(bytes),
        }
    }

    /// Wrap an existing secret; surrounding whitespace is ignored.
    pub fn from_hex(value: &str) -> Result<Self> {
        let hex = value.trim();
        if hex.is_empty() {
            return Err(FshareError::Config("signing secret is empty".to_string()));
        }
        Ok(Self {
            hex: hex.to_string(),
        })
    }

    /// Key bytes for the HMAC.
    pub fn as_bytes(&self) -> &[u8] {
        self.hex.as_bytes()
    }

    /// Load the secret stored at `path`, or create it on first run.
    ///
    /// New secret files are written with mode 0600.
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => return Self::from_hex(&content),
            Err(e) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            Err(_) => {}
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let secret = Self::generate();

        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path)?;
        writeln!(file, "{}", secret.hex)?;
        file.sync_all()?;

        info!(path = %path.display(), "Generated new signing secret");
        Ok(secret)
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningSecret").finish_non_exhaustive()
    }
}
