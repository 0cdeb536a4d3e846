//! Credential service.

use tracing::{debug, info};

use super::api_key::hash_api_key;
use crate::db::{Credential, CredentialRepository, Database, NewCredential};
use crate::Result;

/// Registers and resolves API keys.
#[derive(Debug, Clone)]
pub struct CredentialService {
    db: Database,
}

impl CredentialService {
    /// Create a new CredentialService.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register a raw API key.
    ///
    /// Fails with `InvalidCharacters` for malformed keys and
    /// `DuplicateCredential` when the key is already registered.
    pub async fn register(
        &self,
        secret: &str,
        comment: &str,
        is_highly_trusted: bool,
        created_by: Option<&str>,
    ) -> Result<Credential> {
        let hashed = hash_api_key(secret)?;

        let mut new = NewCredential::new(hashed)
            .with_comment(comment)
            .highly_trusted(is_highly_trusted);
        if let Some(creator) = created_by {
            new = new.created_by(creator);
        }

        let credential = CredentialRepository::new(self.db.pool()).create(&new).await?;
        info!(
            credential_id = %credential.id,
            highly_trusted = credential.is_highly_trusted,
            "API key registered"
        );
        Ok(credential)
    }

    /// Resolve a raw API key to its credential ID.
    ///
    /// Malformed and unknown keys resolve to `None`.
    pub async fn resolve(&self, secret: &str) -> Result<Option<String>> {
        let Ok(hashed) = hash_api_key(secret) else {
            debug!("Rejected malformed API key");
            return Ok(None);
        };

        let credential = CredentialRepository::new(self.db.pool())
            .get_by_hash(&hashed)
            .await?;
        Ok(credential.map(|c| c.id))
    }

    /// Get a credential by its hashed secret.
    pub async fn get_by_hash(&self, hashed_secret: &str) -> Result<Option<Credential>> {
        CredentialRepository::new(self.db.pool())
            .get_by_hash(hashed_secret)
            .await
    }

    /// Whether the credential is highly trusted. Unknown IDs are not.
    pub async fn is_highly_trusted(&self, credential_id: &str) -> Result<bool> {
        let credential = CredentialRepository::new(self.db.pool())
            .get_by_id(credential_id)
            .await?;
        Ok(credential.is_some_and(|c| c.is_highly_trusted))
    }

    /// Whether any credential has been registered.
    pub async fn exists(&self) -> Result<bool> {
        CredentialRepository::new(self.db.pool()).exists().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FshareError;

    async fn service() -> CredentialService {
        CredentialService::new(Database::open_in_memory().await.unwrap())
    }

    #[tokio::test]
    async fn test_register_and_resolve() {
        let svc = service().await;
        assert!(!svc.exists().await.unwrap());

        let cred = svc.register("alpha-key", "first", false, None).await.unwrap();

        assert!(svc.exists().await.unwrap());
        assert_eq!(svc.resolve("alpha-key").await.unwrap(), Some(cred.id));
        assert_eq!(cred.hashed_secret, hash_api_key("alpha-key").unwrap());
    }

    #[tokio::test]
    async fn test_resolve_unknown_or_malformed() {
        let svc = service().await;
        svc.register("known", "", false, None).await.unwrap();

        assert_eq!(svc.resolve("unknown").await.unwrap(), None);
        assert_eq!(svc.resolve("").await.unwrap(), None);
        assert_eq!(svc.resolve("not valid!").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_register_duplicate() {
        let svc = service().await;
        svc.register("dup", "", false, None).await.unwrap();

        let result = svc.register("dup", "again", true, None).await;
        assert!(matches!(result, Err(FshareError::DuplicateCredential)));
    }

    #[tokio::test]
    async fn test_register_invalid_characters() {
        let svc = service().await;
        let result = svc.register("bad key", "", false, None).await;
        assert!(matches!(result, Err(FshareError::InvalidCharacters)));
        assert!(!svc.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_is_highly_trusted() {
        let svc = service().await;
        let admin = svc.register("admin", "", true, None).await.unwrap();
        let user = svc
            .register("user", "", false, Some(&admin.id))
            .await
            .unwrap();

        assert!(svc.is_highly_trusted(&admin.id).await.unwrap());
        assert!(!svc.is_highly_trusted(&user.id).await.unwrap());
        assert!(!svc.is_highly_trusted("missing").await.unwrap());
        assert_eq!(user.created_by.as_deref(), Some(admin.id.as_str()));
    }

    #[tokio::test]
    async fn test_get_by_hash() {
        let svc = service().await;
        let cred = svc.register("lookup", "", false, None).await.unwrap();

        let found = svc
            .get_by_hash(&hash_api_key("lookup").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, cred.id);
    }
}
