//! Bearer API key authentication.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Extractor for authenticated requests.
///
/// Resolves `Authorization: Bearer <api key>` to the credential ID. Wrap in
/// `Option` for endpoints where authentication is only sometimes required.
#[derive(Debug, Clone)]
pub struct AuthCredential(pub String);

/// Extract the raw key from an `Authorization` header value.
pub fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    header
        .to_str()
        .ok()
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| ApiError::unauthorized("Invalid Authorization scheme"))
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthCredential {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let key = bearer_token(parts)?;

        match state.credentials.resolve(key).await? {
            Some(credential_id) => Ok(AuthCredential(credential_id)),
            None => {
                tracing::debug!("Rejected unknown API key");
                Err(ApiError::unauthorized("Authorization failed"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_token() {
        let parts = parts_with(Some("Bearer my-key"));
        assert_eq!(bearer_token(&parts).unwrap(), "my-key");
    }

    #[test]
    fn test_bearer_token_missing() {
        let parts = parts_with(None);
        assert!(bearer_token(&parts).is_err());
    }

    #[test]
    fn test_bearer_token_wrong_scheme() {
        let parts = parts_with(Some("Basic dXNlcjpwYXNz"));
        assert!(bearer_token(&parts).is_err());
    }
}
