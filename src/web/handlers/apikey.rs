//! API key registration handler.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::datetime::to_rfc3339;
use crate::web::error::ApiError;
use crate::web::middleware::AuthCredential;

/// Request body for registering a new API key.
#[derive(Debug, Deserialize)]
pub struct CreateApiKeyRequest {
    /// Raw key chosen by the caller.
    pub key: String,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub highly_trusted: bool,
}

/// Registered credential, without its secret.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: String,
    pub comment: String,
    pub highly_trusted: bool,
    pub created_at: String,
}

/// POST /apikey - Register a new API key and provision its home directory.
///
/// Only highly trusted credentials may register keys.
pub async fn create_api_key(
    State(state): State<Arc<AppState>>,
    AuthCredential(credential_id): AuthCredential,
    Json(req): Json<CreateApiKeyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.credentials.is_highly_trusted(&credential_id).await? {
        return Err(ApiError::forbidden(
            "Only highly trusted keys may register new keys",
        ));
    }

    let credential = state
        .credentials
        .register(
            &req.key,
            &req.comment,
            req.highly_trusted,
            Some(&credential_id),
        )
        .await?;

    state
        .resources
        .get_or_create_home(&credential.hashed_secret)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiKeyResponse {
            id: credential.id,
            comment: credential.comment,
            highly_trusted: credential.is_highly_trusted,
            created_at: to_rfc3339(&credential.created_at),
        }),
    ))
}
