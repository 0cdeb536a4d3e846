//! Resource handlers: upload, read, signed links and deletion.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::datetime::{parse_auto_delete, to_rfc3339, FALLBACK_AUTO_DELETE};
use crate::db::Resource;
use crate::file::UploadRequest;
use crate::web::error::ApiError;
use crate::web::middleware::AuthCredential;

/// Response for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// ID of the new resource.
    pub id: String,
}

/// Response for a signed link request.
#[derive(Debug, Serialize)]
pub struct LinkResponse {
    /// Path and query of the signed `/raw` URL.
    pub url: String,
    /// Link expiry (RFC 3339).
    pub expires_at: String,
}

/// Query parameters of a signed `/raw` request.
#[derive(Debug, Deserialize)]
pub struct RawQuery {
    pub expires: Option<String>,
    pub signature: Option<String>,
    pub download: Option<String>,
}

/// Build a Content-Disposition header value for an attachment.
///
/// Non-ASCII names get an RFC 5987 `filename*` parameter alongside a
/// sanitized fallback.
fn content_disposition_header(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| match c {
            '"' | '\\' => '_',
            _ => c,
        })
        .collect();

    if filename.is_ascii() && sanitized == filename {
        return format!("attachment; filename=\"{}\"", filename);
    }

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitized,
        urlencoding::encode(filename)
    )
}

fn content_type_for(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

/// Whether `/r/` may show a file inline. Scriptable types such as HTML and
/// SVG are always sent as attachments.
fn is_inline_safe(content_type: &str) -> bool {
    content_type == "text/plain"
        || (content_type.starts_with("image/") && content_type != "image/svg+xml")
}

/// Look up a readable file resource, enforcing owner-only access to private ones.
async fn readable_resource(
    state: &AppState,
    id: &str,
    auth: Option<&AuthCredential>,
) -> Result<Resource, ApiError> {
    let resource = state.resources.get_by_id(id).await?;

    if !resource.is_file || resource.is_deleted() || resource.is_broken {
        return Err(ApiError::not_found("resource not found"));
    }

    if resource.is_private {
        match auth {
            Some(AuthCredential(id)) if *id == resource.owner_credential_id => {}
            _ => return Err(ApiError::unauthorized("Authorization failed")),
        }
    }

    Ok(resource)
}

/// Read the backing file, marking the resource broken when it is unreadable.
async fn read_content(state: &AppState, resource: &Resource) -> Result<Vec<u8>, ApiError> {
    let path = state.resources.verify_backing_file(resource).await?;

    match tokio::fs::read(&path).await {
        Ok(content) => Ok(content),
        Err(e) => {
            tracing::error!(resource_id = %resource.id, error = %e, "Failed to read file");
            state.resources.mark_broken(&resource.id).await?;
            Err(ApiError::internal("Failed to read file"))
        }
    }
}

/// POST /upload - Upload a file into the caller's home directory.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    AuthCredential(credential_id): AuthCredential,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut filename: Option<String> = None;
    let mut content: Option<Vec<u8>> = None;
    let mut is_private = false;
    let mut auto_del_in = String::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::payload_too_large("Upload too large");
        }
        tracing::debug!("Failed to read multipart field: {}", e);
        ApiError::bad_request("Invalid multipart data")
    })? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                filename = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        return ApiError::payload_too_large("Upload too large");
                    }
                    tracing::debug!("Failed to read file content: {}", e);
                    ApiError::bad_request("Failed to read file")
                })?;
                content = Some(bytes.to_vec());
            }
            "is_private" => {
                let value = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid is_private"))?;
                is_private = value == "true";
            }
            "auto_del_in" => {
                auto_del_in = field
                    .text()
                    .await
                    .map_err(|_| ApiError::bad_request("Invalid auto_del_in"))?;
            }
            _ => {}
        }
    }

    let filename = filename.ok_or_else(|| ApiError::bad_request("No file provided"))?;
    let content = content.ok_or_else(|| ApiError::bad_request("No file content"))?;

    let expires_at = parse_auto_delete(&auto_del_in).map(|ttl| {
        let now = Utc::now();
        now.checked_add_signed(ttl)
            .unwrap_or(now + FALLBACK_AUTO_DELETE)
    });

    let request = UploadRequest::new(filename, credential_id)
        .private(is_private)
        .expires_at(expires_at)
        .allow_rename(true);

    let id = state.resources.save(content.as_slice(), request).await?;

    Ok((StatusCode::CREATED, Json(UploadResponse { id })))
}

/// GET /r/:id - Serve a file resource.
pub async fn get_resource(
    State(state): State<Arc<AppState>>,
    auth: Option<AuthCredential>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let resource = readable_resource(&state, &id, auth.as_ref()).await?;
    let content = read_content(&state, &resource).await?;

    let content_type = content_type_for(&resource.name);
    let builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, content.len());

    let builder = if is_inline_safe(&content_type) {
        builder
            .header(header::CONTENT_TYPE, content_type)
            .header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
    } else {
        builder
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .header(
                header::CONTENT_DISPOSITION,
                content_disposition_header(&resource.name),
            )
    };

    builder.body(Body::from(content)).map_err(|e| {
        tracing::error!("Failed to build response: {}", e);
        ApiError::internal("Failed to build response")
    })
}

/// GET /r/:id/link - Issue a short-lived signed `/raw` link.
pub async fn get_link(
    State(state): State<Arc<AppState>>,
    auth: Option<AuthCredential>,
    Path(id): Path<String>,
) -> Result<Json<LinkResponse>, ApiError> {
    let resource = readable_resource(&state, &id, auth.as_ref()).await?;

    let expiry = Utc::now() + state.link_ttl;
    let url = state.signer.issue_url("raw", &resource.id, expiry);

    Ok(Json(LinkResponse {
        url,
        expires_at: to_rfc3339(&expiry),
    }))
}

/// GET /raw/:id - Serve a file through a signed link.
pub async fn get_raw(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<RawQuery>,
) -> Result<Response, ApiError> {
    let valid = state.signer.verify(
        &id,
        query.expires.as_deref(),
        query.signature.as_deref(),
        Utc::now().timestamp(),
    );
    if !valid {
        return Err(ApiError::unauthorized("Invalid or expired signature"));
    }

    let resource = state.resources.get_by_id(&id).await?;
    if !resource.is_file || resource.is_deleted() || resource.is_broken {
        return Err(ApiError::not_found("resource not found"));
    }
    let content = read_content(&state, &resource).await?;

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&resource.name))
        .header(header::CONTENT_LENGTH, content.len());

    builder = if query.download.as_deref() == Some("true") {
        builder.header(
            header::CONTENT_DISPOSITION,
            content_disposition_header(&resource.name),
        )
    } else {
        builder.header(header::X_CONTENT_TYPE_OPTIONS, "nosniff")
    };

    builder.body(Body::from(content)).map_err(|e| {
        tracing::error!("Failed to build response: {}", e);
        ApiError::internal("Failed to build response")
    })
}

/// DELETE /delete/:id - Delete one of the caller's resources.
pub async fn delete_resource(
    State(state): State<Arc<AppState>>,
    AuthCredential(credential_id): AuthCredential,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.resources.delete_by_id(&id, &credential_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition_header("report.txt"),
            "attachment; filename=\"report.txt\""
        );
    }

    #[test]
    fn test_content_disposition_non_ascii() {
        let value = content_disposition_header("résumé.pdf");
        assert!(value.starts_with("attachment; filename=\"résumé.pdf\""));
        assert!(value.contains("filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"));
    }

    #[test]
    fn test_content_disposition_quotes() {
        let value = content_disposition_header("a\"b.txt");
        assert!(value.contains("filename=\"a_b.txt\""));
        assert!(value.contains("filename*=UTF-8''a%22b.txt"));
    }

    #[test]
    fn test_is_inline_safe() {
        assert!(is_inline_safe("text/plain"));
        assert!(is_inline_safe("image/png"));
        assert!(!is_inline_safe("image/svg+xml"));
        assert!(!is_inline_safe("text/html"));
        assert!(!is_inline_safe("application/pdf"));
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("a.txt"), "text/plain");
        assert_eq!(content_type_for("a.png"), "image/png");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }
}
