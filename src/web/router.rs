//! Router configuration for the HTTP API.

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    create_api_key, delete_resource, get_link, get_raw, get_resource, upload, AppState,
};

/// Create the main API router.
///
/// `max_upload_bytes` caps the `/upload` body; `None` lifts the limit.
pub fn create_router(app_state: Arc<AppState>, max_upload_bytes: Option<u64>) -> Router {
    let body_limit = match max_upload_bytes.and_then(|n| usize::try_from(n).ok()) {
        Some(limit) => DefaultBodyLimit::max(limit),
        None => DefaultBodyLimit::disable(),
    };

    let upload_routes = Router::new()
        .route("/upload", post(upload))
        .layer(body_limit);

    Router::new()
        .merge(upload_routes)
        .route("/r/:id", get(get_resource))
        .route("/r/:id/link", get(get_link))
        .route("/raw/:id", get(get_raw))
        .route("/delete/:id", delete(delete_resource))
        .route("/apikey", post(create_api_key))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(app_state)
        .merge(create_health_router())
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
