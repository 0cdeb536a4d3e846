//! HTTP API for fshare.
//!
//! Exposes upload, read, signed link, deletion and key registration endpoints
//! over the resource and credential services.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::{ApiError, ErrorCode};
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
