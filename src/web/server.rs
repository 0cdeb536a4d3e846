//! Web server for fshare.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::Config;
use crate::{FshareError, Result};

use super::handlers::AppState;
use super::router::create_router;

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Upload body cap.
    max_upload_bytes: Option<u64>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, app_state: Arc<AppState>) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| FshareError::Config(format!("invalid server address: {e}")))?;

        Ok(Self {
            addr,
            app_state,
            max_upload_bytes: config.storage.max_upload_bytes(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until `shutdown` resolves.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = create_router(self.app_state, self.max_upload_bytes);

        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Web server listening on http://{}", self.addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("Web server stopped");
        Ok(())
    }
}
