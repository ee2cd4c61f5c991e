//! HTTP server.

use std::future::Future;
use std::sync::Arc;

use pagewatch_config::ServerConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::ApiError;
use crate::http::routes::create_router;
use crate::state::AppState;

/// Serves the router until a shutdown future resolves.
pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ServerConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Bind the configured address and serve.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr()).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state.clone());
        info!("HTTP server listening on {}", listener.local_addr()?);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("HTTP server stopped");
        Ok(())
    }
}
