//! HTTP API server

pub mod health;
pub mod stream;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::Result;
use crate::stream::StreamController;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub controller: Arc<StreamController>,
}

/// Build the full router with CORS and request tracing
pub fn router(state: Arc<ApiState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::router())
        .merge(stream::router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// HTTP API server
pub struct ApiServer {
    state: Arc<ApiState>,
    host: String,
    port: u16,
}

impl ApiServer {
    #[must_use]
    pub fn new(controller: Arc<StreamController>, host: impl Into<String>, port: u16) -> Self {
        Self {
            state: Arc::new(ApiState { controller }),
            host: host.into(),
            port,
        }
    }

    /// Serve until `shutdown` resolves
    ///
    /// Open feeds keep the server alive; stop the stream first so they end.
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = format!("{}:{}", self.host, self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Server(format!("failed to bind {addr}: {e}")))?;

        tracing::info!(host = %self.host, port = self.port, "API server listening");

        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| crate::Error::Server(format!("API server error: {e}")))?;

        tracing::info!("API server stopped");
        Ok(())
    }

    /// Run the API server in a background task
    #[must_use]
    pub fn spawn<F>(self, shutdown: F) -> tokio::task::JoinHandle<Result<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(async move { self.run(shutdown).await })
    }
}
