//! HTTP API server for the browser front end

mod error;
pub mod health;
pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

pub use error::ApiError;

use crate::Result;
use crate::session::SessionTable;

/// Shared state for API handlers
pub struct ApiState {
    pub sessions: SessionTable,
    pub llm_configured: bool,
    pub provider: String,
    pub model: String,
}

/// Builder for the API server
pub struct ApiServerBuilder {
    sessions: SessionTable,
    port: u16,
    llm_configured: bool,
    provider: String,
    model: String,
    static_dir: Option<PathBuf>,
}

impl ApiServerBuilder {
    /// Create a new API server builder
    #[must_use]
    pub fn new(sessions: SessionTable, port: u16) -> Self {
        Self {
            sessions,
            port,
            llm_configured: false,
            provider: String::new(),
            model: String::new(),
            static_dir: None,
        }
    }

    /// Describe the language service for the status endpoint
    #[must_use]
    pub fn llm(
        mut self,
        provider: impl Into<String>,
        model: impl Into<String>,
        configured: bool,
    ) -> Self {
        self.provider = provider.into();
        self.model = model.into();
        self.llm_configured = configured;
        self
    }

    /// Set the static files directory for the browser UI
    #[must_use]
    pub fn static_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.static_dir = dir;
        self
    }

    /// Build the API server
    #[must_use]
    pub fn build(self) -> ApiServer {
        ApiServer {
            state: Arc::new(ApiState {
                sessions: self.sessions,
                llm_configured: self.llm_configured,
                provider: self.provider,
                model: self.model,
            }),
            port: self.port,
            static_dir: self.static_dir,
        }
    }
}

/// HTTP API server
pub struct ApiServer {
    state: Arc<ApiState>,
    port: u16,
    static_dir: Option<PathBuf>,
}

impl ApiServer {
    /// Build the router with all routes
    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = Router::new()
            .merge(session::router(Arc::clone(&self.state)))
            .merge(health::status_router(Arc::clone(&self.state)))
            .merge(health::router());

        // Serve static files if configured
        if let Some(static_dir) = &self.static_dir {
            let index_file = static_dir.join("index.html");
            let serve_dir = ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_file));

            router = router.fallback_service(serve_dir);
            tracing::info!(path = %static_dir.display(), "serving static files");
        }

        // CORS layer for cross-origin requests from frontend
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        router.layer(cors).layer(TraceLayer::new_for_http())
    }

    /// Shared handler state
    #[must_use]
    pub fn state(&self) -> Arc<ApiState> {
        Arc::clone(&self.state)
    }

    /// Run the API server
    ///
    /// # Errors
    ///
    /// Returns error if server fails to bind or run
    pub async fn run(self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| crate::Error::Config(format!("failed to bind API server: {e}")))?;

        tracing::info!(port = self.port, "API server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                tracing::info!("shutting down API server");
            })
            .await
            .map_err(|e| crate::Error::Config(format!("API server error: {e}")))?;

        Ok(())
    }
}
