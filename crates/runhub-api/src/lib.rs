//! HTTP and WebSocket front end for the runhub execution service
//!
//! Every API version is the same set of routes mounted under its own prefix
//! with its own [`ResolutionStrategy`]:
//!
//! - `POST /api/v2/execute`, `GET /api/v2/runtimes`, `GET /api/v2/connect`:
//!   runtimes named by `language` and `version`
//! - `POST /api/v3/execute`, `GET /api/v3/runtimes`, `GET /api/v3/connect`:
//!   runtimes named by `runtime_id`
//!
//! `/connect` upgrades to a WebSocket driven by a
//! [`runhub_core::SessionController`].

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod ws;

pub use error::{ApiError, Result};
pub use handlers::ApiState;
pub use ws::WebSocketTransport;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use runhub_core::{
    ExecutionBackend, LanguageVersion, Registry, ResolutionStrategy, RuntimeId, SessionConfig,
    DEFAULT_INIT_TIMEOUT,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub runtimes: usize,
}

/// Configuration for the runhub server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_addr: SocketAddr,
    /// Enable CORS
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    /// Enable request logging
    pub enable_logging: bool,
    /// How long a `/connect` client has to send `init`
    pub init_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 2000)),
            enable_cors: true,
            cors_origins: None,
            max_body_size: 1024 * 1024,
            enable_logging: true,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Create a new server configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ApiError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    /// Set allowed CORS origins.
    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    /// Enable or disable request logging.
    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }

    /// Set the interactive initialization window.
    pub fn with_init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }
}

/// The runhub HTTP server.
pub struct RunhubServer {
    registry: Arc<Registry>,
    backend: Arc<dyn ExecutionBackend>,
    config: ServerConfig,
}

impl RunhubServer {
    /// Create a new server with custom configuration.
    pub fn with_config(
        registry: Arc<Registry>,
        backend: Arc<dyn ExecutionBackend>,
        config: ServerConfig,
    ) -> Self {
        Self {
            registry,
            backend,
            config,
        }
    }

    fn api_routes(&self, strategy: Arc<dyn ResolutionStrategy>) -> Router {
        let state = ApiState {
            registry: self.registry.clone(),
            backend: self.backend.clone(),
            strategy,
            session: SessionConfig {
                init_timeout: self.config.init_timeout,
            },
        };

        Router::new()
            .route("/execute", post(handlers::execute_handler))
            .route("/runtimes", get(handlers::runtimes_handler))
            .route("/connect", get(handlers::connect_handler))
            .layer(axum::middleware::from_fn(middleware::require_json))
            .with_state(state)
    }

    /// Build the Axum router with all routes and middleware.
    pub fn build_router(&self) -> Router {
        let runtimes = self.registry.len();
        let mut router = Router::new()
            .route(
                "/health",
                get(move || async move {
                    Json(HealthResponse {
                        status: "healthy".to_string(),
                        timestamp: chrono::Utc::now(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        runtimes,
                    })
                }),
            )
            .nest("/api/v2", self.api_routes(Arc::new(LanguageVersion)))
            .nest("/api/v3", self.api_routes(Arc::new(RuntimeId)))
            .layer(DefaultBodyLimit::max(self.config.max_body_size));

        if self.config.enable_logging {
            router = router.layer(axum::middleware::from_fn(middleware::log_requests));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = if let Some(ref origins) = self.config.cors_origins {
                let origins: std::result::Result<Vec<_>, _> =
                    origins.iter().map(|s| s.parse()).collect();
                match origins {
                    Ok(origins) => CorsLayer::new()
                        .allow_origin(origins)
                        .allow_methods(Any)
                        .allow_headers(Any),
                    Err(_) => {
                        log::warn!("Invalid CORS origin configured, allowing any origin");
                        CorsLayer::permissive()
                    }
                }
            } else {
                CorsLayer::permissive()
            };
            router = router.layer(cors_layer);
        }

        router
    }

    async fn bind(&self) -> Result<TcpListener> {
        TcpListener::bind(self.config.bind_addr).await.map_err(|e| {
            ApiError::config_error(format!(
                "Failed to bind to {}: {}",
                self.config.bind_addr, e
            ))
        })
    }

    fn log_endpoints(&self) {
        log::info!(
            "runhub server starting on {} with {} runtime(s) on the {} backend",
            self.config.bind_addr,
            self.registry.len(),
            self.backend.name()
        );
        log::info!("Health check: http://{}/health", self.config.bind_addr);
        for version in ["v2", "v3"] {
            log::info!(
                "API {}: http://{}/api/{}/{{execute,runtimes,connect}}",
                version,
                self.config.bind_addr,
                version
            );
        }
    }

    /// Start the server with graceful shutdown support.
    ///
    /// The server will shut down when the provided shutdown signal is received.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = self.bind().await?;
        self.log_endpoints();

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ApiError::internal(format!("Server error: {}", e)))?;

        log::info!("runhub server shut down gracefully");
        Ok(())
    }
}

/// Utility function to create a shutdown signal from Ctrl+C.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::new()
            .with_bind_addr_str("0.0.0.0:2000")
            .unwrap()
            .with_init_timeout(Duration::from_millis(250))
            .with_cors_origins(vec!["http://localhost:3000".to_string()]);
        assert_eq!(config.bind_addr.port(), 2000);
        assert!(config.enable_cors);
        assert_eq!(config.cors_origins.as_deref().map(<[String]>::len), Some(1));
        assert_eq!(config.init_timeout, Duration::from_millis(250));
        assert!(ServerConfig::new().with_bind_addr_str("nowhere").is_err());
    }
}
