//! Axum server setup
//!
//! Server skeleton with:
//! - Optional permissive CORS
//! - Tracing middleware
//! - Optional gating of the listener on database readiness
//! - Graceful shutdown on SIGTERM/Ctrl+C

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::error::ApiError;
use super::routes;
use crate::db::UserStore;
use crate::startup::{ConnectionState, Readiness};

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (default: 0.0.0.0:3000)
    pub bind_addr: SocketAddr,

    /// Allow any origin (default: false = no CORS headers)
    pub cors_permissive: bool,

    /// Bind only after the startup sequencer settles (default: false)
    ///
    /// When false the listener binds immediately and data routes answer 500
    /// until the database is ready.
    pub wait_for_ready: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            cors_permissive: false,
            wait_for_ready: false,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn UserStore>,
    readiness: Readiness,
}

impl AppState {
    pub fn new(store: Arc<dyn UserStore>, readiness: Readiness) -> Self {
        Self { store, readiness }
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    /// The user store, once the sequencer has reported `Ready`.
    pub fn store(&self) -> Result<&dyn UserStore, ApiError> {
        match self.readiness.state() {
            ConnectionState::Ready => Ok(self.store.as_ref()),
            state => Err(ApiError::Unavailable { state }),
        }
    }
}

/// Build the application router with all routes
pub fn build_router(state: AppState, cors_permissive: bool) -> Router {
    let cors = if cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled - all origins allowed");
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .merge(routes::health::router())
        .merge(routes::users::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}

/// Run the HTTP server until Ctrl+C or SIGTERM.
///
/// # Example
///
/// ```ignore
/// let state = AppState::new(store, readiness);
/// run_server(state, ServerConfig::default()).await?;
/// ```
pub async fn run_server(state: AppState, config: ServerConfig) -> Result<(), ServerError> {
    run_server_until(state, config, shutdown_signal()).await
}

/// Run the HTTP server until `shutdown` resolves.
pub async fn run_server_until<F>(
    state: AppState,
    config: ServerConfig,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let mut shutdown = Box::pin(shutdown);

    if config.wait_for_ready {
        tracing::info!("Waiting for database before binding listener");
        tokio::select! {
            settled = state.readiness().settled() => {
                tracing::info!(state = %settled, "Database startup settled");
            }
            () = &mut shutdown => {
                tracing::info!("Shutdown requested before listener was bound");
                return Ok(());
            }
        }
    }

    let app = build_router(state, config.cors_permissive);

    // Bind listener
    let listener = TcpListener::bind(config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    // Run with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(%err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting shutdown");
        }
    }
}

/// Server error type
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
