//! Quire Server
//!
//! HTTP surface for the friend-relationship engine. Resolves the calling
//! principal from a JWT bearer token and maps each relationship operation
//! onto a JSON endpoint.

#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod session;

use config::ServerConfig;
use handlers::{create_router, AppState};
use quire_social::RelationshipService;
use quire_store::{SqliteStore, StoreError};
use session::SessionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Server error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Database could not be opened
    #[error("Failed to open store: {0}")]
    Store(#[from] StoreError),

    /// Server binding error
    #[error("Failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// Server error
    #[error("Server error: {0}")]
    Server(String),
}

/// Build the application state for `config`
pub fn build_state(config: &ServerConfig) -> Result<AppState, ServerError> {
    let store = SqliteStore::new(&config.database_path)?;
    let service = RelationshipService::new(store, config.service_config());

    Ok(AppState {
        session_manager: Arc::new(SessionManager::new(
            &config.jwt_secret,
            config.token_expiry_secs,
        )),
        service: Arc::new(service),
        allow_id_sessions: config.allow_id_sessions,
    })
}

/// Start the HTTP server
///
/// Opens the store, builds the relationship service, and serves until
/// Ctrl+C is received.
pub async fn start_server(config: ServerConfig) -> Result<(), ServerError> {
    info!("Starting Quire server");
    info!("Bind address: {}", config.bind_addr());
    info!("Database: {}", config.database_path);
    info!("Token expiry: {} seconds", config.token_expiry_secs);
    info!("Store timeout: {} ms", config.store_timeout_ms);
    if config.allow_id_sessions {
        warn!("Id-based session establishment is enabled");
    }

    let app = create_router(build_state(&config)?);

    let listener = TcpListener::bind(&config.bind_addr()).await?;
    info!("Server listening on {}", config.bind_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServerError::Server(e.to_string()))?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
