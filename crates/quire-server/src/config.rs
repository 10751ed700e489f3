//! Configuration file parsing for the server.
//!
//! Loads settings from TOML files including bind address, JWT secret,
//! token expiry, database location, and store call limits.

use quire_social::ServiceConfig;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Server configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse TOML
    #[error("Failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Missing required field
    #[error("Missing required configuration field: {0}")]
    MissingField(String),
}

/// Server configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1")
    pub bind_address: String,

    /// Bind port (e.g., 8080)
    pub bind_port: u16,

    /// JWT secret for signing tokens
    pub jwt_secret: String,

    /// Token expiry in seconds (default: 3600 = 1 hour)
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,

    /// SQLite database path (default: "quire.db")
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Upper bound on a single store call in milliseconds (default: 5000)
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Maximum directory search results (default: 50)
    #[serde(default = "default_max_search_results")]
    pub max_search_results: usize,

    /// Serve `POST /session/establish`, which issues a token for any
    /// existing identity id without a credential (default: false)
    #[serde(default)]
    pub allow_id_sessions: bool,
}

/// Default token expiry: 1 hour
fn default_token_expiry() -> u64 {
    3600
}

fn default_database_path() -> String {
    "quire.db".to_string()
}

fn default_store_timeout_ms() -> u64 {
    ServiceConfig::default().store_timeout_ms
}

fn default_max_search_results() -> usize {
    ServiceConfig::default().max_search_results
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&contents)?;

        // Validate required fields
        if config.jwt_secret.is_empty() {
            return Err(ConfigError::MissingField("jwt_secret".to_string()));
        }

        Ok(config)
    }

    /// Create a default configuration for testing
    pub fn default_test_config() -> Self {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            bind_port: 8080,
            jwt_secret: "test-secret-key-do-not-use-in-production".to_string(),
            token_expiry_secs: 3600,
            database_path: ":memory:".to_string(),
            store_timeout_ms: default_store_timeout_ms(),
            max_search_results: default_max_search_results(),
            allow_id_sessions: true,
        }
    }

    /// Get the full bind address (address:port)
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.bind_port)
    }

    /// Relationship service settings
    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            store_timeout_ms: self.store_timeout_ms,
            max_search_results: self.max_search_results,
        }
    }
}
