//! Configuration for the relationship service

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for [`crate::RelationshipService`]
///
/// # Examples
///
/// ```
/// use quire_social::ServiceConfig;
///
/// let config = ServiceConfig::default();
/// assert_eq!(config.store_timeout_ms, 5000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Upper bound on a single store call (in milliseconds)
    ///
    /// A call that exceeds it is reported as an internal error and its
    /// outcome is unknown to the caller.
    /// Default: 5000
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    /// Maximum results returned by directory search
    /// Default: 50
    #[serde(default = "default_search_limit")]
    pub max_search_results: usize,
}

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_search_limit() -> usize {
    50
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: default_store_timeout_ms(),
            max_search_results: default_search_limit(),
        }
    }
}

impl ServiceConfig {
    /// Store call timeout as a Duration
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Override the store call timeout
    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = timeout.as_millis() as u64;
        self
    }
}
