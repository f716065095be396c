//! Runtime configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::constants;

/// Process-wide configuration, resolved once by the binary
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Where connector cursors are persisted
    pub context_dir: PathBuf,

    /// Replaces every vendor's own request timeout when set
    pub request_timeout_override: Option<Duration>,

    /// Alerts allowed per rule and environment in one connector cycle (0 = unlimited)
    pub overflow_limit: usize,

    /// Log filter used when RUST_LOG is not set
    pub log_filter: String,
}

impl RuntimeConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            context_dir: constants::get_context_dir(),
            request_timeout_override: constants::get_request_timeout_override().map(Duration::from_secs),
            overflow_limit: constants::get_overflow_limit(),
            log_filter: std::env::var("SOAR_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            context_dir: constants::get_context_dir(),
            request_timeout_override: None,
            overflow_limit: constants::DEFAULT_OVERFLOW_LIMIT,
            log_filter: "info".to_string(),
        }
    }
}
