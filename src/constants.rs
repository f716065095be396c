//! Central Configuration Constants
//!
//! Single source of truth for runtime defaults shared by every integration.
//! Vendor specific values (API roots, retry budgets) live next to each client.

use std::path::PathBuf;

/// App version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// App name
pub const APP_NAME: &str = "soar-integrations";

/// Per-request timeout for sessions that do not set their own (seconds)
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Default script timeout for connectors (seconds)
pub const DEFAULT_SCRIPT_TIMEOUT: u64 = 180;

/// Fraction of the script timeout after which a connector stops picking up new records
pub const TIMEOUT_THRESHOLD: f64 = 0.9;

/// Default lookback window for a connector's first run (hours)
pub const DEFAULT_MAX_HOURS_BACKWARDS: i64 = 1;

/// Default number of alerts a connector emits per rule and environment in one cycle (0 = unlimited)
pub const DEFAULT_OVERFLOW_LIMIT: usize = 0;

/// Context directory name under the local data dir
pub const CONTEXT_DIR: &str = "context";

// ============================================
// Helper functions to read from env with fallback
// ============================================

/// Get the connector context directory from environment or use default
pub fn get_context_dir() -> PathBuf {
    std::env::var("SOAR_CONTEXT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(APP_NAME)
                .join(CONTEXT_DIR)
        })
}

/// Get overflow limit from environment or use default
pub fn get_overflow_limit() -> usize {
    std::env::var("SOAR_OVERFLOW_LIMIT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_OVERFLOW_LIMIT)
}

/// Request timeout forced on every vendor session, if set in the environment
pub fn get_request_timeout_override() -> Option<u64> {
    std::env::var("SOAR_REQUEST_TIMEOUT")
        .ok()
        .and_then(|s| s.parse().ok())
}

/// Check whether scripts print parameter values in the log
pub fn is_param_logging_enabled() -> bool {
    std::env::var("SOAR_LOG_PARAMS")
        .map(|s| s.to_lowercase() == "true" || s == "1")
        .unwrap_or(false)
}
