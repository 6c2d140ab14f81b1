use crate::endpoint::Endpoint;
use crate::logging::LogFormat;

/// Host used when no server endpoint is configured.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Port the worker server listens on by default.
pub const DEFAULT_SERVER_PORT: u16 = 27713;

/// Per-attempt reply timeout for ordinary requests.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 2500;

/// Re-attempts granted to ordinary requests before giving up.
pub const DEFAULT_REQUEST_RETRIES: u32 = 3;

/// Per-attempt timeout for the immediate liveness check.
pub const DEFAULT_PING_TIMEOUT_MS: u64 = 100;

/// Re-attempts granted to the immediate liveness check.
pub const DEFAULT_PING_RETRIES: u32 = 5;

/// Interval between readiness polls while a server starts.
pub const DEFAULT_STARTUP_POLL_INTERVAL_MS: u64 = 250;

/// Readiness window granted to a starting server.
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 30;

/// Default log filter expression used by the binary.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binary.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Endpoint of a locally running worker server.
#[must_use]
pub fn default_server_endpoint() -> Endpoint {
    Endpoint::new(DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT)
}

/// Serde default for [`crate::Config::request_timeout_ms`].
#[must_use]
pub const fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

/// Serde default for [`crate::Config::request_retries`].
#[must_use]
pub const fn default_request_retries() -> u32 {
    DEFAULT_REQUEST_RETRIES
}

/// Serde default for [`crate::Config::ping_timeout_ms`].
#[must_use]
pub const fn default_ping_timeout_ms() -> u64 {
    DEFAULT_PING_TIMEOUT_MS
}

/// Serde default for [`crate::Config::ping_retries`].
#[must_use]
pub const fn default_ping_retries() -> u32 {
    DEFAULT_PING_RETRIES
}

/// Serde default for [`crate::Config::startup_poll_interval_ms`].
#[must_use]
pub const fn default_startup_poll_interval_ms() -> u64 {
    DEFAULT_STARTUP_POLL_INTERVAL_MS
}

/// Serde default for [`crate::Config::startup_timeout_secs`].
#[must_use]
pub const fn default_startup_timeout_secs() -> u64 {
    DEFAULT_STARTUP_TIMEOUT_SECS
}
