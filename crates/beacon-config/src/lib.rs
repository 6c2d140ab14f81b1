//! Shared configuration for the Beacon client.
//!
//! Settings are layered by `ortho_config`: built-in defaults, then an optional
//! configuration file (`--config-path` or `BEACON_CONFIG_PATH`), then
//! `BEACON_*` environment variables, and finally command-line flags. The
//! resulting [`Config`] drives the connection registry, the request-reply
//! protocol, the readiness probe, and telemetry.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod endpoint;
mod logging;

pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_PING_RETRIES, DEFAULT_PING_TIMEOUT_MS, DEFAULT_REQUEST_RETRIES,
    DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT,
    DEFAULT_STARTUP_POLL_INTERVAL_MS, DEFAULT_STARTUP_TIMEOUT_SECS,
    default_log_filter_string, default_log_format, default_ping_retries, default_ping_timeout_ms,
    default_request_retries, default_request_timeout_ms, default_server_endpoint,
    default_startup_poll_interval_ms, default_startup_timeout_secs,
};
pub use endpoint::{Endpoint, EndpointParseError};
pub use logging::{LogFormat, LogFormatParseError};

/// Runtime configuration shared by the library and the `beacon` binary.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "BEACON")]
pub struct Config {
    /// Endpoint of the worker server (for example `tcp://127.0.0.1:27713`).
    #[serde(default = "default_server_endpoint")]
    pub server_endpoint: Endpoint,
    /// Per-attempt reply timeout for ordinary requests, in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Re-attempts allowed for ordinary requests after the first send.
    #[serde(default = "default_request_retries")]
    pub request_retries: u32,
    /// Per-attempt timeout used by the immediate liveness check.
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,
    /// Re-attempts allowed by the immediate liveness check.
    #[serde(default = "default_ping_retries")]
    pub ping_retries: u32,
    /// Polling interval used while waiting for a server to start.
    #[serde(default = "default_startup_poll_interval_ms")]
    pub startup_poll_interval_ms: u64,
    /// Wall-clock window granted to a starting server, in seconds.
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
    /// Closes connections left unused for this many seconds.
    #[serde(default)]
    pub connection_idle_secs: Option<u64>,
    /// Tracing filter expression such as `info` or `beacon_client=debug`.
    #[serde(default = "default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log events.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_endpoint: default_server_endpoint(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            request_retries: DEFAULT_REQUEST_RETRIES,
            ping_timeout_ms: DEFAULT_PING_TIMEOUT_MS,
            ping_retries: DEFAULT_PING_RETRIES,
            startup_poll_interval_ms: DEFAULT_STARTUP_POLL_INTERVAL_MS,
            startup_timeout_secs: DEFAULT_STARTUP_TIMEOUT_SECS,
            connection_idle_secs: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Endpoint of the worker server.
    #[must_use]
    pub fn server_endpoint(&self) -> &Endpoint {
        &self.server_endpoint
    }

    /// Per-attempt reply timeout for ordinary requests.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Re-attempt budget for ordinary requests.
    #[must_use]
    pub const fn request_retries(&self) -> u32 {
        self.request_retries
    }

    /// Per-attempt timeout for the immediate liveness check.
    #[must_use]
    pub const fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    /// Re-attempt budget for the immediate liveness check.
    #[must_use]
    pub const fn ping_retries(&self) -> u32 {
        self.ping_retries
    }

    /// Interval between readiness polls while a server starts.
    #[must_use]
    pub const fn startup_poll_interval(&self) -> Duration {
        Duration::from_millis(self.startup_poll_interval_ms)
    }

    /// Wall-clock readiness window in whole seconds.
    #[must_use]
    pub const fn startup_timeout_secs(&self) -> u64 {
        self.startup_timeout_secs
    }

    /// Idle window after which pooled connections are closed, when enabled.
    #[must_use]
    pub fn connection_idle(&self) -> Option<Duration> {
        self.connection_idle_secs.map(Duration::from_secs)
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Output format for log events.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
