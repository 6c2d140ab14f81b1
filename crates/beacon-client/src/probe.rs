//! Readiness probe for freshly started servers.
//!
//! A probe is an ordinary request carrying the `ping` command with a short
//! timeout. Unlike [`Client::send`], the probe treats an unreachable server as
//! a normal answer (`false`) rather than an error.

use std::time::Duration;

use beacon_config::{
    Config, DEFAULT_PING_RETRIES, DEFAULT_PING_TIMEOUT_MS, DEFAULT_STARTUP_POLL_INTERVAL_MS,
    Endpoint,
};
use beacon_envelope::Request;
use tracing::{debug, info};

use crate::client::Client;
use crate::errors::ClientError;
use crate::protocol::SendOptions;
use crate::transport::SocketFactory;

const PROBE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::probe");

/// Command sent by every probe.
pub const PING_COMMAND: &str = "ping";

const DEFAULT_PROCESS_KIND: &str = "server";

/// Logical server instance being probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDescriptor {
    /// Where the server listens.
    pub endpoint: Endpoint,
    /// Operating-system process id, when the caller launched it.
    pub pid: Option<u32>,
    /// Free-form label used in log output.
    pub kind: String,
    /// How long [`Client::wait_for_connection`] keeps probing.
    pub startup_timeout_secs: u64,
    /// Log probe outcomes at `info`.
    pub verbose: bool,
    /// Suppress human-readable CLI output.
    pub quiet: bool,
}

impl ProcessDescriptor {
    /// Describes a server at `endpoint` with the default startup timeout.
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            pid: None,
            kind: DEFAULT_PROCESS_KIND.to_owned(),
            startup_timeout_secs: beacon_config::DEFAULT_STARTUP_TIMEOUT_SECS,
            verbose: false,
            quiet: false,
        }
    }

    /// Describes the configured server.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            startup_timeout_secs: config.startup_timeout_secs(),
            ..Self::new(config.server_endpoint().clone())
        }
    }
}

/// Timing used by the probe operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSettings {
    /// Wait per ping attempt for [`Client::check_for_connection_default`].
    pub ping_timeout: Duration,
    /// Re-sends for [`Client::check_for_connection_default`].
    pub ping_retries: u32,
    /// Interval between readiness polls while waiting for startup.
    pub startup_poll_interval: Duration,
}

impl ProbeSettings {
    /// Reads probe timing from configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            ping_timeout: config.ping_timeout(),
            ping_retries: config.ping_retries(),
            startup_poll_interval: config.startup_poll_interval(),
        }
    }
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ping_timeout: Duration::from_millis(DEFAULT_PING_TIMEOUT_MS),
            ping_retries: DEFAULT_PING_RETRIES,
            startup_poll_interval: Duration::from_millis(DEFAULT_STARTUP_POLL_INTERVAL_MS),
        }
    }
}

/// Outcome of a single readiness probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// No probe has produced an answer.
    Unknown,
    /// The server answered the ping successfully.
    Reachable,
    /// The server did not answer, or answered with a failure.
    Unreachable,
}

impl From<bool> for ReadinessState {
    fn from(reachable: bool) -> Self {
        if reachable {
            Self::Reachable
        } else {
            Self::Unreachable
        }
    }
}

/// Converts a startup timeout into a retry budget for polls of `interval`.
///
/// The interval is clamped to at least one millisecond; the arithmetic is
/// integer and saturating.
///
/// ```
/// use std::time::Duration;
/// use beacon_client::startup_retries;
///
/// assert_eq!(startup_retries(4, Duration::from_millis(250)), 16);
/// ```
#[must_use]
pub fn startup_retries(timeout_secs: u64, interval: Duration) -> u32 {
    let interval_ms = interval.as_millis().max(1);
    let per_second = 1000 / interval_ms;
    let retries = u128::from(timeout_secs).saturating_mul(per_second);
    u32::try_from(retries).unwrap_or(u32::MAX)
}

impl<F: SocketFactory> Client<F> {
    /// Pings `process` and reports whether it answered successfully.
    ///
    /// # Errors
    ///
    /// Unreachability yields `Ok(false)`. Transport setup and encoding
    /// failures are returned as errors.
    pub fn check_for_connection(
        &mut self,
        process: &ProcessDescriptor,
        timeout: Duration,
        retries: u32,
    ) -> Result<bool, ClientError> {
        let request = Request::new(PING_COMMAND);
        let options = SendOptions::new(timeout, retries);
        let reachable = match self.send_with(&process.endpoint, &request, options) {
            Ok(response) => response.success,
            Err(ClientError::Unreachable(error)) => {
                debug!(target: PROBE_TARGET, kind = %process.kind, %error, "probe unanswered");
                false
            }
            Err(error) => return Err(error),
        };
        if process.verbose {
            info!(
                target: PROBE_TARGET,
                kind = %process.kind,
                endpoint = %process.endpoint,
                pid = ?process.pid,
                reachable,
                "readiness probe finished"
            );
        }
        Ok(reachable)
    }

    /// Pings `process` using the configured ping timeout and retries.
    ///
    /// # Errors
    ///
    /// See [`Client::check_for_connection`].
    pub fn check_for_connection_default(
        &mut self,
        process: &ProcessDescriptor,
    ) -> Result<bool, ClientError> {
        let probe = self.settings().probe;
        self.check_for_connection(process, probe.ping_timeout, probe.ping_retries)
    }

    /// Polls `process` until it answers or its startup timeout elapses.
    ///
    /// # Errors
    ///
    /// See [`Client::check_for_connection`].
    pub fn wait_for_connection(&mut self, process: &ProcessDescriptor) -> Result<bool, ClientError> {
        let interval = self.settings().probe.startup_poll_interval.max(Duration::from_millis(1));
        let retries = startup_retries(process.startup_timeout_secs, interval);
        debug!(
            target: PROBE_TARGET,
            kind = %process.kind,
            endpoint = %process.endpoint,
            interval = ?interval,
            retries,
            "waiting for server"
        );
        self.check_for_connection(process, interval, retries)
    }

    /// Probes `process` once with the default settings.
    ///
    /// # Errors
    ///
    /// See [`Client::check_for_connection`].
    pub fn probe_state(&mut self, process: &ProcessDescriptor) -> Result<ReadinessState, ClientError> {
        self.check_for_connection_default(process)
            .map(ReadinessState::from)
    }
}
