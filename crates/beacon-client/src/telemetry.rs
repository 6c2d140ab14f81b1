//! Diagnostics for the `beacon` binary.
//!
//! Command output goes to stdout; every log line goes to stderr so replies
//! can be piped. The configured filter applies as-is, and `--verbose` on a
//! readiness command adds a directive that lets probe outcomes through even
//! when the base filter is `warn`.

use std::io::{self, IsTerminal};

use beacon_config::{Config, LogFormat};
use once_cell::sync::OnceCell;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static INSTALLED: OnceCell<()> = OnceCell::new();

const VERBOSE_DIRECTIVE: &str = concat!(env!("CARGO_PKG_NAME"), "::probe=info");

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Filter and format chosen for one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetrySettings {
    filter: String,
    format: LogFormat,
    verbose: bool,
}

impl TelemetrySettings {
    /// Takes filter and format from configuration, without verbosity.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            filter: config.log_filter().to_owned(),
            format: config.log_format(),
            verbose: false,
        }
    }

    /// Lets probe outcomes through regardless of the base filter.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Builds the filter, including the verbose directive when requested.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Filter`] when the configured expression does
    /// not parse.
    pub fn env_filter(&self) -> Result<EnvFilter, TelemetryError> {
        let invalid = |error: tracing_subscriber::filter::ParseError| {
            TelemetryError::Filter(error.to_string())
        };
        let filter = EnvFilter::try_new(&self.filter).map_err(invalid)?;
        if !self.verbose {
            return Ok(filter);
        }
        Ok(filter.add_directive(VERBOSE_DIRECTIVE.parse().map_err(invalid)?))
    }
}

/// Installs the global subscriber for this process.
///
/// Only the first successful call installs anything; later calls are no-ops,
/// so their settings are ignored.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter and
/// [`TelemetryError::Subscriber`] when a subscriber from elsewhere is
/// already installed.
pub fn initialise(settings: &TelemetrySettings) -> Result<(), TelemetryError> {
    INSTALLED.get_or_try_init(|| install(settings)).map(|_| ())
}

fn install(settings: &TelemetrySettings) -> Result<(), TelemetryError> {
    let stderr_is_terminal = io::stderr().is_terminal();
    let layer = fmt::Subscriber::builder()
        .with_env_filter(settings.env_filter()?)
        .with_writer(io::stderr)
        .with_ansi(stderr_is_terminal)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true);
    let result = match settings.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(layer.json().flatten_event(true).finish())
        }
        LogFormat::Compact => tracing::subscriber::set_global_default(layer.compact().finish()),
    };
    result.map_err(TelemetryError::Subscriber)
}
