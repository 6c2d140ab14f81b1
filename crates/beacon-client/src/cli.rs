//! Command-line argument definitions for the `beacon` binary.

use beacon_envelope::WorkerAffinity;
use clap::{Parser, Subcommand};

/// Command-line interface for probing and calling a worker server.
///
/// Configuration flags such as `--server-endpoint` precede the subcommand
/// and are handled by the configuration loader.
#[derive(Parser, Debug)]
#[command(name = "beacon", disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Operations offered by the CLI.
#[derive(Subcommand, Debug, Clone)]
pub(crate) enum CliCommand {
    /// Checks once whether the server answers a ping.
    Ping {
        /// Suppresses the human-readable outcome line.
        #[arg(long, short)]
        quiet: bool,
        /// Logs the probe outcome at info level.
        #[arg(long, short)]
        verbose: bool,
    },
    /// Polls the server until it answers or the startup timeout elapses.
    Wait {
        /// Overrides the configured startup timeout.
        #[arg(long, value_name = "SECONDS")]
        timeout_secs: Option<u64>,
        /// Suppresses the human-readable outcome line.
        #[arg(long, short)]
        quiet: bool,
        /// Logs the probe outcome at info level.
        #[arg(long, short)]
        verbose: bool,
    },
    /// Sends one command and prints the reply as JSON.
    Send {
        /// Command name carried in the final request frame.
        #[arg(value_name = "COMMAND")]
        command: String,
        /// Free-form request body.
        #[arg(long)]
        body: Option<String>,
        /// Command options as a JSON document.
        #[arg(long, value_name = "JSON")]
        options: Option<String>,
        /// Worker address, in hex, returned by an earlier reply.
        #[arg(long, value_name = "HEX")]
        worker: Option<WorkerAffinity>,
        /// Overrides the configured per-attempt timeout.
        #[arg(long, value_name = "MILLISECONDS")]
        timeout_ms: Option<u64>,
        /// Overrides the configured retry budget.
        #[arg(long)]
        retries: Option<u32>,
    },
}

impl CliCommand {
    /// Whether the invocation asked for probe outcomes in the log.
    pub(crate) const fn verbose(&self) -> bool {
        match self {
            Self::Ping { verbose, .. } | Self::Wait { verbose, .. } => *verbose,
            Self::Send { .. } => false,
        }
    }
}
