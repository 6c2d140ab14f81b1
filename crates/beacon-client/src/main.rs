//! Entry point for the `beacon` command-line client.
//!
//! The binary delegates to [`beacon_client::run`], which loads configuration,
//! parses the subcommand, and talks to the configured worker server.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    beacon_client::run(std::env::args_os(), &mut stdout, &mut stderr)
}
