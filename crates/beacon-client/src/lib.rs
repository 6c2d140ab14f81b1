//! Reliable request-reply client for a long-running worker server.
//!
//! The crate sends JSON command envelopes over ZeroMQ `DEALER` sockets using
//! a "Lazy Pirate" style loop: every attempt waits a bounded time for the
//! reply and re-sends on silence until a retry budget runs out. Sockets are
//! pooled per endpoint by a [`ConnectionRegistry`], replies can pin later
//! requests to the backend worker that served them, and a readiness probe
//! reports when a freshly started server begins answering.
//!
//! The `beacon` binary wraps the library; [`run`] is its entry point and can
//! be driven from tests with in-memory output streams.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use beacon_config::Config;
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};

mod cli;
mod client;
mod config;
mod errors;
mod probe;
pub mod protocol;
pub mod registry;
pub mod telemetry;
pub mod transport;


pub use beacon_config::Endpoint;
pub use beacon_envelope::{Request, Response, WorkerAffinity};
pub use client::{Client, ClientSettings};
pub use errors::{ClientError, ReplyFrame, Unreachable, UnreachableCause};
pub use probe::{PING_COMMAND, ProbeSettings, ProcessDescriptor, ReadinessState, startup_retries};
pub use protocol::{Cancellation, SendOptions};
pub use registry::{Connection, ConnectionRegistry};
pub use telemetry::{TelemetryError, TelemetrySettings};
pub use transport::{
    FrameSocket, PollOutcome, SocketFactory, TransportError, ZmqDealer, ZmqSocketFactory,
};

use cli::{Cli, CliCommand};
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use errors::AppError;

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let result = prepare(args, &OrthoConfigLoader).and_then(|(command, config)| {
        let client = Client::from_config(&config);
        install_signal_handlers(client.cancellation())?;
        execute(command, &config, client, stdout)
    });
    finish(result, stdout, stderr)
}

/// Runs the CLI with a substitute configuration loader and socket factory.
#[cfg(test)]
pub(crate) fn run_with<I, W, E, L, F>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
    factory: F,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
    F: SocketFactory,
{
    let result = prepare(args, loader).and_then(|(command, config)| {
        let client = Client::with_factory(factory, ClientSettings::from_config(&config));
        execute(command, &config, client, stdout)
    });
    finish(result, stdout, stderr)
}

fn prepare<I, L>(args: I, loader: &L) -> Result<(CliCommand, Config), AppError>
where
    I: IntoIterator<Item = OsString>,
    L: ConfigLoader,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);
    let cli = Cli::try_parse_from(split.command_arguments(&args)).map_err(AppError::CliUsage)?;
    let config = loader.load(&split.config_arguments)?;
    let telemetry = TelemetrySettings::from_config(&config).verbose(cli.command.verbose());
    telemetry::initialise(&telemetry)?;
    Ok((cli.command, config))
}

fn install_signal_handlers(cancellation: &Cancellation) -> Result<(), AppError> {
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register(signal, cancellation.flag())
            .map_err(AppError::SignalHandlers)?;
    }
    Ok(())
}

fn execute<F, W>(
    command: CliCommand,
    config: &Config,
    mut client: Client<F>,
    stdout: &mut W,
) -> Result<ExitCode, AppError>
where
    F: SocketFactory,
    W: Write,
{
    let outcome = match command {
        CliCommand::Ping { quiet, verbose } => {
            let process = ProcessDescriptor {
                verbose,
                quiet,
                ..ProcessDescriptor::from_config(config)
            };
            client
                .check_for_connection_default(&process)
                .map_err(AppError::from)
                .and_then(|reachable| report_readiness(&process, reachable, stdout))
        }
        CliCommand::Wait {
            timeout_secs,
            quiet,
            verbose,
        } => {
            let defaults = ProcessDescriptor::from_config(config);
            let process = ProcessDescriptor {
                startup_timeout_secs: timeout_secs.unwrap_or(defaults.startup_timeout_secs),
                verbose,
                quiet,
                ..defaults
            };
            client
                .wait_for_connection(&process)
                .map_err(AppError::from)
                .and_then(|reachable| report_readiness(&process, reachable, stdout))
        }
        CliCommand::Send {
            command,
            body,
            options,
            worker,
            timeout_ms,
            retries,
        } => build_request(command, body, options, worker).and_then(|request| {
            let send_options = SendOptions::new(
                timeout_ms.map_or_else(|| config.request_timeout(), Duration::from_millis),
                retries.unwrap_or(config.request_retries()),
            );
            let response = client.send_with(config.server_endpoint(), &request, send_options)?;
            let rendered = serde_json::to_string(&response.to_json_value())
                .map_err(AppError::SerialiseResponse)?;
            writeln!(stdout, "{rendered}").map_err(AppError::Output)?;
            Ok(exit_code(response.success))
        }),
    };
    client.shutdown();
    outcome
}

fn build_request(
    command: String,
    body: Option<String>,
    options: Option<String>,
    worker: Option<WorkerAffinity>,
) -> Result<Request, AppError> {
    let mut request = Request::new(command).with_worker(worker.unwrap_or_default());
    if let Some(body) = body {
        request = request.with_body(body);
    }
    if let Some(options) = options {
        let value = serde_json::from_str(&options).map_err(AppError::InvalidOptions)?;
        request = request.with_options(value);
    }
    Ok(request)
}

fn report_readiness<W: Write>(
    process: &ProcessDescriptor,
    reachable: bool,
    stdout: &mut W,
) -> Result<ExitCode, AppError> {
    if !process.quiet {
        let state = if reachable { "reachable" } else { "unreachable" };
        writeln!(stdout, "{} at {} is {state}", process.kind, process.endpoint)
            .map_err(AppError::Output)?;
    }
    Ok(exit_code(reachable))
}

const fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn finish<W: Write, E: Write>(
    result: Result<ExitCode, AppError>,
    stdout: &mut W,
    stderr: &mut E,
) -> ExitCode {
    match result {
        // Help and version requests are not failures.
        Err(AppError::CliUsage(error)) if !error.use_stderr() => {
            let _ = write!(stdout, "{error}");
            ExitCode::SUCCESS
        }
        Ok(exit_code) => exit_code,
        Err(error) => {
            let _ = writeln!(stderr, "{error}");
            ExitCode::FAILURE
        }
    }
}
