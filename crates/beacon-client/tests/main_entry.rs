//! Integration tests for the `beacon` binary entry point.
//!
//! Covers usage errors, option validation, the readiness output against an
//! endpoint where nothing listens, and verbose readiness logging.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use rstest::rstest;

const UNUSED_ENDPOINT: &str = "tcp://127.0.0.1:9";

#[test]
fn missing_subcommand_exits_with_failure() {
    let mut command = cargo_bin_cmd!("beacon");
    command.assert().failure().stderr(contains("Usage"));
}

#[test]
fn help_lists_the_subcommands() {
    let mut command = cargo_bin_cmd!("beacon");
    command.arg("--help");
    command
        .assert()
        .success()
        .stdout(contains("ping"))
        .stdout(contains("wait"))
        .stdout(contains("send"));
}

#[test]
fn invalid_options_json_is_rejected_before_sending() {
    let mut command = cargo_bin_cmd!("beacon");
    command.args([
        "--server-endpoint",
        UNUSED_ENDPOINT,
        "send",
        "score",
        "--options",
        "{broken",
    ]);
    command
        .assert()
        .failure()
        .stderr(contains("request options must be valid JSON"));
}

#[test]
fn invalid_worker_hex_is_a_usage_error() {
    let mut command = cargo_bin_cmd!("beacon");
    command.args(["send", "score", "--worker", "not-hex"]);
    command
        .assert()
        .failure()
        .stderr(contains("not valid hex"));
}

#[test]
fn ping_reports_an_absent_server() {
    let mut command = cargo_bin_cmd!("beacon");
    command.args([
        "--server-endpoint",
        UNUSED_ENDPOINT,
        "--ping-timeout-ms",
        "20",
        "--ping-retries",
        "1",
        "ping",
    ]);
    command
        .assert()
        .failure()
        .stdout(contains("server at tcp://127.0.0.1:9 is unreachable"));
}

#[test]
fn send_reports_an_absent_server_on_stderr() {
    let mut command = cargo_bin_cmd!("beacon");
    command.args([
        "--server-endpoint",
        UNUSED_ENDPOINT,
        "send",
        "score",
        "--timeout-ms",
        "20",
        "--retries",
        "0",
    ]);
    command
        .assert()
        .failure()
        .stderr(contains("server is down"));
}

#[rstest]
#[case::verbose(&["ping", "--verbose"], true)]
#[case::default(&["ping"], false)]
fn verbose_ping_logs_the_outcome_on_stderr(#[case] tail: &[&str], #[case] logged: bool) {
    let mut command = cargo_bin_cmd!("beacon");
    command
        .env_remove("BEACON_LOG_FILTER")
        .args([
            "--server-endpoint",
            UNUSED_ENDPOINT,
            "--ping-timeout-ms",
            "20",
            "--ping-retries",
            "0",
        ])
        .args(tail);
    let outcome = command.assert().failure();
    if logged {
        outcome.stderr(contains("readiness probe finished"));
    } else {
        outcome.stderr(contains("readiness probe finished").not());
    }
}
