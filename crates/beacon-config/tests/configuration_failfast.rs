//! Broken configuration sources must stop loading with an error that names
//! what is wrong and, for unreadable files, where.

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use beacon_config::Config;
use once_cell::sync::Lazy;
use ortho_config::{OrthoConfig, OrthoError};
use rstest::{fixture, rstest};
use tempfile::TempDir;

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Serialises environment access and restores every touched variable on drop.
struct ScopedEnv {
    restore: Vec<(&'static str, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl ScopedEnv {
    fn set(&mut self, key: &'static str, value: &OsStr) {
        self.restore.push((key, std::env::var_os(key)));
        unsafe { std::env::set_var(key, value) };
    }

    fn clear(&mut self, key: &'static str) {
        self.restore.push((key, std::env::var_os(key)));
        unsafe { std::env::remove_var(key) };
    }
}

impl Drop for ScopedEnv {
    fn drop(&mut self) {
        for (key, previous) in self.restore.drain(..).rev() {
            match previous {
                Some(value) => unsafe { std::env::set_var(key, value) },
                None => unsafe { std::env::remove_var(key) },
            }
        }
    }
}

#[fixture]
fn env() -> ScopedEnv {
    let guard = ENV_MUTEX
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let mut env = ScopedEnv {
        restore: Vec::new(),
        _guard: guard,
    };
    env.clear("BEACON_CONFIG_PATH");
    env
}

#[fixture]
fn dir() -> TempDir {
    TempDir::new().expect("create temp dir")
}

fn write_config(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).expect("write config file");
    path
}

fn load_with_file(path: &Path) -> Result<Config, std::sync::Arc<OrthoError>> {
    Config::load_from_iter([
        OsString::from("beacon"),
        OsString::from("--config-path"),
        path.as_os_str().to_owned(),
    ])
}

#[rstest]
fn every_unreadable_file_is_reported(mut env: ScopedEnv, dir: TempDir) {
    let cli_path = write_config(
        &dir,
        "flag.toml",
        r#"server_endpoint = { host = "127.0.0.1" port = 1 }"#,
    );
    let env_path = write_config(&dir, "variable.toml", "request_retries = [");
    env.set("BEACON_CONFIG_PATH", env_path.as_os_str());

    let error = load_with_file(&cli_path).expect_err("both files are unreadable");
    let OrthoError::Aggregate(aggregate) = error.as_ref() else {
        panic!("expected one aggregated error, got {error:?}");
    };
    assert!(
        error.to_string().contains("multiple configuration errors"),
        "unexpected message: {error}"
    );

    let mut reported = aggregate
        .iter()
        .filter_map(|entry| match entry {
            OrthoError::File { path, .. } => Some(path.clone()),
            _ => None,
        })
        .collect::<Vec<_>>();
    reported.sort();
    let mut expected = vec![cli_path, env_path];
    expected.sort();
    assert_eq!(reported, expected);
}

#[rstest]
#[case::http(r#"server_endpoint = "http://127.0.0.1:80""#, "unsupported endpoint scheme 'http'")]
#[case::ipc(r#"server_endpoint = "ipc:///tmp/beacon.sock""#, "unsupported endpoint scheme 'ipc'")]
#[case::no_port(r#"server_endpoint = "tcp://127.0.0.1""#, "missing port")]
fn endpoint_rejected_in_a_file_names_the_problem(
    env: ScopedEnv,
    dir: TempDir,
    #[case] contents: &str,
    #[case] expected: &str,
) {
    let path = write_config(&dir, "beacon.toml", contents);
    let error = load_with_file(&path).expect_err("endpoint is rejected");
    let message = error.to_string();
    assert!(message.contains(expected), "unexpected message: {message}");
    drop(env);
}

#[rstest]
#[case::scheme("http://127.0.0.1:80")]
#[case::port("tcp://127.0.0.1")]
fn endpoint_rejected_on_the_command_line(env: ScopedEnv, #[case] value: &str) {
    let result = Config::load_from_iter([
        OsString::from("beacon"),
        OsString::from("--server-endpoint"),
        OsString::from(value),
    ]);
    assert!(result.is_err(), "accepted {value:?}");
    drop(env);
}
