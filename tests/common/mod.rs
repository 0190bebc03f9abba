//! Shared integration-test harness for running the `cachetx` binary as a
//! child process against YAML fixtures.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Helpers for invoking the `cachetx` binary.
pub struct CacheTxProcess;

impl CacheTxProcess {
    /// Runs `cachetx` with `args` to completion and captures its output.
    ///
    /// Log output is silenced unless a test opts in with `-v`.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command(args: &[&str]) -> Output {
        Self::spawn_command_with_env(args, &[])
    }

    /// Like [`spawn_command`](Self::spawn_command) with extra environment
    /// variables set on the child.
    #[allow(clippy::missing_panics_doc)]
    pub fn spawn_command_with_env(args: &[&str], env: &[(&str, &str)]) -> Output {
        let bin = env!("CARGO_BIN_EXE_cachetx");
        let mut command = Command::new(bin);
        command
            .args(args)
            .env_remove("CACHETX_CONFIG")
            .env_remove("CACHETX_EVENTS_FILE")
            .env_remove("CACHETX_LOG_LEVEL")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in env {
            command.env(key, value);
        }
        command.output().expect("failed to run cachetx")
    }

    /// Returns the path to a test fixture.
    #[must_use]
    pub fn fixture_path(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name)
    }

    /// Returns a fixture path as `&str`-compatible `String`.
    #[must_use]
    pub fn fixture(name: &str) -> String {
        Self::fixture_path(name)
            .to_str()
            .expect("non-UTF-8 fixture path")
            .to_string()
    }
}

/// Captured stdout as a string.
#[must_use]
pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Captured stderr as a string.
#[must_use]
pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
