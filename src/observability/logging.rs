//! Log setup for the `cachetx` binary.
//!
//! Logs always go to stderr; stdout carries only command output. The
//! `-v` flags raise the level of this crate's own targets and leave
//! dependencies at `warn` until `-vvv`. A non-empty `CACHETX_LOG_LEVEL`
//! replaces the computed filter outright.

use std::io::IsTerminal;

use clap::ValueEnum;
use tracing_subscriber::EnvFilter;

use crate::cli::args::ColorChoice;

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_LEVEL_ENV: &str = "CACHETX_LOG_LEVEL";

/// Target prefix shared by every span and event this crate emits.
const CRATE_TARGET: &str = env!("CARGO_CRATE_NAME");

/// How log lines are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    /// Compact text, coloured when stderr is a terminal.
    #[default]
    Human,
    /// One JSON object per line with event fields at the top level.
    Json,
}

/// Filter directive for a `-v` count.
#[must_use]
pub fn default_directive(verbosity: u8) -> String {
    match verbosity {
        0 => "warn".to_string(),
        1 => format!("warn,{CRATE_TARGET}=info"),
        2 => format!("warn,{CRATE_TARGET}=debug"),
        _ => "trace".to_string(),
    }
}

/// Whether human-format logs should carry ANSI colour codes.
#[must_use]
pub const fn use_ansi(color: ColorChoice, stderr_is_terminal: bool, no_color: bool) -> bool {
    match color {
        ColorChoice::Auto => stderr_is_terminal && !no_color,
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    }
}

fn build_filter(verbosity: u8) -> EnvFilter {
    let fallback = || EnvFilter::new(default_directive(verbosity));
    match std::env::var(LOG_LEVEL_ENV) {
        Ok(raw) if !raw.trim().is_empty() => EnvFilter::try_new(&raw).unwrap_or_else(|err| {
            // No subscriber exists yet, so this cannot go through tracing.
            eprintln!("warning: ignoring {LOG_LEVEL_ENV}={raw:?}: {err}");
            fallback()
        }),
        _ => fallback(),
    }
}

/// Installs the global subscriber.
///
/// Later calls are ignored, which keeps tests that share a process safe.
pub fn init_logging(format: LogFormat, verbosity: u8, color: ColorChoice) {
    let filter = build_filter(verbosity);

    match format {
        LogFormat::Human => {
            let ansi = use_ansi(
                color,
                std::io::stderr().is_terminal(),
                std::env::var_os("NO_COLOR").is_some(),
            );
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(ansi)
                .with_target(verbosity >= 2)
                .with_writer(std::io::stderr)
                .try_init();
        }
        LogFormat::Json => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_span_list(false)
                .with_target(true)
                .with_writer(std::io::stderr)
                .try_init();
        }
    }
}
