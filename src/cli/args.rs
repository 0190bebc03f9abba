//! CLI argument definitions
//!
//! All Clap derive structs for `cachetx` command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};

use crate::observability::LogFormat;

// ============================================================================
// Root CLI
// ============================================================================

/// Resolve and validate cache transaction configuration.
#[derive(Parser, Debug)]
#[command(name = "cachetx", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output control.
    #[arg(long, default_value = "auto", global = true, env = "CACHETX_COLOR")]
    pub color: ColorChoice,

    /// Log output format.
    #[arg(long, default_value = "human", global = true, env = "CACHETX_LOG_FORMAT")]
    pub log_format: LogFormat,
}

// ============================================================================
// Commands
// ============================================================================

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve the transaction configuration of every cache in a container.
    Resolve(ResolveArgs),

    /// Validate configuration files without resolving them.
    Validate(ValidateArgs),

    /// Show which transaction services each cache would request.
    Dependencies(DependenciesArgs),

    /// Display version information.
    Version(VersionArgs),
}

/// Arguments for `resolve`.
#[derive(Args, Debug)]
pub struct ResolveArgs {
    /// Container configuration file.
    #[arg(env = "CACHETX_CONFIG")]
    pub config: PathBuf,

    /// Resolve only this cache.
    #[arg(long)]
    pub cache: Option<String>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Write resolution events as JSONL to this file.
    #[arg(long, env = "CACHETX_EVENTS_FILE")]
    pub events_file: Option<PathBuf>,
}

/// Arguments for `validate`.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Configuration files to validate.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,

    /// Enable strict validation (warnings become errors).
    #[arg(long)]
    pub strict: bool,
}

/// Arguments for `dependencies`.
#[derive(Args, Debug)]
pub struct DependenciesArgs {
    /// Container configuration file.
    #[arg(env = "CACHETX_CONFIG")]
    pub config: PathBuf,

    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

/// Arguments for version display.
#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Output format.
    #[arg(short, long, default_value = "human")]
    pub format: OutputFormat,
}

// ============================================================================
// CLI-Local Enums
// ============================================================================

/// Color output choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ColorChoice {
    /// Auto-detect terminal support.
    #[default]
    Auto,
    /// Always use color.
    Always,
    /// Never use color.
    Never,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output.
    #[default]
    Human,
    /// JSON output.
    Json,
}

// ============================================================================
// Tests
// ============================================================================
