//! Error types for `cachetx`
//!
//! Resolver errors, configuration loading errors, and the top-level error
//! that maps each failure onto a process exit code.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::resolver::{RequiredCollaborator, TransactionMode};

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes for `cachetx` CLI operations.
pub struct ExitCode;

impl ExitCode {
    /// Successful execution
    pub const SUCCESS: i32 = 0;

    /// General error
    pub const ERROR: i32 = 1;

    /// Configuration error (invalid YAML, validation failure)
    pub const CONFIG_ERROR: i32 = 2;

    /// I/O error (file not found, permission denied)
    pub const IO_ERROR: i32 = 3;

    /// Resolution error (missing collaborator for a transactional mode)
    pub const RESOLVE_ERROR: i32 = 4;

    /// Usage error (invalid arguments, missing required options)
    pub const USAGE_ERROR: i32 = 64;
}

// ============================================================================
// Top-Level Error
// ============================================================================

/// Top-level error type for `cachetx` operations.
#[derive(Debug, Error)]
pub enum CacheTxError {
    /// Configuration loading or validation error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A single cache failed to resolve
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// One or more caches of a container failed to resolve
    #[error("{failed} of {total} cache(s) in container '{container}' failed to resolve")]
    ContainerFailed {
        /// Container name
        container: String,
        /// Number of failed caches
        failed: usize,
        /// Number of caches attempted
        total: usize,
    },

    /// Invalid command-line usage
    #[error("usage error: {0}")]
    Usage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CacheTxError {
    /// Returns the exit code for this error.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Resolve(ResolveError::InvalidConfiguration { .. }) => ExitCode::CONFIG_ERROR,
            Self::Resolve(ResolveError::MissingCollaborator { .. }) | Self::ContainerFailed { .. } => {
                ExitCode::RESOLVE_ERROR
            }
            Self::Usage(_) => ExitCode::USAGE_ERROR,
            Self::Io(_) => ExitCode::IO_ERROR,
            Self::Json(_) => ExitCode::ERROR,
        }
    }

    /// Validation issues carried by this error, if any.
    #[must_use]
    pub fn issues(&self) -> &[ValidationIssue] {
        match self {
            Self::Config(ConfigError::ValidationError { errors, .. }) => errors,
            _ => &[],
        }
    }
}

// ============================================================================
// Resolver Errors
// ============================================================================

/// Errors raised while configuring or resolving a cache's transaction
/// settings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A configuration attribute is not a member of its declared set, or a
    /// timeout is negative.
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidConfiguration {
        /// Name of the offending attribute
        field: String,
        /// The value that was provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// A collaborator the mode cannot run without is absent.
    #[error("transaction mode {mode} requires a {collaborator}, but none is available")]
    MissingCollaborator {
        /// The mode that was requested
        mode: TransactionMode,
        /// The collaborator that could not be obtained
        collaborator: RequiredCollaborator,
    },
}

impl ResolveError {
    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::InvalidConfiguration {
            field: field.into(),
            value: value.into(),
            expected: expected.into(),
        }
    }

    /// Short machine-readable name of the error kind.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidConfiguration { .. } => "invalid_configuration",
            Self::MissingCollaborator { .. } => "missing_collaborator",
        }
    }
}

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// YAML parsing failed
    #[error("parse error in {path}{}: {message}", line.map_or_else(String::new, |l| format!(" (line {l})")))]
    ParseError {
        /// Path to the configuration file
        path: PathBuf,
        /// Line number where the error occurred (if available)
        line: Option<usize>,
        /// Error message from the parser
        message: String,
    },

    /// Configuration validation failed
    #[error("validation failed for {path}: {} error(s)", errors.len())]
    ValidationError {
        /// Path to the configuration file
        path: String,
        /// List of validation issues found
        errors: Vec<ValidationIssue>,
    },

    /// Referenced configuration file not found
    #[error("file not found: {path}")]
    MissingFile {
        /// Path to the missing file
        path: PathBuf,
    },

    /// Field has an invalid value
    #[error("invalid value for '{field}': got '{value}', expected {expected}")]
    InvalidValue {
        /// Name of the field with invalid value
        field: String,
        /// The actual value provided
        value: String,
        /// Description of what was expected
        expected: String,
    },

    /// Environment variable referenced in configuration is not set
    #[error("environment variable '{var}' not set (referenced at {location})")]
    EnvVarNotSet {
        /// Name of the environment variable
        var: String,
        /// Message or location given with the reference
        location: String,
    },

    /// One or more configuration files failed validation.
    #[error("{count} file(s) failed validation")]
    ValidationFailed {
        /// Number of files that failed validation.
        count: usize,
    },
}

// ============================================================================
// Validation Types
// ============================================================================

/// A single validation issue found during configuration validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    /// Dotted path to the problematic field (e.g. `caches.sessions.transaction.mode`)
    pub path: String,
    /// Description of the validation issue
    pub message: String,
    /// Severity level of the issue
    pub severity: Severity,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        if self.path.is_empty() {
            write!(f, "{prefix}: {}", self.message)
        } else {
            write!(f, "{prefix}: {} at {}", self.message, self.path)
        }
    }
}

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Prevents the configuration from being used
    Error,
    /// Potential issue that does not prevent loading
    Warning,
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Result type alias for `cachetx` operations.
pub type Result<T> = std::result::Result<T, CacheTxError>;

// ============================================================================
// Tests
// ============================================================================
