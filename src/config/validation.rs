//! Configuration validation
//!
//! Runs on the deserialized `ContainerConfig`. Every attribute goes through
//! the same token and timeout checks the resolver applies, and every issue
//! is collected rather than stopping at the first one.

use crate::config::loader::ConfigLimits;
use crate::config::schema::{CacheConfig, ContainerConfig, EnvironmentConfig};
use crate::error::{ResolveError, Severity, ValidationIssue};
use crate::resolver::{LockingMode, TransactionMode, validate_stop_timeout};

// ============================================================================
// Public API
// ============================================================================

/// Result of configuration validation.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// Validation errors (prevent loading).
    pub errors: Vec<ValidationIssue>,

    /// Validation warnings (informational).
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationResult {
    /// Returns `true` if there are any errors.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns `true` if validation passed (no errors).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration validator.
#[derive(Debug, Default)]
pub struct Validator {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Validator {
    /// Creates a new validator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates a configuration and returns every issue found.
    pub fn validate(&mut self, config: &ContainerConfig, limits: &ConfigLimits) -> ValidationResult {
        self.errors.clear();
        self.warnings.clear();

        self.validate_container(config);
        self.validate_limits(config, limits);
        self.validate_environment_names(&config.environment);

        let mut modes = Vec::with_capacity(config.caches.len());
        for (name, cache) in &config.caches {
            modes.push(self.validate_cache(name, cache, &config.environment));
        }
        self.validate_environment_usage(&config.environment, &modes);

        ValidationResult {
            errors: std::mem::take(&mut self.errors),
            warnings: std::mem::take(&mut self.warnings),
        }
    }

    // ========================================================================
    // Container
    // ========================================================================

    fn validate_container(&mut self, config: &ContainerConfig) {
        if config.container.name.trim().is_empty() {
            self.add_error("container.name", "Container name is required and cannot be empty");
        }

        if config.caches.is_empty() {
            self.add_warning("caches", "No caches declared");
        }
    }

    fn validate_limits(&mut self, config: &ContainerConfig, limits: &ConfigLimits) {
        if config.caches.len() > limits.max_caches {
            self.add_error(
                "caches",
                format!(
                    "Too many caches: {} (limit: {})",
                    config.caches.len(),
                    limits.max_caches
                ),
            );
        }
    }

    // ========================================================================
    // Caches
    // ========================================================================

    /// Validates one cache and returns its mode when the token is valid.
    fn validate_cache(
        &mut self,
        name: &str,
        cache: &CacheConfig,
        environment: &EnvironmentConfig,
    ) -> Option<TransactionMode> {
        if name.trim().is_empty() {
            self.add_error("caches", "Cache name cannot be empty");
        }

        let base = format!("caches.{name}.transaction");
        let attrs = &cache.transaction;

        let mode = self.check(&base, attrs.mode.parse::<TransactionMode>());
        let locking = self.check(&base, attrs.locking.parse::<LockingMode>());
        let timeout = self.check(
            &base,
            attrs
                .stop_timeout
                .to_millis()
                .and_then(validate_stop_timeout),
        );

        let mode = mode?;
        let mode_path = format!("{base}.mode");

        match mode {
            TransactionMode::NonXa | TransactionMode::FullXa
                if environment.transaction_manager.is_none() =>
            {
                self.add_warning(
                    &mode_path,
                    format!(
                        "Mode {mode} requires a transaction manager, but the environment declares none; resolution will fail"
                    ),
                );
            }
            _ => {}
        }

        if mode == TransactionMode::NonXa && environment.synchronization_registry.is_none() {
            self.add_warning(
                &mode_path,
                "NON_XA cache without a synchronization registry; transactions enlist without one",
            );
        }

        if mode == TransactionMode::None && locking == Some(LockingMode::Optimistic) {
            self.add_warning(
                format!("{base}.locking"),
                "Locking mode has no effect on a non-transactional cache",
            );
        }

        if mode != TransactionMode::None && timeout == Some(0) {
            self.add_warning(
                format!("{base}.stop-timeout"),
                "Stop timeout of 0 does not wait for in-flight transactions",
            );
        }

        Some(mode)
    }

    // ========================================================================
    // Environment
    // ========================================================================

    fn validate_environment_names(&mut self, environment: &EnvironmentConfig) {
        let declared = [
            (
                "environment.transaction-manager",
                "Transaction manager",
                &environment.transaction_manager,
            ),
            (
                "environment.synchronization-registry",
                "Synchronization registry",
                &environment.synchronization_registry,
            ),
        ];
        for (path, service, name) in declared {
            if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
                self.add_error(path, format!("{service} name cannot be empty"));
            }
        }
    }

    fn validate_environment_usage(
        &mut self,
        environment: &EnvironmentConfig,
        modes: &[Option<TransactionMode>],
    ) {
        let uses = |wanted: &[TransactionMode]| modes.iter().flatten().any(|m| wanted.contains(m));

        if environment.transaction_manager.is_some()
            && !uses(&[TransactionMode::NonXa, TransactionMode::FullXa])
        {
            self.add_warning(
                "environment.transaction-manager",
                "Transaction manager declared but no NON_XA or FULL_XA cache uses it",
            );
        }

        if environment.synchronization_registry.is_some() && !uses(&[TransactionMode::NonXa]) {
            self.add_warning(
                "environment.synchronization-registry",
                "Synchronization registry declared but no NON_XA cache uses it",
            );
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Records a resolver error under `base.<field>` and converts to `Option`.
    fn check<T>(&mut self, base: &str, result: Result<T, ResolveError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                let path = match &err {
                    ResolveError::InvalidConfiguration { field, .. } => format!("{base}.{field}"),
                    ResolveError::MissingCollaborator { .. } => base.to_string(),
                };
                self.add_error(path, err.to_string());
                None
            }
        }
    }

    fn add_error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Error,
        });
    }

    fn add_warning(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            path: path.into(),
            message: message.into(),
            severity: Severity::Warning,
        });
    }
}

// ============================================================================
// Tests
// ============================================================================
