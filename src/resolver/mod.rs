//! Transaction configuration resolver
//!
//! Turns the three transaction attributes of a cache (mode, locking mode,
//! stop timeout) plus whatever transaction services the environment can
//! supply into an immutable [`ResolvedTransactionConfig`].
//!
//! Resolution happens in three steps:
//! 1. [`TransactionConfigResolver::configure`] validates the raw attributes.
//! 2. [`TransactionConfigResolver::declare_dependencies`] names the services
//!    the mode needs from the environment.
//! 3. [`TransactionConfigResolver::resolve`] combines the request with the
//!    services that were obtained.

pub mod handles;
pub mod mode;

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::ResolveError;
use crate::observability::metrics;

pub use handles::{
    EmbeddedTransactionManager, Service, ServiceHandle, SynchronizationRegistry,
    SynchronizationRegistryHandle, TransactionManager, TransactionManagerHandle,
};
pub use mode::{LockingMode, TransactionMode};

/// Default stop timeout of the management model, in milliseconds.
pub const DEFAULT_STOP_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Collaborators
// ============================================================================

/// A runtime service that a transaction mode may request from the
/// environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RequiredCollaborator {
    /// The environment's transaction manager.
    TransactionManager,
    /// The environment's transaction synchronization registry.
    SynchronizationRegistry,
}

impl fmt::Display for RequiredCollaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::TransactionManager => "transaction manager",
            Self::SynchronizationRegistry => "synchronization registry",
        })
    }
}

/// Supplies the transaction services available in the current environment.
///
/// Lookups return `None` when the environment has no such service. That is
/// not an error at this level; the resolver decides whether the mode can
/// run without it.
pub trait CollaboratorLookup {
    /// The environment's transaction manager, if one is configured.
    fn lookup_transaction_manager(&self) -> Option<TransactionManagerHandle>;

    /// The environment's synchronization registry, if one is configured.
    fn lookup_synchronization_registry(&self) -> Option<SynchronizationRegistryHandle>;

    /// The in-process manager substituted for batching caches.
    fn builtin_embedded_manager(&self) -> TransactionManagerHandle {
        TransactionManagerHandle::embedded()
    }
}

// ============================================================================
// Dependency Policy
// ============================================================================

/// Where a mode's transaction manager comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerSource {
    /// No transaction manager at all.
    Absent,
    /// The built-in embedded manager; nothing is requested.
    Embedded,
    /// Requested from the environment and mandatory.
    External,
}

/// One row of the dependency decision table.
#[derive(Debug, Clone, Copy)]
struct DependencyRow {
    manager: ManagerSource,
    registry: bool,
}

/// Dependency decision table. Every mode has its own row.
const fn dependency_row(mode: TransactionMode) -> DependencyRow {
    match mode {
        TransactionMode::None => DependencyRow {
            manager: ManagerSource::Absent,
            registry: false,
        },
        TransactionMode::Batch => DependencyRow {
            manager: ManagerSource::Embedded,
            registry: false,
        },
        TransactionMode::NonXa => DependencyRow {
            manager: ManagerSource::External,
            registry: true,
        },
        TransactionMode::FullXa => DependencyRow {
            manager: ManagerSource::External,
            registry: false,
        },
    }
}

// ============================================================================
// Request and Result
// ============================================================================

/// Validated transaction attributes for one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConfigurationRequest {
    mode: TransactionMode,
    locking: LockingMode,
    stop_timeout_ms: u64,
}

impl ConfigurationRequest {
    /// Builds a request from already-typed attributes.
    #[must_use]
    pub const fn new(mode: TransactionMode, locking: LockingMode, stop_timeout_ms: u64) -> Self {
        Self {
            mode,
            locking,
            stop_timeout_ms,
        }
    }

    #[must_use]
    pub const fn mode(&self) -> TransactionMode {
        self.mode
    }

    #[must_use]
    pub const fn locking(&self) -> LockingMode {
        self.locking
    }

    #[must_use]
    pub const fn stop_timeout_ms(&self) -> u64 {
        self.stop_timeout_ms
    }
}

impl Default for ConfigurationRequest {
    fn default() -> Self {
        Self::new(
            TransactionMode::default(),
            LockingMode::default(),
            DEFAULT_STOP_TIMEOUT_MS,
        )
    }
}

/// Transaction mode understood by the cache engine's builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineTransactionMode {
    Transactional,
    NonTransactional,
}

/// Fully resolved transaction configuration of one cache.
///
/// Only [`TransactionConfigResolver::resolve`] builds this value, so mode,
/// flags and handles always agree with the dependency table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedTransactionConfig {
    mode: TransactionMode,
    locking: LockingMode,
    stop_timeout_ms: u64,
    transactional: bool,
    use_synchronization: bool,
    recovery_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    transaction_manager: Option<TransactionManagerHandle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    synchronization_registry: Option<SynchronizationRegistryHandle>,
}

impl ResolvedTransactionConfig {
    #[must_use]
    pub const fn mode(&self) -> TransactionMode {
        self.mode
    }

    #[must_use]
    pub const fn locking(&self) -> LockingMode {
        self.locking
    }

    #[must_use]
    pub const fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    #[must_use]
    pub const fn stop_timeout_ms(&self) -> u64 {
        self.stop_timeout_ms
    }

    #[must_use]
    pub const fn transactional(&self) -> bool {
        self.transactional
    }

    #[must_use]
    pub const fn use_synchronization(&self) -> bool {
        self.use_synchronization
    }

    #[must_use]
    pub const fn recovery_enabled(&self) -> bool {
        self.recovery_enabled
    }

    #[must_use]
    pub const fn transaction_manager(&self) -> Option<&TransactionManagerHandle> {
        self.transaction_manager.as_ref()
    }

    #[must_use]
    pub const fn synchronization_registry(&self) -> Option<&SynchronizationRegistryHandle> {
        self.synchronization_registry.as_ref()
    }

    /// Coarse mode handed to the cache engine's builder.
    #[must_use]
    pub const fn engine_mode(&self) -> EngineTransactionMode {
        if self.transactional {
            EngineTransactionMode::Transactional
        } else {
            EngineTransactionMode::NonTransactional
        }
    }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves the transaction configuration of a single cache.
///
/// A resolver is created per configuration event and carries only the
/// cache name for diagnostics.
#[derive(Debug, Clone)]
pub struct TransactionConfigResolver {
    cache: String,
}

impl TransactionConfigResolver {
    #[must_use]
    pub fn new(cache: impl Into<String>) -> Self {
        Self {
            cache: cache.into(),
        }
    }

    /// Name of the cache being resolved.
    #[must_use]
    pub fn cache(&self) -> &str {
        &self.cache
    }

    /// Validates raw attribute tokens into a [`ConfigurationRequest`].
    ///
    /// Fields are checked in order mode, locking, stop timeout; the first
    /// failure is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::InvalidConfiguration`] naming the field when
    /// a token is not recognized or the timeout is negative.
    pub fn configure(
        &self,
        mode: &str,
        locking: &str,
        stop_timeout_ms: i64,
    ) -> Result<ConfigurationRequest, ResolveError> {
        let request = mode.parse::<TransactionMode>().and_then(|mode| {
            let locking = locking.parse::<LockingMode>()?;
            let timeout = validate_stop_timeout(stop_timeout_ms)?;
            Ok(ConfigurationRequest::new(mode, locking, timeout))
        });

        request.map_err(|err| self.reject(err))
    }

    /// Logs and counts a rejected attribute.
    ///
    /// [`configure`](Self::configure) reports its own errors here; callers
    /// use it for errors found before `configure`, such as stop-timeout
    /// text that is not a duration.
    #[must_use]
    pub fn reject(&self, err: ResolveError) -> ResolveError {
        tracing::warn!(cache = %self.cache, error = %err, "rejected transaction attributes");
        metrics::record_failure(&err);
        err
    }

    /// Collaborators the environment must be asked for under `mode`.
    #[must_use]
    pub fn declare_dependencies(mode: TransactionMode) -> BTreeSet<RequiredCollaborator> {
        let row = dependency_row(mode);
        let mut required = BTreeSet::new();
        if row.manager == ManagerSource::External {
            required.insert(RequiredCollaborator::TransactionManager);
        }
        if row.registry {
            required.insert(RequiredCollaborator::SynchronizationRegistry);
        }
        required
    }

    /// Combines a request with the collaborators that were obtained.
    ///
    /// Collaborators the mode does not use are ignored: a batching cache
    /// always runs on the embedded manager, and only `NON_XA` keeps the
    /// registry. A handle whose service has already been released counts
    /// as absent.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::MissingCollaborator`] when the mode needs an
    /// external transaction manager and none is available.
    pub fn resolve(
        &self,
        request: &ConfigurationRequest,
        manager: Option<TransactionManagerHandle>,
        registry: Option<SynchronizationRegistryHandle>,
    ) -> Result<ResolvedTransactionConfig, ResolveError> {
        let mode = request.mode();
        let row = dependency_row(mode);

        let transaction_manager = match row.manager {
            ManagerSource::Absent => None,
            ManagerSource::Embedded => Some(
                manager
                    .filter(TransactionManagerHandle::is_embedded)
                    .unwrap_or_else(TransactionManagerHandle::embedded),
            ),
            ManagerSource::External => {
                let Some(tm) = manager.filter(ServiceHandle::is_live) else {
                    let err = ResolveError::MissingCollaborator {
                        mode,
                        collaborator: RequiredCollaborator::TransactionManager,
                    };
                    tracing::warn!(cache = %self.cache, error = %err, "cannot resolve transaction configuration");
                    metrics::record_failure(&err);
                    return Err(err);
                };
                Some(tm)
            }
        };

        let synchronization_registry = if row.registry {
            let live = registry.filter(ServiceHandle::is_live);
            if live.is_none() {
                tracing::info!(
                    cache = %self.cache,
                    %mode,
                    "no synchronization registry available, transactions enlist without it"
                );
            }
            live
        } else {
            None
        };

        let resolved = ResolvedTransactionConfig {
            mode,
            locking: request.locking(),
            stop_timeout_ms: request.stop_timeout_ms(),
            transactional: mode != TransactionMode::None,
            use_synchronization: mode == TransactionMode::NonXa,
            recovery_enabled: mode == TransactionMode::FullXa,
            transaction_manager,
            synchronization_registry,
        };

        tracing::debug!(
            cache = %self.cache,
            %mode,
            locking = %resolved.locking,
            stop_timeout_ms = resolved.stop_timeout_ms,
            manager = resolved.transaction_manager.as_ref().map(ServiceHandle::name),
            registry = resolved.synchronization_registry.as_ref().map(ServiceHandle::name),
            "resolved transaction configuration"
        );
        metrics::record_resolution(mode);
        Ok(resolved)
    }

    /// Resolves `request` against `lookup`, asking only for the
    /// collaborators [`declare_dependencies`](Self::declare_dependencies)
    /// names for its mode.
    ///
    /// # Errors
    ///
    /// Same as [`resolve`](Self::resolve).
    pub fn resolve_with(
        &self,
        request: &ConfigurationRequest,
        lookup: &dyn CollaboratorLookup,
    ) -> Result<ResolvedTransactionConfig, ResolveError> {
        let required = Self::declare_dependencies(request.mode());

        let manager = if required.contains(&RequiredCollaborator::TransactionManager) {
            lookup.lookup_transaction_manager()
        } else if dependency_row(request.mode()).manager == ManagerSource::Embedded {
            Some(lookup.builtin_embedded_manager())
        } else {
            None
        };
        let registry = if required.contains(&RequiredCollaborator::SynchronizationRegistry) {
            lookup.lookup_synchronization_registry()
        } else {
            None
        };

        self.resolve(request, manager, registry)
    }
}

/// Checks that a stop timeout is non-negative.
///
/// # Errors
///
/// Returns [`ResolveError::InvalidConfiguration`] for negative values.
pub fn validate_stop_timeout(stop_timeout_ms: i64) -> Result<u64, ResolveError> {
    u64::try_from(stop_timeout_ms).map_err(|_| {
        ResolveError::invalid(
            "stop-timeout",
            stop_timeout_ms.to_string(),
            "a non-negative number of milliseconds",
        )
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Debug)]
    struct Jta;

    impl Service for Jta {
        fn name(&self) -> &str {
            "jta"
        }
    }

    impl TransactionManager for Jta {}

    #[derive(Debug)]
    struct Tsr;

    impl Service for Tsr {
        fn name(&self) -> &str {
            "tsr"
        }
    }

    impl SynchronizationRegistry for Tsr {}

    struct Env {
        tm: Option<Arc<dyn TransactionManager>>,
        tsr: Option<Arc<dyn SynchronizationRegistry>>,
    }

    impl Env {
        fn full() -> Self {
            Self {
                tm: Some(Arc::new(Jta)),
                tsr: Some(Arc::new(Tsr)),
            }
        }

        fn tm(&self) -> Option<TransactionManagerHandle> {
            self.tm.as_ref().map(ServiceHandle::new)
        }

        fn tsr(&self) -> Option<SynchronizationRegistryHandle> {
            self.tsr.as_ref().map(ServiceHandle::new)
        }
    }

    /// Lookup that panics when asked for the registry.
    struct NoRegistryLookup(Arc<dyn TransactionManager>);

    impl CollaboratorLookup for NoRegistryLookup {
        fn lookup_transaction_manager(&self) -> Option<TransactionManagerHandle> {
            Some(ServiceHandle::new(&self.0))
        }

        fn lookup_synchronization_registry(&self) -> Option<SynchronizationRegistryHandle> {
            panic!("registry must not be requested");
        }
    }

    fn resolver() -> TransactionConfigResolver {
        TransactionConfigResolver::new("test")
    }

    fn request(mode: TransactionMode) -> ConfigurationRequest {
        ConfigurationRequest::new(mode, LockingMode::Pessimistic, 5_000)
    }

    #[test]
    fn configure_accepts_valid_tokens() {
        let req = resolver().configure("NON_XA", "OPTIMISTIC", 30_000).unwrap();
        assert_eq!(req.mode(), TransactionMode::NonXa);
        assert_eq!(req.locking(), LockingMode::Optimistic);
        assert_eq!(req.stop_timeout_ms(), 30_000);
    }

    #[test]
    fn configure_rejects_negative_timeout_for_every_mode() {
        for mode in TransactionMode::ALL {
            let err = resolver()
                .configure(mode.as_str(), "PESSIMISTIC", -1)
                .unwrap_err();
            assert!(
                matches!(err, ResolveError::InvalidConfiguration { ref field, .. } if field == "stop-timeout"),
                "mode {mode}: {err:?}"
            );
        }
    }

    #[test]
    fn configure_reports_mode_before_locking() {
        let err = resolver().configure("XA", "SOMETIMES", -5).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidConfiguration { ref field, .. } if field == "mode"));
    }

    #[test]
    fn configure_names_locking_field() {
        let err = resolver().configure("BATCH", "SOMETIMES", 0).unwrap_err();
        assert!(matches!(err, ResolveError::InvalidConfiguration { ref field, .. } if field == "locking"));
    }

    #[test]
    fn zero_timeout_is_valid() {
        assert_eq!(validate_stop_timeout(0).unwrap(), 0);
    }

    #[test]
    fn dependency_table() {
        use RequiredCollaborator as R;

        let deps = TransactionConfigResolver::declare_dependencies;
        assert!(deps(TransactionMode::None).is_empty());
        assert!(deps(TransactionMode::Batch).is_empty());
        assert_eq!(
            deps(TransactionMode::NonXa),
            BTreeSet::from([R::TransactionManager, R::SynchronizationRegistry])
        );
        assert_eq!(
            deps(TransactionMode::FullXa),
            BTreeSet::from([R::TransactionManager])
        );
    }

    #[test]
    fn none_mode_is_plain_local_cache() {
        let env = Env::full();
        let cfg = resolver()
            .resolve(&request(TransactionMode::None), env.tm(), env.tsr())
            .unwrap();
        assert!(!cfg.transactional());
        assert!(!cfg.use_synchronization());
        assert!(!cfg.recovery_enabled());
        assert!(cfg.transaction_manager().is_none());
        assert!(cfg.synchronization_registry().is_none());
        assert_eq!(cfg.engine_mode(), EngineTransactionMode::NonTransactional);
    }

    #[test]
    fn batch_always_uses_embedded_manager() {
        let env = Env::full();
        for supplied in [None, env.tm()] {
            let cfg = resolver()
                .resolve(&request(TransactionMode::Batch), supplied, None)
                .unwrap();
            assert!(cfg.transactional());
            assert!(!cfg.use_synchronization());
            assert!(!cfg.recovery_enabled());
            assert_eq!(
                cfg.transaction_manager(),
                Some(&TransactionManagerHandle::embedded())
            );
        }
    }

    #[test]
    fn non_xa_requires_manager() {
        let env = Env::full();
        let err = resolver()
            .resolve(&request(TransactionMode::NonXa), None, env.tsr())
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::MissingCollaborator {
                mode: TransactionMode::NonXa,
                collaborator: RequiredCollaborator::TransactionManager,
            }
        );
    }

    #[test]
    fn non_xa_tolerates_missing_registry() {
        let env = Env::full();
        let cfg = resolver()
            .resolve(&request(TransactionMode::NonXa), env.tm(), None)
            .unwrap();
        assert!(cfg.transactional());
        assert!(cfg.use_synchronization());
        assert!(!cfg.recovery_enabled());
        assert_eq!(cfg.transaction_manager().map(ServiceHandle::name), Some("jta"));
        assert!(cfg.synchronization_registry().is_none());
    }

    #[test]
    fn non_xa_keeps_registry() {
        let env = Env::full();
        let cfg = resolver()
            .resolve(&request(TransactionMode::NonXa), env.tm(), env.tsr())
            .unwrap();
        assert_eq!(
            cfg.synchronization_registry().map(ServiceHandle::name),
            Some("tsr")
        );
    }

    #[test]
    fn full_xa_enables_recovery_and_drops_registry() {
        let env = Env::full();
        let cfg = resolver()
            .resolve(&request(TransactionMode::FullXa), env.tm(), env.tsr())
            .unwrap();
        assert!(cfg.transactional());
        assert!(!cfg.use_synchronization());
        assert!(cfg.recovery_enabled());
        assert!(cfg.synchronization_registry().is_none());
        assert_eq!(cfg.engine_mode(), EngineTransactionMode::Transactional);
    }

    #[test]
    fn full_xa_requires_manager() {
        let err = resolver()
            .resolve(&request(TransactionMode::FullXa), None, None)
            .unwrap_err();
        assert_eq!(err.kind(), "missing_collaborator");
    }

    #[test]
    fn released_manager_counts_as_missing() {
        let mut env = Env::full();
        let handle = env.tm();
        env.tm = None;
        let err = resolver()
            .resolve(&request(TransactionMode::FullXa), handle, None)
            .unwrap_err();
        assert!(matches!(err, ResolveError::MissingCollaborator { .. }));
    }

    #[test]
    fn full_xa_never_requests_registry() {
        let lookup = NoRegistryLookup(Arc::new(Jta));
        let cfg = resolver()
            .resolve_with(&request(TransactionMode::FullXa), &lookup)
            .unwrap();
        assert!(cfg.recovery_enabled());
    }

    #[test]
    fn resolve_is_idempotent() {
        let env = Env::full();
        for mode in TransactionMode::ALL {
            let req = request(mode);
            let first = resolver().resolve(&req, env.tm(), env.tsr()).unwrap();
            let second = resolver().resolve(&req, env.tm(), env.tsr()).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn resolved_config_serializes_flags() {
        let env = Env::full();
        let cfg = resolver()
            .resolve(&request(TransactionMode::NonXa), env.tm(), env.tsr())
            .unwrap();
        let json = serde_json::to_value(&cfg).unwrap();
        assert_eq!(json["mode"], "NON_XA");
        assert_eq!(json["locking"], "PESSIMISTIC");
        assert_eq!(json["stop_timeout_ms"], 5_000);
        assert_eq!(json["use_synchronization"], true);
        assert_eq!(json["transaction_manager"], "jta");
        assert_eq!(json["synchronization_registry"], "tsr");
    }

    #[test]
    fn stop_timeout_as_duration() {
        let cfg = resolver()
            .resolve(&request(TransactionMode::None), None, None)
            .unwrap();
        assert_eq!(cfg.stop_timeout(), Duration::from_secs(5));
    }
}
