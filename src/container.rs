//! Container-wide resolution
//!
//! Runs the resolver over every cache of a container, in declaration
//! order, and reports each outcome.

use std::collections::BTreeSet;

use chrono::Utc;

use crate::config::schema::{CacheConfig, ContainerConfig};
use crate::error::ResolveError;
use crate::observability::{Event, EventEmitter};
use crate::resolver::{
    CollaboratorLookup, RequiredCollaborator, ResolvedTransactionConfig,
    TransactionConfigResolver, TransactionMode,
};

/// Outcome for one cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheResolution {
    pub cache: String,
    pub outcome: Result<ResolvedTransactionConfig, ResolveError>,
}

/// Outcomes for every cache of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerResolution {
    pub container: String,
    pub caches: Vec<CacheResolution>,
}

impl ContainerResolution {
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.caches.iter().filter(|c| c.outcome.is_ok()).count()
    }

    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.caches.len() - self.resolved_count()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.caches.iter().all(|c| c.outcome.is_ok())
    }
}

/// Resolves a single cache against `lookup`.
///
/// # Errors
///
/// Returns the first configure or resolve error for the cache.
pub fn resolve_cache(
    name: &str,
    cache: &CacheConfig,
    lookup: &dyn CollaboratorLookup,
) -> Result<ResolvedTransactionConfig, ResolveError> {
    let resolver = TransactionConfigResolver::new(name);
    let request = cache.transaction.to_request(&resolver)?;
    resolver.resolve_with(&request, lookup)
}

/// Resolves every cache in `config`, emitting one event per cache and a
/// summary event at the end.
///
/// Failures are recorded per cache; one bad cache does not stop the rest.
pub fn resolve_container(
    config: &ContainerConfig,
    lookup: &dyn CollaboratorLookup,
    events: &EventEmitter,
) -> ContainerResolution {
    let container = config.container.name.clone();
    let caches: Vec<CacheResolution> = config
        .caches
        .iter()
        .map(|(name, cache)| {
            let outcome = resolve_cache(name, cache, lookup);
            events.emit(cache_event(&container, name, &outcome));
            CacheResolution {
                cache: name.clone(),
                outcome,
            }
        })
        .collect();

    let resolution = ContainerResolution { container, caches };
    tracing::info!(
        container = %resolution.container,
        resolved = resolution.resolved_count(),
        failed = resolution.failed_count(),
        "container resolved"
    );
    events.emit(Event::ContainerResolved {
        timestamp: Utc::now(),
        container: resolution.container.clone(),
        resolved: resolution.resolved_count(),
        failed: resolution.failed_count(),
    });
    resolution
}

fn cache_event(
    container: &str,
    cache: &str,
    outcome: &Result<ResolvedTransactionConfig, ResolveError>,
) -> Event {
    match outcome {
        Ok(resolved) => Event::CacheResolved {
            timestamp: Utc::now(),
            container: container.to_string(),
            cache: cache.to_string(),
            mode: resolved.mode(),
            locking: resolved.locking(),
            stop_timeout_ms: resolved.stop_timeout_ms(),
            transactional: resolved.transactional(),
            use_synchronization: resolved.use_synchronization(),
            recovery_enabled: resolved.recovery_enabled(),
        },
        Err(err) => Event::ResolutionFailed {
            timestamp: Utc::now(),
            container: container.to_string(),
            cache: cache.to_string(),
            kind: err.kind().to_string(),
            error: err.to_string(),
        },
    }
}

/// The collaborators one cache would request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDependencies {
    pub cache: String,
    pub mode: Result<TransactionMode, ResolveError>,
    pub required: BTreeSet<RequiredCollaborator>,
}

impl CacheDependencies {
    /// Whether the cache runs on the embedded manager instead of requesting
    /// one.
    #[must_use]
    pub fn uses_embedded_manager(&self) -> bool {
        self.mode == Ok(TransactionMode::Batch)
    }
}

/// Lists the collaborators every cache of `config` would request, without
/// consulting any environment.
#[must_use]
pub fn plan_dependencies(config: &ContainerConfig) -> Vec<CacheDependencies> {
    config
        .caches
        .iter()
        .map(|(name, cache)| {
            let mode = cache.transaction.mode.parse::<TransactionMode>();
            let required = mode
                .as_ref()
                .map(|m| TransactionConfigResolver::declare_dependencies(*m))
                .unwrap_or_default();
            CacheDependencies {
                cache: name.clone(),
                mode,
                required,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::environment::{NamedTransactionManager, ServiceEnvironment};

    fn container(yaml: &str) -> ContainerConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    const MIXED: &str = r"
container:
  name: web
caches:
  local: {}
  batch:
    transaction:
      mode: BATCH
  orders:
    transaction:
      mode: FULL_XA
  sessions:
    transaction:
      mode: NON_XA
";

    #[test]
    fn resolves_in_declaration_order() {
        let env = ServiceEnvironment::new()
            .with_transaction_manager(Arc::new(NamedTransactionManager::new("tm")));
        let result = resolve_container(&container(MIXED), &env, &EventEmitter::noop());

        let names: Vec<&str> = result.caches.iter().map(|c| c.cache.as_str()).collect();
        assert_eq!(names, ["local", "batch", "orders", "sessions"]);
        assert!(result.is_success());
        assert_eq!(result.resolved_count(), 4);
    }

    #[test]
    fn missing_manager_fails_only_transactional_caches() {
        let events = EventEmitter::noop();
        let result = resolve_container(&container(MIXED), &ServiceEnvironment::new(), &events);

        assert_eq!(result.resolved_count(), 2);
        assert_eq!(result.failed_count(), 2);
        assert!(!result.is_success());
        for failed in result.caches.iter().filter(|c| c.outcome.is_err()) {
            assert!(matches!(
                failed.outcome,
                Err(ResolveError::MissingCollaborator { .. })
            ));
        }
        // one event per cache plus the summary
        assert_eq!(events.event_count(), 5);
    }

    #[test]
    fn invalid_attributes_reported_per_cache() {
        let config = container(
            r"
container:
  name: web
caches:
  bad:
    transaction:
      stop-timeout: -10
",
        );
        let result = resolve_container(&config, &ServiceEnvironment::new(), &EventEmitter::noop());
        assert_eq!(
            result.caches[0].outcome.as_ref().unwrap_err().kind(),
            "invalid_configuration"
        );
    }

    #[test]
    fn plan_lists_required_collaborators() {
        let plan = plan_dependencies(&container(MIXED));
        assert!(plan[0].required.is_empty());
        assert!(plan[1].required.is_empty());
        assert!(plan[1].uses_embedded_manager());
        assert_eq!(
            plan[2].required,
            BTreeSet::from([RequiredCollaborator::TransactionManager])
        );
        assert_eq!(plan[3].required.len(), 2);
    }

    #[test]
    fn plan_keeps_invalid_modes() {
        let config = container("container:\n  name: web\ncaches:\n  x:\n    transaction:\n      mode: XA\n");
        let plan = plan_dependencies(&config);
        assert!(plan[0].mode.is_err());
        assert!(plan[0].required.is_empty());
    }
}
