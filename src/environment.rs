//! Service environment
//!
//! Owns the transaction services available to a container and hands out
//! weak handles to them through [`CollaboratorLookup`].

use std::sync::Arc;

use crate::config::schema::EnvironmentConfig;
use crate::resolver::{
    CollaboratorLookup, Service, ServiceHandle, SynchronizationRegistry,
    SynchronizationRegistryHandle, TransactionManager, TransactionManagerHandle,
};

/// Transaction manager known only by its service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedTransactionManager {
    name: String,
}

impl NamedTransactionManager {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Service for NamedTransactionManager {
    fn name(&self) -> &str {
        &self.name
    }
}

impl TransactionManager for NamedTransactionManager {}

/// Synchronization registry known only by its service name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSynchronizationRegistry {
    name: String,
}

impl NamedSynchronizationRegistry {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Service for NamedSynchronizationRegistry {
    fn name(&self) -> &str {
        &self.name
    }
}

impl SynchronizationRegistry for NamedSynchronizationRegistry {}

/// The set of transaction services a container can draw on.
///
/// Handles given out by the lookup stay valid only while this value is
/// alive.
#[derive(Debug, Default)]
pub struct ServiceEnvironment {
    transaction_manager: Option<Arc<dyn TransactionManager>>,
    synchronization_registry: Option<Arc<dyn SynchronizationRegistry>>,
}

impl ServiceEnvironment {
    /// An environment with no transaction services.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_transaction_manager(mut self, manager: Arc<dyn TransactionManager>) -> Self {
        self.transaction_manager = Some(manager);
        self
    }

    #[must_use]
    pub fn with_synchronization_registry(
        mut self,
        registry: Arc<dyn SynchronizationRegistry>,
    ) -> Self {
        self.synchronization_registry = Some(registry);
        self
    }

    /// Builds the environment described by a configuration file.
    #[must_use]
    pub fn from_config(config: &EnvironmentConfig) -> Self {
        let mut env = Self::new();
        if let Some(name) = &config.transaction_manager {
            env = env.with_transaction_manager(Arc::new(NamedTransactionManager::new(name)));
        }
        if let Some(name) = &config.synchronization_registry {
            env = env
                .with_synchronization_registry(Arc::new(NamedSynchronizationRegistry::new(name)));
        }
        tracing::debug!(
            transaction_manager = config.transaction_manager.as_deref(),
            synchronization_registry = config.synchronization_registry.as_deref(),
            "service environment ready"
        );
        env
    }
}

impl CollaboratorLookup for ServiceEnvironment {
    fn lookup_transaction_manager(&self) -> Option<TransactionManagerHandle> {
        self.transaction_manager.as_ref().map(ServiceHandle::new)
    }

    fn lookup_synchronization_registry(&self) -> Option<SynchronizationRegistryHandle> {
        self.synchronization_registry.as_ref().map(ServiceHandle::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_environment_supplies_nothing() {
        let env = ServiceEnvironment::new();
        assert!(env.lookup_transaction_manager().is_none());
        assert!(env.lookup_synchronization_registry().is_none());
        assert!(env.builtin_embedded_manager().is_embedded());
    }

    #[test]
    fn from_config_registers_named_services() {
        let env = ServiceEnvironment::from_config(&EnvironmentConfig {
            transaction_manager: Some("jboss-txn".into()),
            synchronization_registry: Some("jboss-tsr".into()),
        });
        let tm = env.lookup_transaction_manager().unwrap();
        let tsr = env.lookup_synchronization_registry().unwrap();
        assert_eq!(tm.name(), "jboss-txn");
        assert_eq!(tsr.name(), "jboss-tsr");
        assert!(!tm.is_embedded());
    }

    #[test]
    fn lookups_return_the_same_service() {
        let env = ServiceEnvironment::new()
            .with_transaction_manager(Arc::new(NamedTransactionManager::new("tm")));
        assert_eq!(
            env.lookup_transaction_manager(),
            env.lookup_transaction_manager()
        );
    }

    #[test]
    fn handles_die_with_the_environment() {
        let env = ServiceEnvironment::new()
            .with_synchronization_registry(Arc::new(NamedSynchronizationRegistry::new("tsr")));
        let handle = env.lookup_synchronization_registry().unwrap();
        drop(env);
        assert!(!handle.is_live());
    }
}
