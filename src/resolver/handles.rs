//! Weak handles to externally owned transaction services.
//!
//! The service environment owns every transaction manager and
//! synchronization registry. Resolved configurations only ever hold a
//! [`ServiceHandle`], which can be upgraded while the owner keeps the
//! service alive.

use std::fmt;
use std::sync::{Arc, LazyLock, Weak};

use serde::{Serialize, Serializer};

/// A named runtime service.
pub trait Service: fmt::Debug + Send + Sync {
    /// Name the service is registered under.
    fn name(&self) -> &str;
}

/// Coordinates transactions for the caches enlisted with it.
pub trait TransactionManager: Service {
    /// Whether this manager is the in-process embedded implementation.
    fn is_embedded(&self) -> bool {
        false
    }
}

/// Notifies registered resources of transaction completion without XA
/// enlistment.
pub trait SynchronizationRegistry: Service {}

/// In-process transaction manager used for batching.
#[derive(Debug, Default)]
pub struct EmbeddedTransactionManager;

impl EmbeddedTransactionManager {
    pub const NAME: &'static str = "embedded";
}

impl Service for EmbeddedTransactionManager {
    fn name(&self) -> &str {
        Self::NAME
    }
}

impl TransactionManager for EmbeddedTransactionManager {
    fn is_embedded(&self) -> bool {
        true
    }
}

static EMBEDDED: LazyLock<Arc<dyn TransactionManager>> =
    LazyLock::new(|| Arc::new(EmbeddedTransactionManager));

/// Non-owning reference to a service held by the environment.
///
/// Two handles are equal when they point at the same service instance.
pub struct ServiceHandle<S: ?Sized> {
    service: Weak<S>,
    name: Arc<str>,
}

/// Handle to a transaction manager.
pub type TransactionManagerHandle = ServiceHandle<dyn TransactionManager>;

/// Handle to a synchronization registry.
pub type SynchronizationRegistryHandle = ServiceHandle<dyn SynchronizationRegistry>;

impl<S: ?Sized + Service> ServiceHandle<S> {
    /// Creates a handle that observes `service` without owning it.
    #[must_use]
    pub fn new(service: &Arc<S>) -> Self {
        Self {
            name: Arc::from(service.name()),
            service: Arc::downgrade(service),
        }
    }
}

impl<S: ?Sized> ServiceHandle<S> {
    /// Name captured when the handle was created.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the service if its owner still holds it.
    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<S>> {
        self.service.upgrade()
    }

    /// Whether the owner still holds the service.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.service.strong_count() > 0
    }
}

impl TransactionManagerHandle {
    /// Handle to the process-wide embedded transaction manager.
    #[must_use]
    pub fn embedded() -> Self {
        Self::new(&EMBEDDED)
    }

    /// Whether this handle refers to the embedded transaction manager.
    #[must_use]
    pub fn is_embedded(&self) -> bool {
        self.upgrade().is_some_and(|tm| tm.is_embedded())
    }
}

impl<S: ?Sized> Clone for ServiceHandle<S> {
    fn clone(&self) -> Self {
        Self {
            service: Weak::clone(&self.service),
            name: Arc::clone(&self.name),
        }
    }
}

impl<S: ?Sized> PartialEq for ServiceHandle<S> {
    fn eq(&self, other: &Self) -> bool {
        Weak::ptr_eq(&self.service, &other.service)
    }
}

impl<S: ?Sized> Eq for ServiceHandle<S> {}

impl<S: ?Sized> fmt::Debug for ServiceHandle<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("name", &self.name)
            .field("live", &self.is_live())
            .finish()
    }
}

impl<S: ?Sized> Serialize for ServiceHandle<S> {
    fn serialize<Ser: Serializer>(&self, serializer: Ser) -> Result<Ser::Ok, Ser::Error> {
        serializer.serialize_str(&self.name)
    }
}
