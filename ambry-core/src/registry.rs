use crate::error::{AmbryError, Result};
use crate::storage::BlobStorageConnector;
use std::sync::Arc;

/// Maps locator namespaces to storage connectors.
///
/// Registration order is preserved: the first registered namespace is the
/// default used when a caller does not name one. Resolution fails closed on
/// unknown namespaces rather than defaulting silently.
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: Vec<(String, Arc<dyn BlobStorageConnector>)>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under a namespace, replacing any existing
    /// registration for the same namespace in place.
    pub fn register(
        &mut self,
        namespace: impl Into<String>,
        connector: Arc<dyn BlobStorageConnector>,
    ) {
        let namespace = namespace.into();
        if let Some(slot) = self
            .connectors
            .iter_mut()
            .find(|(existing, _)| *existing == namespace)
        {
            slot.1 = connector;
        } else {
            self.connectors.push((namespace, connector));
        }
    }

    pub fn resolve(&self, namespace: &str) -> Result<Arc<dyn BlobStorageConnector>> {
        self.connectors
            .iter()
            .find(|(existing, _)| existing == namespace)
            .map(|(_, connector)| connector.clone())
            .ok_or_else(|| AmbryError::NoBackendRegistered(namespace.to_string()))
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.connectors
            .iter()
            .any(|(existing, _)| existing == namespace)
    }

    /// Registered namespaces in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.connectors
            .iter()
            .map(|(namespace, _)| namespace.as_str())
            .collect()
    }

    pub fn first_namespace(&self) -> Option<&str> {
        self.connectors
            .first()
            .map(|(namespace, _)| namespace.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}
