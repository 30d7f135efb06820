use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;

use crate::ServiceDescriptor;

/// Service registry boundary (consumed, never owned, by the broker).
///
/// Implementations may be backed by a discovery service, a config file or a
/// cache; whatever they return is treated as current and re-read on every check.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn is_enabled(&self, service: &str) -> bool;

    async fn descriptor(&self, service: &str) -> Option<ServiceDescriptor>;
}

#[async_trait]
impl<R> ServiceRegistry for Arc<R>
where
    R: ServiceRegistry + ?Sized,
{
    async fn is_enabled(&self, service: &str) -> bool {
        (**self).is_enabled(service).await
    }

    async fn descriptor(&self, service: &str) -> Option<ServiceDescriptor> {
        (**self).descriptor(service).await
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to parse service descriptors: {0}")]
    Parse(String),
}

/// In-memory registry for tests/dev and static deployments.
///
/// Counts `descriptor` lookups so tests can assert the gate short-circuits.
#[derive(Debug, Default)]
pub struct InMemoryServiceRegistry {
    services: RwLock<HashMap<String, ServiceDescriptor>>,
    descriptor_lookups: AtomicU64,
}

impl InMemoryServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(descriptors: impl IntoIterator<Item = ServiceDescriptor>) -> Self {
        let registry = Self::new();
        for d in descriptors {
            registry.upsert(d);
        }
        registry
    }

    /// Load a JSON array of descriptors.
    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let descriptors: Vec<ServiceDescriptor> =
            serde_json::from_str(raw).map_err(|e| RegistryError::Parse(e.to_string()))?;
        Ok(Self::from_descriptors(descriptors))
    }

    pub fn upsert(&self, descriptor: ServiceDescriptor) {
        if let Ok(mut map) = self.services.write() {
            map.insert(descriptor.name().to_string(), descriptor);
        }
    }

    /// Flip enablement of a known service. Returns false if the service is unknown.
    pub fn set_enabled(&self, service: &str, enabled: bool) -> bool {
        match self.services.write() {
            Ok(mut map) => match map.get_mut(service) {
                Some(d) => {
                    d.set_enabled(enabled);
                    true
                }
                None => false,
            },
            Err(_) => false,
        }
    }

    pub fn remove(&self, service: &str) -> Option<ServiceDescriptor> {
        self.services.write().ok()?.remove(service)
    }

    pub fn descriptor_lookups(&self) -> u64 {
        self.descriptor_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceRegistry for InMemoryServiceRegistry {
    async fn is_enabled(&self, service: &str) -> bool {
        self.services
            .read()
            .map(|map| map.get(service).map(ServiceDescriptor::enabled).unwrap_or(false))
            .unwrap_or(false)
    }

    async fn descriptor(&self, service: &str) -> Option<ServiceDescriptor> {
        self.descriptor_lookups.fetch_add(1, Ordering::SeqCst);
        self.services.read().ok()?.get(service).cloned()
    }
}
