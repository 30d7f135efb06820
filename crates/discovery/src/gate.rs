//! Capability gate: reachability AND declared support.
//!
//! The gate answers one question for outbound calls: may we send `capability` to
//! `service` right now? It consults the registry in two steps:
//!
//! ```text
//! is_enabled(service) ── false ──► deny (no descriptor lookup)
//!        │ true
//! descriptor(service) ── absent ─► deny
//!        │
//! capabilities[capability].provides == true ? allow : deny
//! ```
//!
//! A disabled service and an enabled service lacking the capability are the same
//! outcome for callers: both degrade to the caller's default.

use serde::Serialize;
use tracing::debug;

use crate::ServiceRegistry;

/// Why the gate denied a capability request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateDenial {
    ServiceDisabled,
    UnknownService,
    CapabilityNotDeclared,
    CapabilityNotProvided,
}

/// Outcome of a gate check, with the reason when denied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GateDecision {
    pub service: String,
    pub capability: String,
    pub denial: Option<GateDenial>,
}

impl GateDecision {
    pub fn granted(&self) -> bool {
        self.denial.is_none()
    }
}

/// Registry-backed capability gate. Never caches: every check re-reads the registry.
#[derive(Debug, Clone)]
pub struct CapabilityGate<R> {
    registry: R,
}

impl<R> CapabilityGate<R>
where
    R: ServiceRegistry,
{
    pub fn new(registry: R) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }

    pub async fn is_authorized(&self, service: &str, capability: &str) -> bool {
        self.explain(service, capability).await.granted()
    }

    /// Run the gate and report which step decided the outcome.
    pub async fn explain(&self, service: &str, capability: &str) -> GateDecision {
        let denial = self.check(service, capability).await;

        if let Some(reason) = denial {
            debug!(service, capability, reason = ?reason, "capability gate denied");
        }

        GateDecision {
            service: service.to_string(),
            capability: capability.to_string(),
            denial,
        }
    }

    async fn check(&self, service: &str, capability: &str) -> Option<GateDenial> {
        if !self.registry.is_enabled(service).await {
            return Some(GateDenial::ServiceDisabled);
        }

        let Some(descriptor) = self.registry.descriptor(service).await else {
            return Some(GateDenial::UnknownService);
        };

        match descriptor.capability(capability) {
            None => Some(GateDenial::CapabilityNotDeclared),
            Some(c) if !c.provides() => Some(GateDenial::CapabilityNotProvided),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::{CapabilityDescriptor, InMemoryServiceRegistry, ServiceDescriptor};

    fn billing(enabled: bool) -> ServiceDescriptor {
        ServiceDescriptor::new("billing", enabled)
            .with_capability("getSchemaLabels", CapabilityDescriptor::provided())
            .with_capability("collectItems", CapabilityDescriptor::from(json!({ "provides": false })))
    }

    #[tokio::test]
    async fn disabled_service_short_circuits_before_descriptor_lookup() {
        let registry = Arc::new(InMemoryServiceRegistry::from_descriptors([billing(false)]));
        let gate = CapabilityGate::new(registry.clone());

        let decision = gate.explain("billing", "getSchemaLabels").await;

        assert_eq!(decision.denial, Some(GateDenial::ServiceDisabled));
        assert_eq!(registry.descriptor_lookups(), 0);
    }

    #[tokio::test]
    async fn requires_declared_and_affirmed_capability() {
        let gate = CapabilityGate::new(InMemoryServiceRegistry::from_descriptors([billing(true)]));

        assert!(gate.is_authorized("billing", "getSchemaLabels").await);
        assert_eq!(
            gate.explain("billing", "collectItems").await.denial,
            Some(GateDenial::CapabilityNotProvided)
        );
        assert_eq!(
            gate.explain("billing", "getContentIds").await.denial,
            Some(GateDenial::CapabilityNotDeclared)
        );
    }

    #[tokio::test]
    async fn reflects_registry_changes_without_caching() {
        let registry = Arc::new(InMemoryServiceRegistry::from_descriptors([billing(true)]));
        let gate = CapabilityGate::new(registry.clone());

        assert!(gate.is_authorized("billing", "getSchemaLabels").await);
        registry.set_enabled("billing", false);
        assert!(!gate.is_authorized("billing", "getSchemaLabels").await);
        registry.set_enabled("billing", true);
        assert!(gate.is_authorized("billing", "getSchemaLabels").await);
    }

    /// Registry that claims a service is enabled but has no descriptor for it.
    struct EnabledWithoutDescriptor;

    #[async_trait]
    impl ServiceRegistry for EnabledWithoutDescriptor {
        async fn is_enabled(&self, _service: &str) -> bool {
            true
        }

        async fn descriptor(&self, _service: &str) -> Option<ServiceDescriptor> {
            None
        }
    }

    #[tokio::test]
    async fn enabled_but_absent_descriptor_is_denied() {
        let gate = CapabilityGate::new(EnabledWithoutDescriptor);
        assert_eq!(
            gate.explain("billing", "getSchemaLabels").await.denial,
            Some(GateDenial::UnknownService)
        );
    }

    proptest! {
        #[test]
        fn grants_only_when_enabled_and_provided(enabled in any::<bool>(), flag in prop_oneof![
            Just(json!(true)),
            Just(json!(false)),
            Just(json!("true")),
            Just(json!(1)),
            Just(json!(null)),
        ]) {
            let descriptor = ServiceDescriptor::new("svc", enabled)
                .with_capability("cap", CapabilityDescriptor::from(json!({ "provides": flag.clone() })));
            let gate = CapabilityGate::new(InMemoryServiceRegistry::from_descriptors([descriptor]));

            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let granted = rt.block_on(gate.is_authorized("svc", "cap"));

            prop_assert_eq!(granted, enabled && flag == json!(true));
        }
    }
}
