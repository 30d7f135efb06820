//! Outbound capability calls with graceful degradation.
//!
//! ```text
//! "<service>:<type>" ──parse──► service, type      (malformed → error, nothing sent)
//!        ↓
//! gate.is_authorized(service, capability)          (denied → caller default)
//!        ↓
//! request "<service>:<namespace>.<capability>"  { ...payload, type }
//!        ↓
//! response.data                                    (timeout/transport failure →
//!                                                   default if supplied, else error)
//! ```
//!
//! Every named outbound operation is this one algorithm with a different capability
//! name and default.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{Instrument, debug, info_span, warn};

use switchyard_core::{QualifiedContentType, TenantId};
use switchyard_discovery::{CapabilityGate, ServiceRegistry};
use switchyard_messaging::MessageEnvelope;

use crate::{BrokerContext, GatewayError};

/// One outbound capability call.
#[derive(Debug, Clone, PartialEq)]
pub struct CapabilityRequest {
    tenant: TenantId,
    target: QualifiedContentType,
    capability: String,
    payload: JsonValue,
    default: Option<JsonValue>,
    timeout: Option<Duration>,
}

impl CapabilityRequest {
    /// Fails with [`GatewayError::MalformedIdentifier`] when `qualified_id` has no
    /// `<service>:` prefix.
    pub fn new(
        tenant: TenantId,
        qualified_id: &str,
        capability: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let target = QualifiedContentType::parse(qualified_id)
            .map_err(|_| GatewayError::MalformedIdentifier(qualified_id.to_string()))?;

        Ok(Self {
            tenant,
            target,
            capability: capability.into(),
            payload: JsonValue::Null,
            default: None,
            timeout: None,
        })
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = payload;
        self
    }

    /// Value returned when the target cannot serve the call. Also opts the call into
    /// degrading on timeout and transport failure.
    pub fn with_default(mut self, default: JsonValue) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn target(&self) -> &QualifiedContentType {
        &self.target
    }

    pub fn capability(&self) -> &str {
        &self.capability
    }
}

/// Capability-gated outbound RPC.
#[derive(Debug)]
pub struct OutboundGateway<G> {
    broker: Arc<BrokerContext>,
    gate: CapabilityGate<G>,
}

impl<G> OutboundGateway<G>
where
    G: ServiceRegistry,
{
    pub fn new(broker: Arc<BrokerContext>, registry: G) -> Self {
        Self {
            broker,
            gate: CapabilityGate::new(registry),
        }
    }

    pub fn gate(&self) -> &CapabilityGate<G> {
        &self.gate
    }

    /// Queue name serving `capability` on `service`.
    pub fn queue_name(&self, service: &str, capability: &str) -> String {
        format!(
            "{service}:{}.{capability}",
            self.broker.config().capability_namespace
        )
    }

    /// Call `capability` on the service owning `qualified_id`.
    ///
    /// Returns `default` (or `null` when none is given) without touching the
    /// transport if the service is disabled or does not provide the capability.
    pub async fn call_capability(
        &self,
        tenant: &TenantId,
        qualified_id: &str,
        capability: &str,
        payload: JsonValue,
        default: Option<JsonValue>,
    ) -> Result<JsonValue, GatewayError> {
        let mut request =
            CapabilityRequest::new(tenant.clone(), qualified_id, capability)?.with_payload(payload);
        if let Some(default) = default {
            request = request.with_default(default);
        }
        self.send(request).await
    }

    pub async fn send(&self, request: CapabilityRequest) -> Result<JsonValue, GatewayError> {
        let service = request.target.service().to_string();
        let span = info_span!(
            "capability_call",
            tenant = %request.tenant,
            service = %service,
            capability = %request.capability,
        );

        async move {
            let decision = self.gate.explain(&service, &request.capability).await;
            if let Some(reason) = decision.denial {
                debug!(reason = ?reason, "capability unavailable; returning default");
                return Ok(request.default.unwrap_or(JsonValue::Null));
            }

            let queue = self.queue_name(&service, &request.capability);
            let payload = with_type(request.payload, request.target.type_name())?;
            let envelope = MessageEnvelope::new(request.tenant, payload);
            let timeout = request.timeout.unwrap_or(self.broker.config().rpc_timeout);

            let outcome = tokio::time::timeout(timeout, self.broker.transport().request(&queue, envelope)).await;

            let failure = match outcome {
                Ok(Ok(response)) => {
                    return response
                        .into_result()
                        .map_err(|message| GatewayError::Remote { queue, message });
                }
                Ok(Err(source)) => GatewayError::Transport { queue, source },
                Err(_) => GatewayError::Timeout { queue, timeout },
            };

            match request.default {
                Some(default) => {
                    warn!(error = %failure, "capability call failed; degrading to default");
                    Ok(default)
                }
                None => Err(failure),
            }
        }
        .instrument(span)
        .await
    }
}

/// Attach the qualified id's remainder as `type`.
fn with_type(payload: JsonValue, type_name: &str) -> Result<JsonValue, GatewayError> {
    let mut map = match payload {
        JsonValue::Object(map) => map,
        JsonValue::Null => serde_json::Map::new(),
        JsonValue::Array(_) => return Err(GatewayError::InvalidPayload("an array")),
        JsonValue::String(_) => return Err(GatewayError::InvalidPayload("a string")),
        JsonValue::Number(_) => return Err(GatewayError::InvalidPayload("a number")),
        JsonValue::Bool(_) => return Err(GatewayError::InvalidPayload("a boolean")),
    };
    map.insert("type".to_string(), JsonValue::String(type_name.to_string()));
    Ok(JsonValue::Object(map))
}
