use std::sync::Arc;

use tracing::info;

use switchyard_messaging::{MessageEnvelope, Transport, TransportError};

use crate::BrokerConfig;

/// The process's broker connection.
///
/// Built once during startup wiring and shared by `Arc` with the dispatcher and the
/// gateway. There is no global: whoever needs the transport is handed this context.
pub struct BrokerContext {
    transport: Arc<dyn Transport>,
    config: BrokerConfig,
}

impl core::fmt::Debug for BrokerContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BrokerContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BrokerContext {
    pub fn connect(transport: impl Transport + 'static, config: BrokerConfig) -> Arc<Self> {
        info!(
            service = %config.service_name,
            namespace = %config.capability_namespace,
            rpc_timeout_ms = config.rpc_timeout.as_millis() as u64,
            "broker connected"
        );

        Arc::new(Self {
            transport: Arc::new(transport),
            config,
        })
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Fire-and-forget send to another service's queue.
    pub async fn publish(&self, queue: &str, envelope: MessageEnvelope) -> Result<(), TransportError> {
        self.transport.publish(queue, envelope).await
    }
}
