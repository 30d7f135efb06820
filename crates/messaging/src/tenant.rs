use switchyard_core::TenantId;

use crate::MessageEnvelope;

/// Helper trait for tenant-scoped messages.
///
/// Infrastructure (the dispatcher, transports) uses this to route a message to the
/// right tenant partition without knowing the concrete message type.
pub trait TenantScoped {
    fn tenant_id(&self) -> &TenantId;
}

impl TenantScoped for MessageEnvelope {
    fn tenant_id(&self) -> &TenantId {
        self.tenant()
    }
}
