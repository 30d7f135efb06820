//! Capability calls the logs service makes to the services owning content types.
//!
//! Every call goes through the capability gate: a disabled service, or one that
//! does not affirm the capability, is answered with the capability's default
//! without any message being sent.

use serde_json::{Value as JsonValue, json};

use switchyard_broker::{GatewayError, OutboundGateway};
use switchyard_core::TenantId;
use switchyard_discovery::ServiceRegistry;

use crate::models::ActivityLog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCapability {
    GetSchemaLabels,
    GetActivityContent,
    GetContentTypeDetail,
    CollectItems,
    GetContentIds,
}

impl LogCapability {
    pub const ALL: [LogCapability; 5] = [
        Self::GetSchemaLabels,
        Self::GetActivityContent,
        Self::GetContentTypeDetail,
        Self::CollectItems,
        Self::GetContentIds,
    ];

    /// Capability name, also the suffix of the remote queue name.
    pub fn name(self) -> &'static str {
        match self {
            Self::GetSchemaLabels => "getSchemaLabels",
            Self::GetActivityContent => "getActivityContent",
            Self::GetContentTypeDetail => "getContentTypeDetail",
            Self::CollectItems => "collectItems",
            Self::GetContentIds => "getContentIds",
        }
    }

    /// What the caller gets when the capability is unavailable.
    pub fn default_value(self) -> JsonValue {
        match self {
            Self::GetSchemaLabels | Self::CollectItems | Self::GetContentIds => json!([]),
            Self::GetActivityContent | Self::GetContentTypeDetail => JsonValue::Null,
        }
    }
}

/// Typed wrappers over [`OutboundGateway`] for the log capabilities.
#[derive(Debug)]
pub struct RemoteContent<G> {
    gateway: OutboundGateway<G>,
}

impl<G> RemoteContent<G>
where
    G: ServiceRegistry,
{
    pub fn new(gateway: OutboundGateway<G>) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &OutboundGateway<G> {
        &self.gateway
    }

    /// Labels of the fields of `content_type`, for rendering log diffs.
    pub async fn fetch_schema_labels(
        &self,
        tenant: &TenantId,
        content_type: &str,
        args: JsonValue,
    ) -> Result<JsonValue, GatewayError> {
        self.call(tenant, content_type, LogCapability::GetSchemaLabels, args)
            .await
    }

    pub async fn fetch_activity_content(
        &self,
        tenant: &TenantId,
        activity_log: &ActivityLog,
    ) -> Result<JsonValue, GatewayError> {
        self.call_with_log(tenant, LogCapability::GetActivityContent, activity_log)
            .await
    }

    pub async fn fetch_content_type_detail(
        &self,
        tenant: &TenantId,
        activity_log: &ActivityLog,
    ) -> Result<JsonValue, GatewayError> {
        self.call_with_log(tenant, LogCapability::GetContentTypeDetail, activity_log)
            .await
    }

    pub async fn collect_items(
        &self,
        tenant: &TenantId,
        content_type: &str,
        data: JsonValue,
    ) -> Result<JsonValue, GatewayError> {
        self.call(tenant, content_type, LogCapability::CollectItems, data)
            .await
    }

    pub async fn fetch_content_ids(
        &self,
        tenant: &TenantId,
        content_type: &str,
        data: JsonValue,
    ) -> Result<JsonValue, GatewayError> {
        self.call(tenant, content_type, LogCapability::GetContentIds, data)
            .await
    }

    /// Any other capability by name, with a caller-chosen default.
    pub async fn fetch_service(
        &self,
        tenant: &TenantId,
        content_type: &str,
        capability: &str,
        data: JsonValue,
        default: Option<JsonValue>,
    ) -> Result<JsonValue, GatewayError> {
        self.gateway
            .call_capability(tenant, content_type, capability, data, default)
            .await
    }

    async fn call(
        &self,
        tenant: &TenantId,
        content_type: &str,
        capability: LogCapability,
        payload: JsonValue,
    ) -> Result<JsonValue, GatewayError> {
        self.gateway
            .call_capability(
                tenant,
                content_type,
                capability.name(),
                payload,
                Some(capability.default_value()),
            )
            .await
    }

    async fn call_with_log(
        &self,
        tenant: &TenantId,
        capability: LogCapability,
        activity_log: &ActivityLog,
    ) -> Result<JsonValue, GatewayError> {
        let payload = json!({ "activityLog": activity_log });
        self.call(tenant, &activity_log.content_type, capability, payload)
            .await
    }
}
