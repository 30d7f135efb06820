use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use switchyard_core::{MessageId, TenantId};

/// Envelope for an inbound or outbound queue message.
///
/// Notes:
/// - **Multi-tenancy** is carried here via `tenant`; every message names one.
/// - `action` selects a sub-operation when several commands share one queue.
/// - `message_id` is assigned once by the sender and survives redelivery.
/// - `data` is opaque structured data; the broker never inspects it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    #[serde(default)]
    message_id: MessageId,

    #[serde(alias = "subdomain")]
    tenant: TenantId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,

    #[serde(default)]
    data: JsonValue,
}

impl MessageEnvelope {
    pub fn new(tenant: TenantId, data: JsonValue) -> Self {
        Self {
            message_id: MessageId::new(),
            tenant,
            action: None,
            data,
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_message_id(mut self, message_id: MessageId) -> Self {
        self.message_id = message_id;
        self
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn action(&self) -> Option<&str> {
        self.action.as_deref()
    }

    pub fn data(&self) -> &JsonValue {
        &self.data
    }

    pub fn into_data(self) -> JsonValue {
        self.data
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RpcStatus {
    Success,
    Error,
}

/// Wire contract every RPC handler produces: `{status, data}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcResponse {
    status: RpcStatus,

    #[serde(default)]
    data: JsonValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
}

impl RpcResponse {
    pub fn success(data: JsonValue) -> Self {
        Self {
            status: RpcStatus::Success,
            data,
            error_message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: RpcStatus::Error,
            data: JsonValue::Null,
            error_message: Some(message.into()),
        }
    }

    pub fn status(&self) -> RpcStatus {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status == RpcStatus::Success
    }

    pub fn data(&self) -> &JsonValue {
        &self.data
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Unwrap into the `data` field, or the remote error message.
    pub fn into_result(self) -> Result<JsonValue, String> {
        match self.status {
            RpcStatus::Success => Ok(self.data),
            RpcStatus::Error => Err(self
                .error_message
                .unwrap_or_else(|| "remote handler failed".to_string())),
        }
    }
}
