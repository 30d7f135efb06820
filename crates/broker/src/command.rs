//! Inbound command decoding and per-handler delivery contracts.
//!
//! A queue may carry several logical operations, selected by the envelope's
//! `action`. Each such queue gets a closed enum implementing [`InboundCommand`]:
//!
//! - unset action      -> the queue's default operation
//! - recognized action -> the matching variant, payload validated for its shape
//! - any other action  -> `Ok(None)`: acknowledged, nothing applied
//!
//! Queues with a single operation use [`Json`], which ignores `action`.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid payload for `{action}`: {reason}")]
    InvalidPayload { action: String, reason: String },
}

/// A command decoded from `(action, data)`.
pub trait InboundCommand: Sized + Send + 'static {
    /// `Ok(None)` means the action is not one this queue handles.
    fn decode(action: Option<&str>, data: JsonValue) -> Result<Option<Self>, DecodeError>;
}

/// Single-operation payload: deserialize `data` as `T`, whatever the action.
#[derive(Debug, Clone, PartialEq)]
pub struct Json<T>(pub T);

impl<T> InboundCommand for Json<T>
where
    T: DeserializeOwned + Send + 'static,
{
    fn decode(action: Option<&str>, data: JsonValue) -> Result<Option<Self>, DecodeError> {
        decode_payload(action.unwrap_or("default"), data).map(|v| Some(Json(v)))
    }
}

/// Deserialize a payload, labelling failures with the action they were decoded for.
pub fn decode_payload<T: DeserializeOwned>(action: &str, data: JsonValue) -> Result<T, DecodeError> {
    serde_json::from_value(data).map_err(|e| DecodeError::InvalidPayload {
        action: action.to_string(),
        reason: e.to_string(),
    })
}

/// Effect contract of a fire-and-forget handler under at-least-once delivery.
///
/// Every fire-and-forget registration declares one; the transport may redeliver
/// any message whose handler failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotence {
    /// Applying the command twice leaves the same state as applying it once.
    Natural,
    /// Not naturally idempotent; deduplicated by the id in this payload field.
    ///
    /// When an object payload has no such field (or it is null), the dispatcher
    /// fills it with the delivery's message id, so a redelivered message carries
    /// the same key as the first attempt.
    KeyedBy(&'static str),
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct RemoveEntry {
        visitor_id: String,
    }

    #[test]
    fn json_ignores_action_and_decodes_shape() {
        let cmd = Json::<RemoveEntry>::decode(Some("whatever"), json!({ "visitorId": "v1" }))
            .unwrap()
            .unwrap();
        assert_eq!(cmd.0.visitor_id, "v1");
    }

    #[test]
    fn json_reports_shape_errors_with_action() {
        let err = Json::<RemoveEntry>::decode(None, json!({ "visitor": 1 })).unwrap_err();
        let DecodeError::InvalidPayload { action, .. } = err;
        assert_eq!(action, "default");
    }
}
