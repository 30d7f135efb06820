//! Payloads of the queues the logs service consumes.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use switchyard_broker::{DecodeError, InboundCommand, decode_payload};

use crate::models::{ActivityLogInput, ActivityLogModifier, ActivityLogQuery, FindOptions};

/// Queue names consumed by the logs service.
pub mod queues {
    pub const PUT_LOG: &str = "putLog";
    pub const VISITOR_CREATE_OR_UPDATE: &str = "visitor:createOrUpdate";
    pub const VISITOR_CONVERT_REQUEST: &str = "visitor:convertRequest";
    pub const VISITOR_UPDATE_ENTRY: &str = "visitor:updateEntry";
    pub const VISITOR_REMOVE_ENTRY: &str = "visitor:removeEntry";
    pub const PUT_ACTIVITY_LOG: &str = "putActivityLog";
    pub const ACTIVITY_LOGS_UPDATE_MANY: &str = "logs.activityLogs.updateMany";
    pub const DELETE_OLD: &str = "logs.delete.old";
    pub const ACTIVITY_LOGS_FIND_MANY: &str = "logs.activityLogs.findMany";
    pub const ACTIVITY_LOGS_INSERT_MANY: &str = "logs.activityLogs.insertMany";

    /// Where a `visitor:convertRequest` answer is published.
    pub const VISITOR_CONVERT_RESPONSE: &str = "visitor:convertResponse";
}

/// The `putActivityLog` queue, selected by envelope action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityLogCommand {
    /// `add`, or no action at all.
    Add(ActivityLogInput),
    /// `removeActivityLogs`
    RemoveMany(RemoveActivityLogs),
    /// `removeActivityLog`
    RemoveForContent(RemoveActivityLog),
}

impl InboundCommand for ActivityLogCommand {
    fn decode(action: Option<&str>, data: JsonValue) -> Result<Option<Self>, DecodeError> {
        let command = match action {
            None => Self::Add(decode_payload("add", data)?),
            Some(action @ "add") => Self::Add(decode_payload(action, data)?),
            Some(action @ "removeActivityLogs") => Self::RemoveMany(decode_payload(action, data)?),
            Some(action @ "removeActivityLog") => {
                Self::RemoveForContent(decode_payload(action, data)?)
            }
            Some(_) => return Ok(None),
        };
        Ok(Some(command))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveActivityLogs {
    #[serde(rename = "type")]
    pub content_type: String,
    pub item_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoveActivityLog {
    #[serde(rename = "contentTypeId")]
    pub content_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorRef {
    pub visitor_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorLocationUpdate {
    pub visitor_id: String,
    pub location: JsonValue,
}

/// `logs.activityLogs.updateMany`; nothing is applied unless both parts are present.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpdateManyActivityLogs {
    #[serde(default)]
    pub query: Option<ActivityLogQuery>,
    #[serde(default)]
    pub modifier: Option<ActivityLogModifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DeleteOldLogs {
    #[serde(default = "DeleteOldLogs::default_months")]
    pub months: u32,
}

impl DeleteOldLogs {
    fn default_months() -> u32 {
        1
    }
}

impl Default for DeleteOldLogs {
    fn default() -> Self {
        Self {
            months: Self::default_months(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FindManyActivityLogs {
    #[serde(default)]
    pub query: ActivityLogQuery,
    #[serde(default)]
    pub options: FindOptions,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InsertManyActivityLogs {
    pub rows: Vec<ActivityLogInput>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn unset_action_adds() {
        let cmd = ActivityLogCommand::decode(
            None,
            json!({ "contentType": "sales:deal", "contentId": "d1", "action": "create" }),
        )
        .unwrap();
        assert!(matches!(cmd, Some(ActivityLogCommand::Add(ref input)) if input.action == "create"));
    }

    #[test]
    fn remove_actions_decode_their_shapes() {
        let many = ActivityLogCommand::decode(
            Some("removeActivityLogs"),
            json!({ "type": "sales:deal", "itemIds": ["d1", "d2"] }),
        )
        .unwrap();
        assert_eq!(
            many,
            Some(ActivityLogCommand::RemoveMany(RemoveActivityLogs {
                content_type: "sales:deal".to_string(),
                item_ids: vec!["d1".to_string(), "d2".to_string()],
            }))
        );

        let one = ActivityLogCommand::decode(Some("removeActivityLog"), json!({ "contentTypeId": "d1" }))
            .unwrap();
        assert_eq!(
            one,
            Some(ActivityLogCommand::RemoveForContent(RemoveActivityLog {
                content_id: "d1".to_string()
            }))
        );
    }

    #[test]
    fn unrecognized_action_is_ignored_even_with_bad_payload() {
        let cmd = ActivityLogCommand::decode(Some("archive"), json!(42)).unwrap();
        assert_eq!(cmd, None);
    }

    #[test]
    fn recognized_action_with_wrong_shape_fails() {
        let err = ActivityLogCommand::decode(Some("removeActivityLogs"), json!({ "type": "x" }))
            .unwrap_err();
        let DecodeError::InvalidPayload { action, .. } = err;
        assert_eq!(action, "removeActivityLogs");
    }

    #[test]
    fn delete_old_defaults_to_one_month() {
        let payload: DeleteOldLogs = serde_json::from_value(json!({})).unwrap();
        assert_eq!(payload.months, 1);
    }
}
