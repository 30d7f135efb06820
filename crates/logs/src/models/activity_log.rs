//! Activity logs: what happened to a piece of content, and who did it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::debug;

use switchyard_core::{RecordId, TenantId};

use crate::models::ModelError;
use crate::store::TenantStore;

pub type ActivityLogStore = Arc<dyn TenantStore<RecordId, ActivityLog>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    #[serde(alias = "_id")]
    pub id: RecordId,
    pub content_type: String,
    pub content_id: String,
    pub action: String,
    #[serde(default)]
    pub content: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A new activity log as producers send it.
///
/// `id` is optional; when given, re-adding the same id is a no-op.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLogInput {
    #[serde(default, alias = "_id")]
    pub id: Option<RecordId>,
    pub content_type: String,
    pub content_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub content: JsonValue,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ActivityLogInput {
    pub fn new(content_type: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            id: None,
            content_type: content_type.into(),
            content_id: content_id.into(),
            action: String::new(),
            content: JsonValue::Null,
            created_by: None,
            created_at: None,
        }
    }

    pub fn with_id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.content_type.trim().is_empty() {
            return Err(ModelError::validation("activity log: contentType is required"));
        }
        if self.content_id.trim().is_empty() {
            return Err(ModelError::validation("activity log: contentId is required"));
        }
        Ok(())
    }

    fn into_record(self, now: DateTime<Utc>) -> ActivityLog {
        ActivityLog {
            id: self.id.unwrap_or_default(),
            content_type: self.content_type,
            content_id: self.content_id,
            action: self.action,
            content: self.content,
            created_by: self.created_by,
            created_at: self.created_at.unwrap_or(now),
        }
    }
}

/// Filter over activity logs. Every set field must match; an empty query matches all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActivityLogQuery {
    #[serde(default, alias = "type")]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub content_ids: Option<Vec<String>>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl ActivityLogQuery {
    pub fn by_content_type(content_type: impl Into<String>) -> Self {
        Self {
            content_type: Some(content_type.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, log: &ActivityLog) -> bool {
        fn eq(filter: &Option<String>, value: &str) -> bool {
            filter.as_deref().is_none_or(|f| f == value)
        }

        eq(&self.content_type, &log.content_type)
            && eq(&self.content_id, &log.content_id)
            && eq(&self.action, &log.action)
            && self
                .created_by
                .as_deref()
                .is_none_or(|f| log.created_by.as_deref() == Some(f))
            && self
                .content_ids
                .as_ref()
                .is_none_or(|ids| ids.iter().any(|id| *id == log.content_id))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// Paging and ordering for [`ActivityLogs::find`]. Results are ordered by `createdAt`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindOptions {
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub sort: Option<SortOrder>,
}

/// Fields an update sets. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ActivityLogPatch {
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub content: Option<JsonValue>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl ActivityLogPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Returns true when the log changed.
    pub fn apply(&self, log: &mut ActivityLog) -> bool {
        let before = log.clone();
        if let Some(v) = &self.content_type {
            log.content_type = v.clone();
        }
        if let Some(v) = &self.content_id {
            log.content_id = v.clone();
        }
        if let Some(v) = &self.action {
            log.action = v.clone();
        }
        if let Some(v) = &self.content {
            log.content = v.clone();
        }
        if let Some(v) = &self.created_by {
            log.created_by = Some(v.clone());
        }
        *log != before
    }
}

/// Update modifier as producers send it: either the patch itself or wrapped in `$set`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ActivityLogModifier {
    Set {
        #[serde(rename = "$set")]
        set: ActivityLogPatch,
    },
    Patch(ActivityLogPatch),
}

impl ActivityLogModifier {
    pub fn into_patch(self) -> ActivityLogPatch {
        match self {
            Self::Set { set } => set,
            Self::Patch(patch) => patch,
        }
    }
}

/// One tenant's activity logs.
#[derive(Clone)]
pub struct ActivityLogs {
    tenant: TenantId,
    store: ActivityLogStore,
}

impl core::fmt::Debug for ActivityLogs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActivityLogs")
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

impl ActivityLogs {
    pub fn new(tenant: TenantId, store: ActivityLogStore) -> Self {
        Self { tenant, store }
    }

    /// Add one log. If `input.id` names an existing log, that log is returned unchanged.
    pub fn add(&self, input: ActivityLogInput, now: DateTime<Utc>) -> Result<ActivityLog, ModelError> {
        input.validate()?;
        let record = input.into_record(now);
        match self
            .store
            .insert_if_absent(&self.tenant, record.id, record.clone())
        {
            Some(existing) => {
                debug!(tenant = %self.tenant, id = %existing.id, "activity log already recorded");
                Ok(existing)
            }
            None => Ok(record),
        }
    }

    /// Add several logs with the same per-row dedup as [`ActivityLogs::add`].
    ///
    /// Every row is validated before any is written.
    pub fn insert_many(
        &self,
        rows: Vec<ActivityLogInput>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ActivityLog>, ModelError> {
        for row in &rows {
            row.validate()?;
        }
        rows.into_iter().map(|row| self.add(row, now)).collect()
    }

    /// Remove the logs of `item_ids` of the given content type.
    pub fn remove_activity_logs(&self, content_type: &str, item_ids: &[String]) -> usize {
        self.store.remove_where(&self.tenant, &|log: &ActivityLog| {
            log.content_type == content_type && item_ids.iter().any(|id| *id == log.content_id)
        })
    }

    /// Remove every log about one piece of content.
    pub fn remove_activity_log(&self, content_id: &str) -> usize {
        self.store
            .remove_where(&self.tenant, &|log: &ActivityLog| log.content_id == content_id)
    }

    pub fn update_many(&self, query: &ActivityLogQuery, patch: &ActivityLogPatch) -> usize {
        if patch.is_empty() {
            return 0;
        }
        self.store.update_where(&self.tenant, &|log: &mut ActivityLog| {
            query.matches(log) && patch.apply(log)
        })
    }

    pub fn get(&self, id: &RecordId) -> Option<ActivityLog> {
        self.store.get(&self.tenant, id)
    }

    pub fn find(&self, query: &ActivityLogQuery, options: &FindOptions) -> Vec<ActivityLog> {
        let mut logs: Vec<ActivityLog> = self
            .store
            .list(&self.tenant)
            .into_iter()
            .filter(|log| query.matches(log))
            .collect();

        logs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        if options.sort == Some(SortOrder::Desc) {
            logs.reverse();
        }

        logs.into_iter()
            .skip(options.skip.unwrap_or(0))
            .take(options.limit.unwrap_or(usize::MAX))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::store::InMemoryTenantStore;

    fn logs(tenant: &str) -> ActivityLogs {
        ActivityLogs::new(
            TenantId::new(tenant).unwrap(),
            Arc::new(InMemoryTenantStore::<RecordId, ActivityLog>::new()),
        )
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn add_with_same_id_is_recorded_once() {
        let logs = logs("acme");
        let id = RecordId::new();
        let input = ActivityLogInput::new("sales:deal", "d1")
            .with_id(id)
            .with_action("create");

        let first = logs.add(input.clone(), at(1)).unwrap();
        let second = logs.add(input, at(2)).unwrap();

        assert_eq!(first, second);
        assert_eq!(second.created_at, at(1));
        assert_eq!(logs.find(&ActivityLogQuery::default(), &FindOptions::default()).len(), 1);
    }

    #[test]
    fn add_rejects_missing_content_id() {
        let err = logs("acme")
            .add(ActivityLogInput::new("sales:deal", " "), at(1))
            .unwrap_err();
        assert!(matches!(err, ModelError::Validation(_)));
    }

    #[test]
    fn insert_many_writes_nothing_when_a_row_is_invalid() {
        let logs = logs("acme");
        let rows = vec![
            ActivityLogInput::new("sales:deal", "d1"),
            ActivityLogInput::new("", "d2"),
        ];

        assert!(logs.insert_many(rows, at(1)).is_err());
        assert!(logs.find(&ActivityLogQuery::default(), &FindOptions::default()).is_empty());
    }

    #[test]
    fn removes_by_type_and_items_or_by_content() {
        let logs = logs("acme");
        for (ty, id) in [("sales:deal", "d1"), ("sales:deal", "d2"), ("tasks:task", "d1")] {
            logs.add(ActivityLogInput::new(ty, id), at(1)).unwrap();
        }

        assert_eq!(logs.remove_activity_logs("sales:deal", &["d1".to_string()]), 1);
        assert_eq!(logs.remove_activity_logs("sales:deal", &["d1".to_string()]), 0);
        assert_eq!(logs.remove_activity_log("d2"), 1);

        let left = logs.find(&ActivityLogQuery::default(), &FindOptions::default());
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].content_type, "tasks:task");
    }

    #[test]
    fn find_filters_sorts_and_pages() {
        let logs = logs("acme");
        for day in 1..=5 {
            logs.add(ActivityLogInput::new("sales:deal", format!("d{day}")), at(day))
                .unwrap();
        }
        logs.add(ActivityLogInput::new("tasks:task", "t1"), at(6)).unwrap();

        let query: ActivityLogQuery = serde_json::from_value(json!({ "type": "sales:deal" })).unwrap();
        let options: FindOptions =
            serde_json::from_value(json!({ "sort": "desc", "skip": 1, "limit": 2 })).unwrap();

        let found: Vec<String> = logs
            .find(&query, &options)
            .into_iter()
            .map(|l| l.content_id)
            .collect();
        assert_eq!(found, vec!["d4", "d3"]);
    }

    #[test]
    fn query_rejects_unknown_fields() {
        let parsed = serde_json::from_value::<ActivityLogQuery>(json!({ "contentTypo": "x" }));
        assert!(parsed.is_err());
    }

    #[test]
    fn update_many_applies_set_modifier_once() {
        let logs = logs("acme");
        logs.add(ActivityLogInput::new("sales:deal", "d1"), at(1)).unwrap();
        logs.add(ActivityLogInput::new("tasks:task", "t1"), at(1)).unwrap();

        let modifier: ActivityLogModifier =
            serde_json::from_value(json!({ "$set": { "createdBy": "u1" } })).unwrap();
        let patch = modifier.into_patch();
        let query = ActivityLogQuery::by_content_type("sales:deal");

        assert_eq!(logs.update_many(&query, &patch), 1);
        assert_eq!(logs.update_many(&query, &patch), 0);

        let updated = logs.find(&query, &FindOptions::default());
        assert_eq!(updated[0].created_by.as_deref(), Some("u1"));
    }

    #[test]
    fn tenants_do_not_see_each_other() {
        let store: ActivityLogStore = Arc::new(InMemoryTenantStore::<RecordId, ActivityLog>::new());
        let acme = ActivityLogs::new(TenantId::new("acme").unwrap(), Arc::clone(&store));
        let globex = ActivityLogs::new(TenantId::new("globex").unwrap(), store);

        acme.add(ActivityLogInput::new("sales:deal", "d1"), at(1)).unwrap();

        assert!(globex.find(&ActivityLogQuery::default(), &FindOptions::default()).is_empty());
        assert_eq!(globex.remove_activity_log("d1"), 0);
        assert_eq!(acme.find(&ActivityLogQuery::default(), &FindOptions::default()).len(), 1);
    }

    proptest! {
        #[test]
        fn find_pages_through_the_ordered_result(
            days in proptest::collection::vec(1u32..=28, 0..20),
            skip in proptest::option::of(0usize..25),
            limit in proptest::option::of(0usize..25),
            desc in any::<bool>(),
        ) {
            let logs = logs("acme");
            for (n, day) in days.iter().enumerate() {
                logs.add(ActivityLogInput::new("sales:deal", format!("d{n}")), at(*day)).unwrap();
            }
            let sort = Some(if desc { SortOrder::Desc } else { SortOrder::Asc });
            let query = ActivityLogQuery::default();

            let all = logs.find(&query, &FindOptions { skip: None, limit: None, sort });
            let page = logs.find(&query, &FindOptions { skip, limit, sort });

            let expected_len = days
                .len()
                .saturating_sub(skip.unwrap_or(0))
                .min(limit.unwrap_or(usize::MAX));
            prop_assert_eq!(all.len(), days.len());
            prop_assert_eq!(page.len(), expected_len);
            prop_assert_eq!(&page[..], &all[skip.unwrap_or(0).min(all.len())..][..expected_len]);
            for pair in all.windows(2) {
                if desc {
                    prop_assert!(pair[0].created_at >= pair[1].created_at);
                } else {
                    prop_assert!(pair[0].created_at <= pair[1].created_at);
                }
            }
        }
    }
}
