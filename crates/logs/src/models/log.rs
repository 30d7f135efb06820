//! Audit log entries written through `putLog`.

use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info};

use switchyard_core::{RecordId, TenantId};

use crate::models::ModelError;
use crate::store::TenantStore;

pub type LogStore = Arc<dyn TenantStore<RecordId, Log>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unicode_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_data: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_desc: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogInput {
    #[serde(default, alias = "_id")]
    pub id: Option<RecordId>,
    #[serde(rename = "type")]
    pub kind: String,
    pub action: String,
    #[serde(default)]
    pub object_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub unicode_text: Option<String>,
    #[serde(default)]
    pub old_data: Option<JsonValue>,
    #[serde(default)]
    pub new_data: Option<JsonValue>,
    #[serde(default)]
    pub extra_desc: Option<JsonValue>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// One tenant's audit log.
#[derive(Clone)]
pub struct Logs {
    tenant: TenantId,
    store: LogStore,
}

impl core::fmt::Debug for Logs {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Logs")
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

impl Logs {
    pub fn new(tenant: TenantId, store: LogStore) -> Self {
        Self { tenant, store }
    }

    /// Record an entry; an entry whose `id` is already stored is left as is.
    pub fn put(&self, input: LogInput, now: DateTime<Utc>) -> Result<Log, ModelError> {
        if input.kind.trim().is_empty() {
            return Err(ModelError::validation("log: type is required"));
        }
        if input.action.trim().is_empty() {
            return Err(ModelError::validation("log: action is required"));
        }

        let log = Log {
            id: input.id.unwrap_or_default(),
            kind: input.kind,
            action: input.action,
            object_id: input.object_id,
            created_by: input.created_by,
            description: input.description,
            unicode_text: input.unicode_text,
            old_data: input.old_data,
            new_data: input.new_data,
            extra_desc: input.extra_desc,
            created_at: input.created_at.unwrap_or(now),
        };

        match self.store.insert_if_absent(&self.tenant, log.id, log.clone()) {
            Some(existing) => {
                debug!(tenant = %self.tenant, id = %existing.id, "log already recorded");
                Ok(existing)
            }
            None => Ok(log),
        }
    }

    pub fn get(&self, id: &RecordId) -> Option<Log> {
        self.store.get(&self.tenant, id)
    }

    pub fn count(&self) -> usize {
        self.store.list(&self.tenant).len()
    }

    /// Delete entries created on or before midnight (UTC) of the day `months`
    /// months before `now`.
    pub fn delete_older_than(&self, months: u32, now: DateTime<Utc>) -> Result<usize, ModelError> {
        let cutoff = now
            .date_naive()
            .checked_sub_months(Months::new(months))
            .and_then(|day| day.and_hms_opt(0, 0, 0))
            .map(|midnight| midnight.and_utc())
            .ok_or_else(|| ModelError::validation(format!("months out of range: {months}")))?;

        let removed = self
            .store
            .remove_where(&self.tenant, &|log: &Log| log.created_at <= cutoff);
        info!(tenant = %self.tenant, %cutoff, removed, "deleted old logs");
        Ok(removed)
    }
}
