//! Per-tenant data access for the logs service.
//!
//! `LogsModelsResolver` is the broker's tenant resolver: it hands each tenant a
//! `LogsModels` whose repositories are bound to that tenant's partition of the
//! shared stores.

mod activity_log;
mod log;
mod visitor;

pub use activity_log::{
    ActivityLog, ActivityLogInput, ActivityLogModifier, ActivityLogPatch, ActivityLogQuery,
    ActivityLogStore, ActivityLogs, FindOptions, SortOrder,
};
pub use log::{Log, LogInput, LogStore, Logs};
pub use visitor::{VisitorInput, VisitorLog, VisitorStore, Visitors};

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use switchyard_broker::{ResolveError, TenantResolver};
use switchyard_core::{RecordId, TenantId};

use crate::store::InMemoryTenantStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("store unavailable")]
    StoreUnavailable,
}

impl ModelError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Data-access context of one tenant.
#[derive(Debug, Clone)]
pub struct LogsModels {
    tenant: TenantId,
    activity_logs: ActivityLogs,
    logs: Logs,
    visitors: Visitors,
}

impl LogsModels {
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn activity_logs(&self) -> &ActivityLogs {
        &self.activity_logs
    }

    pub fn logs(&self) -> &Logs {
        &self.logs
    }

    pub fn visitors(&self) -> &Visitors {
        &self.visitors
    }
}

/// Hands out one cached [`LogsModels`] per tenant.
pub struct LogsModelsResolver {
    activity_logs: ActivityLogStore,
    logs: LogStore,
    visitors: VisitorStore,
    allowed: Option<HashSet<TenantId>>,
    cache: RwLock<HashMap<TenantId, Arc<LogsModels>>>,
}

impl core::fmt::Debug for LogsModelsResolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LogsModelsResolver")
            .field("allowed", &self.allowed)
            .finish_non_exhaustive()
    }
}

impl LogsModelsResolver {
    pub fn new(activity_logs: ActivityLogStore, logs: LogStore, visitors: VisitorStore) -> Self {
        Self {
            activity_logs,
            logs,
            visitors,
            allowed: None,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryTenantStore::<RecordId, ActivityLog>::new()),
            Arc::new(InMemoryTenantStore::<RecordId, Log>::new()),
            Arc::new(InMemoryTenantStore::<String, VisitorLog>::new()),
        )
    }

    /// Only resolve the listed tenants; any other tenant is `UnknownTenant`.
    pub fn with_allowed_tenants(mut self, tenants: impl IntoIterator<Item = TenantId>) -> Self {
        self.allowed = Some(tenants.into_iter().collect());
        self
    }

    fn build(&self, tenant: &TenantId) -> LogsModels {
        LogsModels {
            tenant: tenant.clone(),
            activity_logs: ActivityLogs::new(tenant.clone(), Arc::clone(&self.activity_logs)),
            logs: Logs::new(tenant.clone(), Arc::clone(&self.logs)),
            visitors: Visitors::new(tenant.clone(), Arc::clone(&self.visitors)),
        }
    }
}

#[async_trait]
impl TenantResolver for LogsModelsResolver {
    type Context = Arc<LogsModels>;

    async fn resolve(&self, tenant: &TenantId) -> Result<Self::Context, ResolveError> {
        if self.allowed.as_ref().is_some_and(|allowed| !allowed.contains(tenant)) {
            return Err(ResolveError::UnknownTenant(tenant.clone()));
        }

        {
            let cache = self
                .cache
                .read()
                .map_err(|_| ResolveError::Backend("tenant cache poisoned".to_string()))?;
            if let Some(models) = cache.get(tenant) {
                return Ok(Arc::clone(models));
            }
        }

        let mut cache = self
            .cache
            .write()
            .map_err(|_| ResolveError::Backend("tenant cache poisoned".to_string()))?;
        let models = cache
            .entry(tenant.clone())
            .or_insert_with(|| {
                debug!(tenant = %tenant, "building tenant models");
                Arc::new(self.build(tenant))
            });
        Ok(Arc::clone(models))
    }
}
