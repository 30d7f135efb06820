//! Logs service: activity logs, audit logs and visitor records, served over the
//! tenant-aware broker.

pub mod commands;
pub mod handlers;
pub mod models;
pub mod remote;
pub mod service;
pub mod store;

pub use commands::{ActivityLogCommand, queues};
pub use models::{LogsModels, LogsModelsResolver, ModelError};
pub use remote::{LogCapability, RemoteContent};
pub use service::LogsService;
pub use store::{InMemoryTenantStore, KeyUpdate, TenantStore};
