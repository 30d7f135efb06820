use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use switchyard_core::TenantId;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("unknown tenant `{0}`")]
    UnknownTenant(TenantId),

    #[error("tenant context backend error: {0}")]
    Backend(String),
}

/// Maps a tenant identifier to that tenant's isolated data-access context.
///
/// Must be a strict partition: two different tenants never share mutable state
/// through their contexts. Implementations may cache contexts per tenant.
#[async_trait]
pub trait TenantResolver: Send + Sync + 'static {
    type Context: Send + Sync + 'static;

    async fn resolve(&self, tenant: &TenantId) -> Result<Self::Context, ResolveError>;
}

#[async_trait]
impl<R> TenantResolver for Arc<R>
where
    R: TenantResolver,
{
    type Context = R::Context;

    async fn resolve(&self, tenant: &TenantId) -> Result<Self::Context, ResolveError> {
        (**self).resolve(tenant).await
    }
}
