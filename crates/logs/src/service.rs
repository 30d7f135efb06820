use std::sync::Arc;

use switchyard_broker::{BrokerContext, CommandDispatcher, DispatchError, OutboundGateway, TenantResolver};
use switchyard_discovery::ServiceRegistry;

use crate::handlers;
use crate::models::LogsModels;
use crate::remote::RemoteContent;

/// The logs service wired onto one broker context: inbound queues subscribed,
/// outbound capability calls ready.
#[derive(Debug)]
pub struct LogsService<R, G>
where
    R: TenantResolver,
{
    dispatcher: CommandDispatcher<R>,
    remote: RemoteContent<G>,
}

impl<R, G> LogsService<R, G>
where
    R: TenantResolver<Context = Arc<LogsModels>>,
    G: ServiceRegistry,
{
    pub async fn start(
        broker: Arc<BrokerContext>,
        resolver: Arc<R>,
        registry: G,
    ) -> Result<Self, DispatchError> {
        let dispatcher = CommandDispatcher::new(Arc::clone(&broker), resolver);
        handlers::register(&dispatcher).await?;

        let remote = RemoteContent::new(OutboundGateway::new(broker, registry));
        Ok(Self { dispatcher, remote })
    }

    pub fn dispatcher(&self) -> &CommandDispatcher<R> {
        &self.dispatcher
    }

    pub fn remote(&self) -> &RemoteContent<G> {
        &self.remote
    }
}
