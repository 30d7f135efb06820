use std::sync::Arc;

use anyhow::Context;

use switchyard_broker::{BrokerConfig, BrokerContext};
use switchyard_discovery::InMemoryServiceRegistry;
use switchyard_logs::{LogsModelsResolver, LogsService};
use switchyard_messaging::InMemoryTransport;

const REGISTRY_FILE_VAR: &str = "SWITCHYARD_REGISTRY_FILE";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    switchyard_observability::init();

    let config = BrokerConfig::from_env();
    let registry = load_registry()?;

    let broker = BrokerContext::connect(InMemoryTransport::new(), config);
    let resolver = Arc::new(LogsModelsResolver::in_memory());
    let service = LogsService::start(broker, resolver, Arc::new(registry)).await?;

    tracing::info!(
        queues = service.dispatcher().registrations().len(),
        "logs service running; ctrl-c to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    tracing::info!("shutting down");
    Ok(())
}

fn load_registry() -> anyhow::Result<InMemoryServiceRegistry> {
    let Ok(path) = std::env::var(REGISTRY_FILE_VAR) else {
        tracing::warn!("{REGISTRY_FILE_VAR} not set; every remote service is treated as disabled");
        return Ok(InMemoryServiceRegistry::new());
    };

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read service registry `{path}`"))?;
    let registry = InMemoryServiceRegistry::from_json(&raw)?;
    tracing::info!(path = %path, "loaded service registry");
    Ok(registry)
}
