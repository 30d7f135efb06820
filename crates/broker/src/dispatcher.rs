//! Inbound command dispatch (queue -> tenant context -> handler).
//!
//! The `CommandDispatcher` subscribes handlers with the transport and runs this
//! pipeline for every delivery:
//!
//! ```text
//! MessageEnvelope
//!   ↓
//! 1. Resolve tenant context (strict per-tenant partition)
//!   ↓
//! 2. Decode (action, data) into the queue's command type
//!   ↓         unrecognized action → acknowledge, no effect
//! 3. Run handler against that tenant's context
//!   ↓
//! 4a. fire-and-forget: Ok → ack; Err → wrapped with the queue name and returned
//!     to the transport, which redelivers
//! 4b. RPC: Ok(data) → {status: "success", data}; Err → {status: "error"}
//! ```
//!
//! ## Concurrency
//!
//! Each delivery is an independent future driven by the transport. The dispatcher
//! holds no lock on the delivery path; handlers for any tenants (or the same tenant)
//! run in parallel.

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{Instrument, debug, error, info, info_span, warn};

use switchyard_messaging::{BoxFuture, Consumer, MessageEnvelope, RpcConsumer, RpcResponse, TenantScoped};

use crate::{BrokerContext, DispatchError, Idempotence, InboundCommand, TenantResolver};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerKind {
    FireAndForget(Idempotence),
    Rpc,
}

/// A handler subscribed through this dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub queue: String,
    pub kind: HandlerKind,
}

/// Registers inbound handlers and runs them against per-tenant contexts.
pub struct CommandDispatcher<R>
where
    R: TenantResolver,
{
    broker: Arc<BrokerContext>,
    resolver: Arc<R>,
    registrations: Mutex<Vec<Registration>>,
}

impl<R> core::fmt::Debug for CommandDispatcher<R>
where
    R: TenantResolver,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CommandDispatcher")
            .field("broker", &self.broker)
            .field("registrations", &self.registrations())
            .finish_non_exhaustive()
    }
}

impl<R> CommandDispatcher<R>
where
    R: TenantResolver,
{
    pub fn new(broker: Arc<BrokerContext>, resolver: Arc<R>) -> Self {
        Self {
            broker,
            resolver,
            registrations: Mutex::new(Vec::new()),
        }
    }

    pub fn broker(&self) -> &Arc<BrokerContext> {
        &self.broker
    }

    /// Handlers registered so far, in registration order.
    pub fn registrations(&self) -> Vec<Registration> {
        self.registrations
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Subscribe a fire-and-forget handler.
    ///
    /// The handler may run more than once for the same message (redelivery), so the
    /// caller declares how its effect stays safe under repetition.
    pub async fn register_fire_and_forget<C, F, Fut>(
        &self,
        queue: &str,
        idempotence: Idempotence,
        handler: F,
    ) -> Result<(), DispatchError>
    where
        C: InboundCommand,
        F: Fn(R::Context, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let dedup_key = match idempotence {
            Idempotence::KeyedBy(field) => Some(field),
            Idempotence::Natural => None,
        };
        let route = Arc::new(Route {
            queue: queue.to_string(),
            resolver: Arc::clone(&self.resolver),
            dedup_key,
            handler,
        });

        let consumer: Consumer = Arc::new(move |envelope: MessageEnvelope| -> BoxFuture<anyhow::Result<()>> {
            let route = Arc::clone(&route);
            Box::pin(async move {
                route
                    .dispatch_fire_and_forget::<C, Fut>(envelope)
                    .await
                    .map_err(anyhow::Error::from)
            })
        });

        self.broker.transport().consume(queue, consumer).await?;
        self.record(queue, HandlerKind::FireAndForget(idempotence));
        Ok(())
    }

    /// Subscribe a request/response handler. Its `Ok` value becomes the response's
    /// `data`; any failure becomes an error response. The caller is always answered.
    pub async fn register_rpc<C, T, F, Fut>(&self, queue: &str, handler: F) -> Result<(), DispatchError>
    where
        C: InboundCommand,
        T: Serialize + 'static,
        F: Fn(R::Context, C) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        let route = Arc::new(Route {
            queue: queue.to_string(),
            resolver: Arc::clone(&self.resolver),
            dedup_key: None,
            handler,
        });

        let consumer: RpcConsumer = Arc::new(move |envelope: MessageEnvelope| -> BoxFuture<RpcResponse> {
            let route = Arc::clone(&route);
            Box::pin(async move { route.dispatch_rpc::<C, T, Fut>(envelope).await })
        });

        self.broker.transport().consume_rpc(queue, consumer).await?;
        self.record(queue, HandlerKind::Rpc);
        Ok(())
    }

    fn record(&self, queue: &str, kind: HandlerKind) {
        info!(queue, kind = ?kind, "registered inbound handler");
        if let Ok(mut regs) = self.registrations.lock() {
            regs.push(Registration {
                queue: queue.to_string(),
                kind,
            });
        }
    }
}

/// One subscribed queue: the handler plus what it needs per delivery.
struct Route<R, F> {
    queue: String,
    resolver: Arc<R>,
    /// Payload field a keyed handler deduplicates on.
    dedup_key: Option<&'static str>,
    handler: F,
}

impl<R, F> Route<R, F>
where
    R: TenantResolver,
{
    async fn resolve(&self, message: &impl TenantScoped) -> Result<R::Context, DispatchError> {
        let tenant = message.tenant_id();
        self.resolver
            .resolve(tenant)
            .await
            .map_err(|source| DispatchError::UnknownTenant {
                queue: self.queue.clone(),
                tenant: tenant.clone(),
                source,
            })
    }

    /// Resolve + decode. `Ok(None)` for an action this queue does not handle.
    async fn prepare<C>(&self, envelope: MessageEnvelope) -> Result<Option<(R::Context, C)>, DispatchError>
    where
        C: InboundCommand,
    {
        let context = self.resolve(&envelope).await?;

        let action = envelope.action().map(str::to_owned);
        let message_id = envelope.message_id();
        let mut data = envelope.into_data();
        if let Some(field) = self.dedup_key {
            fill_dedup_key(&mut data, field, &message_id.to_string());
        }

        let command = C::decode(action.as_deref(), data).map_err(|source| {
            DispatchError::Decode {
                queue: self.queue.clone(),
                source,
            }
        })?;

        match command {
            Some(command) => Ok(Some((context, command))),
            None => {
                debug!(action = ?action, "ignoring unrecognized action");
                Ok(None)
            }
        }
    }

    async fn dispatch_fire_and_forget<C, Fut>(&self, envelope: MessageEnvelope) -> Result<(), DispatchError>
    where
        C: InboundCommand,
        F: Fn(R::Context, C) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        let span = delivery_span(&self.queue, &envelope, "fire_and_forget");

        async move {
            let Some((context, command)) = self.prepare::<C>(envelope).await.inspect_err(|err| {
                warn!(error = %err, "cannot dispatch message; requesting redelivery");
            })?
            else {
                return Ok(());
            };

            (self.handler)(context, command).await.map_err(|error| {
                let err = DispatchError::Handler {
                    queue: self.queue.clone(),
                    error,
                };
                error!(error = %err, "handler failed; requesting redelivery");
                err
            })
        }
        .instrument(span)
        .await
    }

    async fn dispatch_rpc<C, T, Fut>(&self, envelope: MessageEnvelope) -> RpcResponse
    where
        C: InboundCommand,
        T: Serialize,
        F: Fn(R::Context, C) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let span = delivery_span(&self.queue, &envelope, "rpc");

        async move {
            match self.run_rpc::<C, T, Fut>(envelope).await {
                Ok(data) => RpcResponse::success(data),
                Err(err) => {
                    error!(error = %err, "rpc handler failed; answering with error");
                    RpcResponse::error(err.to_string())
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_rpc<C, T, Fut>(&self, envelope: MessageEnvelope) -> Result<JsonValue, DispatchError>
    where
        C: InboundCommand,
        T: Serialize,
        F: Fn(R::Context, C) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let Some((context, command)) = self.prepare::<C>(envelope).await? else {
            return Ok(JsonValue::Null);
        };

        let result = (self.handler)(context, command)
            .await
            .map_err(|error| DispatchError::Handler {
                queue: self.queue.clone(),
                error,
            })?;

        serde_json::to_value(result).map_err(|e| DispatchError::Encode {
            queue: self.queue.clone(),
            reason: e.to_string(),
        })
    }
}

/// Give an object payload without a usable `field` the delivery's message id, which
/// is stable across redeliveries of the same message.
fn fill_dedup_key(data: &mut JsonValue, field: &str, message_id: &str) {
    let JsonValue::Object(map) = data else {
        return;
    };
    if map.get(field).is_none_or(JsonValue::is_null) {
        map.insert(field.to_string(), JsonValue::String(message_id.to_string()));
    }
}

fn delivery_span(queue: &str, envelope: &MessageEnvelope, kind: &'static str) -> tracing::Span {
    info_span!(
        "dispatch",
        queue,
        kind,
        tenant = %envelope.tenant(),
        message_id = %envelope.message_id(),
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;
    use switchyard_core::TenantId;
    use switchyard_messaging::{InMemoryTransport, RpcStatus, Transport};

    use super::*;
    use crate::{BrokerConfig, DecodeError, Json, ResolveError, decode_payload};

    /// Per-tenant counters; resolving hands out the tenant's own cell.
    #[derive(Default)]
    struct Counters {
        known: Vec<&'static str>,
        cells: Mutex<HashMap<TenantId, Arc<AtomicU32>>>,
    }

    #[async_trait]
    impl TenantResolver for Counters {
        type Context = Arc<AtomicU32>;

        async fn resolve(&self, tenant: &TenantId) -> Result<Self::Context, ResolveError> {
            if !self.known.contains(&tenant.as_str()) {
                return Err(ResolveError::UnknownTenant(tenant.clone()));
            }
            let mut cells = self.cells.lock().map_err(|e| ResolveError::Backend(e.to_string()))?;
            Ok(Arc::clone(cells.entry(tenant.clone()).or_default()))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Add {
        by: u32,
    }

    /// `add` is the default; `reset` is explicit.
    enum CounterCommand {
        Add(Add),
        Reset,
    }

    impl InboundCommand for CounterCommand {
        fn decode(action: Option<&str>, data: JsonValue) -> Result<Option<Self>, DecodeError> {
            match action {
                None | Some("add") => Ok(Some(Self::Add(decode_payload("add", data)?))),
                Some("reset") => Ok(Some(Self::Reset)),
                Some(_) => Ok(None),
            }
        }
    }

    fn tenant(raw: &str) -> TenantId {
        TenantId::new(raw).unwrap()
    }

    fn setup() -> (InMemoryTransport, Arc<Counters>, CommandDispatcher<Counters>) {
        let transport = InMemoryTransport::with_max_deliveries(2);
        let broker = BrokerContext::connect(transport.clone(), BrokerConfig::default());
        let resolver = Arc::new(Counters {
            known: vec!["acme", "globex"],
            ..Default::default()
        });
        let dispatcher = CommandDispatcher::new(broker, resolver.clone());
        (transport, resolver, dispatcher)
    }

    async fn register_counter(dispatcher: &CommandDispatcher<Counters>) {
        dispatcher
            .register_fire_and_forget(
                "counter",
                Idempotence::Natural,
                |cell: Arc<AtomicU32>, cmd: CounterCommand| async move {
                    match cmd {
                        CounterCommand::Add(add) => {
                            cell.fetch_add(add.by, Ordering::SeqCst);
                        }
                        CounterCommand::Reset => cell.store(0, Ordering::SeqCst),
                    }
                    Ok::<(), anyhow::Error>(())
                },
            )
            .await
            .unwrap();
    }

    async fn value(resolver: &Counters, raw: &str) -> u32 {
        resolver.resolve(&tenant(raw)).await.unwrap().load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn routes_each_message_to_its_tenant_context() {
        let (transport, resolver, dispatcher) = setup();
        register_counter(&dispatcher).await;

        for raw in ["acme", "globex"] {
            transport
                .publish("counter", MessageEnvelope::new(tenant(raw), json!({ "by": 5 })))
                .await
                .unwrap();
        }
        transport.flush().await;

        assert_eq!(value(&resolver, "acme").await, 5);
        assert_eq!(value(&resolver, "globex").await, 5);

        transport
            .publish(
                "counter",
                MessageEnvelope::new(tenant("acme"), json!({ "by": 5 })).with_action("reset"),
            )
            .await
            .unwrap();
        transport.flush().await;

        assert_eq!(value(&resolver, "acme").await, 0);
        assert_eq!(value(&resolver, "globex").await, 5);
    }

    /// Handler on a keyed queue that records the `id` it saw and fails `fail_first` times.
    async fn register_id_recorder(
        dispatcher: &CommandDispatcher<Counters>,
        queue: &str,
        idempotence: Idempotence,
        fail_first: u32,
    ) -> Arc<Mutex<Vec<JsonValue>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let calls = Arc::new(AtomicU32::new(0));
        dispatcher
            .register_fire_and_forget(queue, idempotence, move |_cell, Json(data): Json<JsonValue>| {
                let log = log.clone();
                let calls = calls.clone();
                async move {
                    log.lock().unwrap().push(data["id"].clone());
                    if calls.fetch_add(1, Ordering::SeqCst) < fail_first {
                        return Err(anyhow::anyhow!("transient"));
                    }
                    Ok::<(), anyhow::Error>(())
                }
            })
            .await
            .unwrap();
        seen
    }

    #[tokio::test]
    async fn keyed_queue_without_id_is_keyed_by_message_id_across_redelivery() {
        let (transport, _resolver, dispatcher) = setup();
        let seen = register_id_recorder(&dispatcher, "putLog", Idempotence::KeyedBy("id"), 1).await;

        let envelope = MessageEnvelope::new(tenant("acme"), json!({ "type": "deal" }));
        let expected = json!(envelope.message_id().to_string());
        transport.publish("putLog", envelope).await.unwrap();
        transport.flush().await;

        assert_eq!(*seen.lock().unwrap(), vec![expected.clone(), expected]);
        assert!(transport.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn keyed_queue_keeps_caller_id_and_natural_queue_is_untouched() {
        let (transport, _resolver, dispatcher) = setup();
        let keyed = register_id_recorder(&dispatcher, "keyed", Idempotence::KeyedBy("id"), 0).await;
        let natural = register_id_recorder(&dispatcher, "natural", Idempotence::Natural, 0).await;

        transport
            .publish("keyed", MessageEnvelope::new(tenant("acme"), json!({ "id": "caller-1" })))
            .await
            .unwrap();
        transport
            .publish("natural", MessageEnvelope::new(tenant("acme"), json!({})))
            .await
            .unwrap();
        transport.flush().await;

        assert_eq!(*keyed.lock().unwrap(), vec![json!("caller-1")]);
        assert_eq!(*natural.lock().unwrap(), vec![JsonValue::Null]);
    }

    #[tokio::test]
    async fn unrecognized_action_is_acknowledged_without_effect() {
        let (transport, resolver, dispatcher) = setup();
        register_counter(&dispatcher).await;

        transport
            .publish(
                "counter",
                MessageEnvelope::new(tenant("acme"), json!({ "by": 5 })).with_action("explode"),
            )
            .await
            .unwrap();
        transport.flush().await;

        assert_eq!(value(&resolver, "acme").await, 0);
        assert!(transport.dead_letters().is_empty());
    }

    #[tokio::test]
    async fn handler_failure_is_reraised_with_queue_name() {
        let (transport, _resolver, dispatcher) = setup();
        let attempts = Arc::new(AtomicU32::new(0));
        let seen = attempts.clone();

        dispatcher
            .register_fire_and_forget("putLog", Idempotence::KeyedBy("id"), move |_cell, _cmd: Json<JsonValue>| {
                let seen = seen.clone();
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow::anyhow!("store unavailable"))
                }
            })
            .await
            .unwrap();

        transport
            .publish("putLog", MessageEnvelope::new(tenant("acme"), json!({})))
            .await
            .unwrap();
        transport.flush().await;

        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        let dead = transport.dead_letters();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].last_error.contains("`putLog`"));
        assert!(dead[0].last_error.contains("store unavailable"));
    }

    #[tokio::test]
    async fn unknown_tenant_is_a_transient_failure() {
        let (transport, _resolver, dispatcher) = setup();
        register_counter(&dispatcher).await;

        transport
            .publish("counter", MessageEnvelope::new(tenant("initech"), json!({ "by": 1 })))
            .await
            .unwrap();
        transport.flush().await;

        let dead = transport.dead_letters();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].last_error.contains("unknown tenant `initech`"));
    }

    #[tokio::test]
    async fn rpc_wraps_success_and_failure() {
        let (transport, _resolver, dispatcher) = setup();

        dispatcher
            .register_rpc("double", |_cell, Json(n): Json<i64>| async move {
                if n < 0 {
                    anyhow::bail!("negative input");
                }
                Ok::<i64, anyhow::Error>(n * 2)
            })
            .await
            .unwrap();

        let ok = transport
            .request("double", MessageEnvelope::new(tenant("acme"), json!(21)))
            .await
            .unwrap();
        assert_eq!(ok.status(), RpcStatus::Success);
        assert_eq!(ok.data(), &json!(42));

        let failed = transport
            .request("double", MessageEnvelope::new(tenant("acme"), json!(-1)))
            .await
            .unwrap();
        assert_eq!(failed.status(), RpcStatus::Error);
        assert!(failed.error_message().unwrap().contains("negative input"));

        let malformed = transport
            .request("double", MessageEnvelope::new(tenant("acme"), json!("x")))
            .await
            .unwrap();
        assert_eq!(malformed.status(), RpcStatus::Error);

        let unknown = transport
            .request("double", MessageEnvelope::new(tenant("initech"), json!(1)))
            .await
            .unwrap();
        assert_eq!(unknown.status(), RpcStatus::Error);
    }

    #[tokio::test]
    async fn records_registrations_and_rejects_duplicates() {
        let (_transport, _resolver, dispatcher) = setup();
        register_counter(&dispatcher).await;

        let again = dispatcher
            .register_fire_and_forget("counter", Idempotence::Natural, |_c, _cmd: Json<JsonValue>| async {
                Ok::<(), anyhow::Error>(())
            })
            .await;
        assert!(matches!(again, Err(DispatchError::Registration(_))));

        assert_eq!(
            dispatcher.registrations(),
            vec![Registration {
                queue: "counter".to_string(),
                kind: HandlerKind::FireAndForget(Idempotence::Natural),
            }]
        );
    }
}
