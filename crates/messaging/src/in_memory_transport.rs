//! In-memory queue transport for tests/dev.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::transport::{Consumer, RpcConsumer, Transport, TransportError};
use crate::{MessageEnvelope, RpcResponse};

/// Default number of delivery attempts before a message is dead-lettered.
const DEFAULT_MAX_DELIVERIES: u32 = 3;

/// A fire-and-forget message that failed every delivery attempt.
#[derive(Debug, Clone)]
pub struct DeadLetter {
    pub queue: String,
    pub envelope: MessageEnvelope,
    pub attempts: u32,
    pub last_error: String,
}

/// In-memory queue transport.
///
/// - One consumer per queue; each delivery runs on its own tokio task
/// - Messages published before a consumer exists are buffered until it subscribes
/// - A failed fire-and-forget delivery is redelivered immediately, up to
///   `max_deliveries` attempts, then dead-lettered
/// - Records every request/publish, so tests can use it as a spy
///
/// Cloning yields another handle to the same queues.
#[derive(Clone)]
pub struct InMemoryTransport {
    inner: Arc<Inner>,
}

struct Inner {
    consumers: Mutex<HashMap<String, Consumer>>,
    rpc_consumers: Mutex<HashMap<String, RpcConsumer>>,
    pending: Mutex<HashMap<String, VecDeque<MessageEnvelope>>>,
    requests: Mutex<Vec<String>>,
    dead_letters: Mutex<Vec<DeadLetter>>,
    published: AtomicU64,
    in_flight: AtomicUsize,
    idle: Notify,
    max_deliveries: u32,
}

impl core::fmt::Debug for InMemoryTransport {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InMemoryTransport")
            .field("published", &self.published())
            .field("in_flight", &self.inner.in_flight.load(Ordering::SeqCst))
            .field("max_deliveries", &self.inner.max_deliveries)
            .finish_non_exhaustive()
    }
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::with_max_deliveries(DEFAULT_MAX_DELIVERIES)
    }

    pub fn with_max_deliveries(max_deliveries: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                consumers: Mutex::new(HashMap::new()),
                rpc_consumers: Mutex::new(HashMap::new()),
                pending: Mutex::new(HashMap::new()),
                requests: Mutex::new(Vec::new()),
                dead_letters: Mutex::new(Vec::new()),
                published: AtomicU64::new(0),
                in_flight: AtomicUsize::new(0),
                idle: Notify::new(),
                max_deliveries: max_deliveries.max(1),
            }),
        }
    }

    /// Number of `publish` calls accepted so far.
    pub fn published(&self) -> u64 {
        self.inner.published.load(Ordering::SeqCst)
    }

    /// Number of `request` calls issued so far (answered or not).
    pub fn requests_sent(&self) -> usize {
        self.requested_queues().len()
    }

    /// Queue names of every `request` call, in call order.
    pub fn requested_queues(&self) -> Vec<String> {
        self.inner
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.inner
            .dead_letters
            .lock()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Messages buffered for a queue that has no consumer yet.
    pub fn pending(&self, queue: &str) -> usize {
        self.inner
            .pending
            .lock()
            .map(|p| p.get(queue).map(VecDeque::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Wait until every spawned delivery (including redeliveries and deliveries
    /// triggered from within handlers) has finished.
    pub async fn flush(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.in_flight.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    fn spawn_delivery(&self, queue: String, consumer: Consumer, envelope: MessageEnvelope) {
        let guard = InFlightGuard::enter(Arc::clone(&self.inner));
        tokio::spawn(async move {
            let inner = Arc::clone(&guard.inner);
            deliver_with_redelivery(&inner, &queue, consumer, envelope).await;
            drop(guard);
        });
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

/// Decrements the in-flight counter even if the consumer panics.
struct InFlightGuard {
    inner: Arc<Inner>,
}

impl InFlightGuard {
    fn enter(inner: Arc<Inner>) -> Self {
        inner.in_flight.fetch_add(1, Ordering::SeqCst);
        Self { inner }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if self.inner.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

async fn deliver_with_redelivery(
    inner: &Inner,
    queue: &str,
    consumer: Consumer,
    envelope: MessageEnvelope,
) {
    let mut last_error = String::new();

    for attempt in 1..=inner.max_deliveries {
        match consumer(envelope.clone()).await {
            Ok(()) => return,
            Err(err) => {
                warn!(
                    queue,
                    attempt,
                    message_id = %envelope.message_id(),
                    error = %format!("{err:#}"),
                    "delivery failed; redelivering"
                );
                last_error = format!("{err:#}");
            }
        }
    }

    warn!(queue, message_id = %envelope.message_id(), "delivery attempts exhausted; dead-lettering");
    if let Ok(mut dead) = inner.dead_letters.lock() {
        dead.push(DeadLetter {
            queue: queue.to_string(),
            envelope,
            attempts: inner.max_deliveries,
            last_error,
        });
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn consume(&self, queue: &str, consumer: Consumer) -> Result<(), TransportError> {
        // Lock order is consumers then pending, here and in `publish`.
        let backlog = {
            let mut consumers = self
                .inner
                .consumers
                .lock()
                .map_err(|_| TransportError::Poisoned)?;
            if consumers.contains_key(queue) {
                return Err(TransportError::AlreadyConsumed(queue.to_string()));
            }
            let mut pending = self
                .inner
                .pending
                .lock()
                .map_err(|_| TransportError::Poisoned)?;
            consumers.insert(queue.to_string(), Arc::clone(&consumer));
            pending.remove(queue).unwrap_or_default()
        };

        if !backlog.is_empty() {
            debug!(queue, buffered = backlog.len(), "flushing buffered messages to new consumer");
        }
        for envelope in backlog {
            self.spawn_delivery(queue.to_string(), Arc::clone(&consumer), envelope);
        }

        Ok(())
    }

    async fn consume_rpc(&self, queue: &str, consumer: RpcConsumer) -> Result<(), TransportError> {
        let mut consumers = self
            .inner
            .rpc_consumers
            .lock()
            .map_err(|_| TransportError::Poisoned)?;
        if consumers.contains_key(queue) {
            return Err(TransportError::AlreadyConsumed(queue.to_string()));
        }
        consumers.insert(queue.to_string(), consumer);
        Ok(())
    }

    async fn publish(&self, queue: &str, envelope: MessageEnvelope) -> Result<(), TransportError> {
        self.inner.published.fetch_add(1, Ordering::SeqCst);

        let consumer = {
            let consumers = self
                .inner
                .consumers
                .lock()
                .map_err(|_| TransportError::Poisoned)?;
            match consumers.get(queue) {
                Some(consumer) => Arc::clone(consumer),
                None => {
                    self.inner
                        .pending
                        .lock()
                        .map_err(|_| TransportError::Poisoned)?
                        .entry(queue.to_string())
                        .or_default()
                        .push_back(envelope);
                    return Ok(());
                }
            }
        };

        self.spawn_delivery(queue.to_string(), consumer, envelope);
        Ok(())
    }

    async fn request(
        &self,
        queue: &str,
        envelope: MessageEnvelope,
    ) -> Result<RpcResponse, TransportError> {
        self.inner
            .requests
            .lock()
            .map_err(|_| TransportError::Poisoned)?
            .push(queue.to_string());

        let consumer = self
            .inner
            .rpc_consumers
            .lock()
            .map_err(|_| TransportError::Poisoned)?
            .get(queue)
            .cloned()
            .ok_or_else(|| TransportError::NoConsumer(queue.to_string()))?;

        // Own task: the caller may abandon the wait; the handler still completes and
        // its response is dropped.
        tokio::spawn(consumer(envelope))
            .await
            .map_err(|e| TransportError::ConsumerFailed {
                queue: queue.to_string(),
                reason: e.to_string(),
            })
    }
}
