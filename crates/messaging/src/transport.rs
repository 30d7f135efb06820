//! Queue transport contract (mechanics only).
//!
//! The broker consumes exactly four operations from a transport:
//!
//! ```text
//! consume(queue, consumer)        fire-and-forget subscription
//! consume_rpc(queue, consumer)    request/response subscription
//! publish(queue, envelope)        fire-and-forget send
//! request(queue, envelope)        request/response send
//! ```
//!
//! ## Delivery Guarantees
//!
//! Transports are assumed to provide **at-least-once delivery**:
//! - A fire-and-forget consumer returning `Err` signals the transport to redeliver
//!   (according to the transport's own retry policy)
//! - Messages may arrive out of order and in parallel
//! - Consumers must therefore be idempotent
//!
//! An RPC consumer always produces an [`RpcResponse`]; it has no error channel, so the
//! waiting caller is always answered.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::{MessageEnvelope, RpcResponse};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;

/// Fire-and-forget consumer. `Err` requests redelivery.
pub type Consumer = Arc<dyn Fn(MessageEnvelope) -> BoxFuture<anyhow::Result<()>> + Send + Sync>;

/// Request/response consumer.
pub type RpcConsumer = Arc<dyn Fn(MessageEnvelope) -> BoxFuture<RpcResponse> + Send + Sync>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no consumer registered for queue `{0}`")]
    NoConsumer(String),

    #[error("queue `{0}` already has a consumer")]
    AlreadyConsumed(String),

    #[error("consumer for queue `{queue}` failed: {reason}")]
    ConsumerFailed { queue: String, reason: String },

    #[error("transport connection error: {0}")]
    Connection(String),

    /// Internal lock poisoning.
    #[error("transport state poisoned")]
    Poisoned,
}

/// Queue transport (connection to the message broker).
///
/// The trait requires `Send + Sync`: one connection is shared by every concurrent
/// dispatch and outbound call in the process.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn consume(&self, queue: &str, consumer: Consumer) -> Result<(), TransportError>;

    async fn consume_rpc(&self, queue: &str, consumer: RpcConsumer) -> Result<(), TransportError>;

    async fn publish(&self, queue: &str, envelope: MessageEnvelope) -> Result<(), TransportError>;

    async fn request(
        &self,
        queue: &str,
        envelope: MessageEnvelope,
    ) -> Result<RpcResponse, TransportError>;
}

#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn consume(&self, queue: &str, consumer: Consumer) -> Result<(), TransportError> {
        (**self).consume(queue, consumer).await
    }

    async fn consume_rpc(&self, queue: &str, consumer: RpcConsumer) -> Result<(), TransportError> {
        (**self).consume_rpc(queue, consumer).await
    }

    async fn publish(&self, queue: &str, envelope: MessageEnvelope) -> Result<(), TransportError> {
        (**self).publish(queue, envelope).await
    }

    async fn request(
        &self,
        queue: &str,
        envelope: MessageEnvelope,
    ) -> Result<RpcResponse, TransportError> {
        (**self).request(queue, envelope).await
    }
}
