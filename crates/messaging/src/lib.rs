//! Queue transport abstraction (mechanics only).
//!
//! Envelopes, the transport contract consumed by the broker, and an in-memory
//! transport for tests/dev. Wire encoding and delivery guarantees of a real broker
//! connection are the transport's concern, not this crate's.

pub mod envelope;
pub mod in_memory_transport;
pub mod tenant;
pub mod transport;

pub use envelope::{MessageEnvelope, RpcResponse, RpcStatus};
pub use in_memory_transport::{DeadLetter, InMemoryTransport};
pub use tenant::TenantScoped;
pub use transport::{BoxFuture, Consumer, RpcConsumer, Transport, TransportError};
