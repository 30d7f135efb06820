//! `switchyard-broker` - queue-mediated RPC between tenant-aware services.
//!
//! - [`BrokerContext`]: the one transport handle, built at startup and injected
//! - [`CommandDispatcher`]: inbound fire-and-forget / RPC handler registration
//! - [`OutboundGateway`]: capability-gated outbound RPC with default fallback

pub mod command;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod resolver;

pub use command::{DecodeError, Idempotence, InboundCommand, Json, decode_payload};
pub use config::BrokerConfig;
pub use context::BrokerContext;
pub use dispatcher::{CommandDispatcher, HandlerKind, Registration};
pub use error::{DispatchError, GatewayError};
pub use gateway::{CapabilityRequest, OutboundGateway};
pub use resolver::{ResolveError, TenantResolver};
