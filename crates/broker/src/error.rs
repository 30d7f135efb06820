//! Broker error model.
//!
//! Two boundaries, two enums:
//! - [`DispatchError`]: inbound message could not be fully handled. For fire-and-forget
//!   queues it is returned to the transport (which redelivers); for RPC queues it is
//!   converted into an error response.
//! - [`GatewayError`]: an outbound capability call failed for a reason the caller has
//!   to see. A disabled service or undeclared capability is *not* an error; the
//!   gateway answers with the caller's default instead.

use std::time::Duration;

use thiserror::Error;

use switchyard_core::TenantId;
use switchyard_messaging::TransportError;

use crate::{DecodeError, ResolveError};

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Tenant context could not be resolved for the message's tenant.
    #[error("queue `{queue}`: cannot resolve tenant `{tenant}`: {source}")]
    UnknownTenant {
        queue: String,
        tenant: TenantId,
        #[source]
        source: ResolveError,
    },

    /// Payload did not have the shape the selected command requires.
    #[error("queue `{queue}`: {source}")]
    Decode {
        queue: String,
        #[source]
        source: DecodeError,
    },

    /// The registered handler returned an error.
    #[error("error occurred when receiving `{queue}` message: {error:#}")]
    Handler { queue: String, error: anyhow::Error },

    /// RPC handler result could not be serialized into the response.
    #[error("queue `{queue}`: cannot encode handler result: {reason}")]
    Encode { queue: String, reason: String },

    /// Subscribing the handler with the transport failed.
    #[error("cannot register handler: {0}")]
    Registration(#[from] TransportError),
}

impl DispatchError {
    pub fn queue(&self) -> Option<&str> {
        match self {
            Self::UnknownTenant { queue, .. }
            | Self::Decode { queue, .. }
            | Self::Handler { queue, .. }
            | Self::Encode { queue, .. } => Some(queue),
            Self::Registration(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Qualified id had no `<service>:` prefix; nothing was sent.
    #[error("malformed content type `{0}`: expected `<service>:<type>`")]
    MalformedIdentifier(String),

    /// Payload was neither an object nor null, so `type` cannot be attached.
    #[error("capability payload must be a JSON object, got {0}")]
    InvalidPayload(&'static str),

    #[error("request to `{queue}` timed out after {timeout:?}")]
    Timeout { queue: String, timeout: Duration },

    #[error("request to `{queue}` failed: {source}")]
    Transport {
        queue: String,
        #[source]
        source: TransportError,
    },

    /// Remote handler answered with `status: "error"`.
    #[error("`{queue}` responded with error: {message}")]
    Remote { queue: String, message: String },
}
