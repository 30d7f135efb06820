//! `switchyard-core` - identifiers and error primitives shared by every crate.
//!
//! This crate has no IO and no async; it only defines the vocabulary the broker,
//! the discovery layer and the services speak.

pub mod error;
pub mod id;
pub mod qualified;

pub use error::DomainError;
pub use id::{MessageId, RecordId, TenantId};
pub use qualified::{QUALIFIER_SEPARATOR, QualifiedContentType};
