use thiserror::Error;

/// Identifier-level failure: something arrived that cannot name a tenant, a
/// record or a content type.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A content-type-qualified identifier had no `<service>:` prefix.
    #[error("malformed qualified identifier `{0}`: expected `<service>:<type>`")]
    MalformedIdentifier(String),
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn malformed_identifier(raw: impl Into<String>) -> Self {
        Self::MalformedIdentifier(raw.into())
    }
}
