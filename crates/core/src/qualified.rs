//! Content-type-qualified identifiers (`"<service>:<type>"`).

use core::str::FromStr;

use crate::error::DomainError;

/// Separator between the owning service and the type remainder.
pub const QUALIFIER_SEPARATOR: char = ':';

/// A content type qualified by the service that owns it, e.g. `"billing:invoice"`.
///
/// Split on the *first* separator: `"cards:board:item"` belongs to service `cards`
/// with remainder `"board:item"`. The remainder may be empty; the service may not.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedContentType {
    service: String,
    type_name: String,
}

impl QualifiedContentType {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let (service, type_name) = raw
            .split_once(QUALIFIER_SEPARATOR)
            .ok_or_else(|| DomainError::malformed_identifier(raw))?;

        if service.trim().is_empty() {
            return Err(DomainError::malformed_identifier(raw));
        }

        Ok(Self {
            service: service.to_string(),
            type_name: type_name.to_string(),
        })
    }

    /// Logical name of the owning service.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Everything after the first separator.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

impl core::fmt::Display for QualifiedContentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}{}{}", self.service, QUALIFIER_SEPARATOR, self.type_name)
    }
}

impl FromStr for QualifiedContentType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn splits_on_first_separator() {
        let q = QualifiedContentType::parse("cards:board:item").unwrap();
        assert_eq!(q.service(), "cards");
        assert_eq!(q.type_name(), "board:item");
    }

    #[test]
    fn rejects_missing_separator_and_empty_service() {
        assert_eq!(
            QualifiedContentType::parse("billing"),
            Err(DomainError::MalformedIdentifier("billing".to_string()))
        );
        assert!(QualifiedContentType::parse(":invoice").is_err());
    }

    #[test]
    fn allows_empty_remainder() {
        let q = QualifiedContentType::parse("billing:").unwrap();
        assert_eq!(q.service(), "billing");
        assert_eq!(q.type_name(), "");
    }

    proptest! {
        #[test]
        fn display_reproduces_input(service in "[a-z]{1,12}", rest in "[a-z:]{0,16}") {
            let raw = format!("{service}:{rest}");
            let q = QualifiedContentType::parse(&raw).unwrap();
            prop_assert_eq!(q.service(), service.as_str());
            prop_assert_eq!(q.type_name(), rest.as_str());
            prop_assert_eq!(q.to_string(), raw);
        }

        #[test]
        fn no_separator_is_always_malformed(raw in "[a-z0-9._-]{0,24}") {
            prop_assert!(QualifiedContentType::parse(&raw).is_err());
        }
    }
}
