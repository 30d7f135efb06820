//! Anonymous visitor records kept until the visitor converts to a customer.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use switchyard_core::TenantId;

use crate::models::ModelError;
use crate::store::TenantStore;

pub type VisitorStore = Arc<dyn TenantStore<String, VisitorLog>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorLog {
    pub visitor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<JsonValue>,
    /// Any other fields the widget reports (integrationId, cookie, ...).
    #[serde(flatten)]
    pub attributes: Map<String, JsonValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorInput {
    pub visitor_id: String,
    #[serde(default)]
    pub location: Option<JsonValue>,
    #[serde(flatten)]
    pub attributes: Map<String, JsonValue>,
}

/// One tenant's visitors, keyed by `visitorId`.
#[derive(Clone)]
pub struct Visitors {
    tenant: TenantId,
    store: VisitorStore,
}

impl core::fmt::Debug for Visitors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Visitors")
            .field("tenant", &self.tenant)
            .finish_non_exhaustive()
    }
}

impl Visitors {
    pub fn new(tenant: TenantId, store: VisitorStore) -> Self {
        Self { tenant, store }
    }

    /// Upsert by `visitorId`. Reported fields overwrite stored ones; `createdAt`
    /// is kept from the first write.
    pub fn create_or_update(&self, input: VisitorInput, now: DateTime<Utc>) -> Result<VisitorLog, ModelError> {
        if input.visitor_id.trim().is_empty() {
            return Err(ModelError::validation("visitor: visitorId is required"));
        }

        let mut attributes = input.attributes;
        for reserved in ["createdAt", "updatedAt"] {
            attributes.remove(reserved);
        }

        let key = input.visitor_id.clone();
        let location = input.location;
        let visitor_id = input.visitor_id;
        self.store
            .update_with(
                &self.tenant,
                key,
                Box::new(move |current| {
                    Some(match current {
                        Some(mut existing) => {
                            if location.is_some() {
                                existing.location = location;
                            }
                            existing.attributes.extend(attributes);
                            existing.updated_at = now;
                            existing
                        }
                        None => VisitorLog {
                            visitor_id,
                            location,
                            attributes,
                            created_at: now,
                            updated_at: now,
                        },
                    })
                }),
            )
            .ok_or(ModelError::StoreUnavailable)
    }

    pub fn get(&self, visitor_id: &str) -> Option<VisitorLog> {
        self.store.get(&self.tenant, &visitor_id.to_string())
    }

    /// Replace the visitor's location. Returns false when the visitor is unknown.
    pub fn update_location(&self, visitor_id: &str, location: JsonValue, now: DateTime<Utc>) -> bool {
        self.store
            .update_with(
                &self.tenant,
                visitor_id.to_string(),
                Box::new(move |current| {
                    let mut visitor = current?;
                    visitor.location = Some(location);
                    visitor.updated_at = now;
                    Some(visitor)
                }),
            )
            .is_some()
    }

    pub fn remove(&self, visitor_id: &str) -> bool {
        self.store
            .remove(&self.tenant, &visitor_id.to_string())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::store::InMemoryTenantStore;

    fn visitors() -> Visitors {
        Visitors::new(
            TenantId::new("acme").unwrap(),
            Arc::new(InMemoryTenantStore::<String, VisitorLog>::new()),
        )
    }

    fn input(value: JsonValue) -> VisitorInput {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn create_or_update_merges_and_keeps_created_at() {
        let visitors = visitors();
        let first = Utc::now();
        let later = first + chrono::Duration::minutes(5);

        visitors
            .create_or_update(input(json!({ "visitorId": "v1", "integrationId": "i1" })), first)
            .unwrap();
        let updated = visitors
            .create_or_update(
                input(json!({ "visitorId": "v1", "location": { "city": "Oslo" } })),
                later,
            )
            .unwrap();

        assert_eq!(updated.created_at, first);
        assert_eq!(updated.updated_at, later);
        assert_eq!(updated.attributes.get("integrationId"), Some(&json!("i1")));
        assert_eq!(updated.location, Some(json!({ "city": "Oslo" })));
    }

    #[test]
    fn concurrent_updates_of_one_visitor_keep_every_field() {
        let visitors = visitors();
        let now = Utc::now();
        visitors
            .create_or_update(input(json!({ "visitorId": "v1" })), now)
            .unwrap();

        std::thread::scope(|scope| {
            for n in 0..16 {
                let visitors = &visitors;
                scope.spawn(move || {
                    let field = format!("field{n}");
                    visitors
                        .create_or_update(input(json!({ "visitorId": "v1", field: n })), now)
                        .unwrap();
                    visitors.update_location("v1", json!({ "writer": n }), now);
                });
            }
        });

        let stored = visitors.get("v1").unwrap();
        for n in 0..16 {
            assert_eq!(stored.attributes.get(&format!("field{n}")), Some(&json!(n)));
        }
        assert!(stored.location.is_some());
    }

    #[test]
    fn update_location_of_unknown_visitor_is_noop() {
        let visitors = visitors();
        assert!(!visitors.update_location("ghost", json!({}), Utc::now()));
        assert!(visitors.get("ghost").is_none());
    }

    #[test]
    fn remove_is_idempotent() {
        let visitors = visitors();
        visitors
            .create_or_update(input(json!({ "visitorId": "v1" })), Utc::now())
            .unwrap();

        assert!(visitors.remove("v1"));
        assert!(!visitors.remove("v1"));
    }
}
