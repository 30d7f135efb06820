use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};

/// What a service declares about one named capability.
///
/// Registries publish arbitrary metadata per capability; the only field the broker
/// interprets is `provides`, and only the JSON literal `true` counts. Anything else
/// (missing, `"true"`, `1`, a non-object entry) reads as "not provided".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "JsonValue", into = "JsonValue")]
pub struct CapabilityDescriptor {
    provides: bool,
    metadata: Map<String, JsonValue>,
}

impl CapabilityDescriptor {
    pub fn provided() -> Self {
        Self {
            provides: true,
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn provides(&self) -> bool {
        self.provides
    }

    /// Opaque metadata other than `provides`.
    pub fn metadata(&self) -> &Map<String, JsonValue> {
        &self.metadata
    }
}

impl From<JsonValue> for CapabilityDescriptor {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(mut map) => {
                let provides = matches!(map.remove("provides"), Some(JsonValue::Bool(true)));
                Self {
                    provides,
                    metadata: map,
                }
            }
            _ => Self::default(),
        }
    }
}

impl From<CapabilityDescriptor> for JsonValue {
    fn from(value: CapabilityDescriptor) -> Self {
        let mut map = value.metadata;
        map.insert("provides".to_string(), JsonValue::Bool(value.provides));
        JsonValue::Object(map)
    }
}

/// Per-service discovery record: enablement plus declared capabilities.
///
/// Owned by the registry; the broker only reads it and never caches it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    name: String,

    #[serde(default)]
    enabled: bool,

    #[serde(default, deserialize_with = "null_as_empty")]
    capabilities: BTreeMap<String, CapabilityDescriptor>,
}

impl ServiceDescriptor {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            capabilities: BTreeMap::new(),
        }
    }

    pub fn with_capability(
        mut self,
        name: impl Into<String>,
        capability: CapabilityDescriptor,
    ) -> Self {
        self.capabilities.insert(name.into(), capability);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn capability(&self, name: &str) -> Option<&CapabilityDescriptor> {
        self.capabilities.get(name)
    }

    pub fn capabilities(&self) -> &BTreeMap<String, CapabilityDescriptor> {
        &self.capabilities
    }

    /// True only when the capability is declared and its `provides` flag is `true`.
    pub fn provides(&self, capability: &str) -> bool {
        self.capability(capability)
            .map(CapabilityDescriptor::provides)
            .unwrap_or(false)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<BTreeMap<String, CapabilityDescriptor>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<BTreeMap<String, CapabilityDescriptor>>::deserialize(deserializer)
        .map(Option::unwrap_or_default)
}
