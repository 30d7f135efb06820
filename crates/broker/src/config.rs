//! Broker configuration.

use std::time::Duration;

use tracing::warn;

/// Default bound on an outbound RPC wait.
pub const DEFAULT_RPC_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_SERVICE_NAME: &str = "SWITCHYARD_SERVICE_NAME";
const ENV_CAPABILITY_NAMESPACE: &str = "SWITCHYARD_CAPABILITY_NAMESPACE";
const ENV_RPC_TIMEOUT_MS: &str = "SWITCHYARD_RPC_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    /// Logical name of this service (log/trace field only).
    pub service_name: String,
    /// Middle segment of outbound queue names: `<service>:<namespace>.<capability>`.
    pub capability_namespace: String,
    /// Outbound RPC wait bound, unless a request overrides it.
    pub rpc_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            service_name: "logs".to_string(),
            capability_namespace: "logs".to_string(),
            rpc_timeout: DEFAULT_RPC_TIMEOUT,
        }
    }
}

impl BrokerConfig {
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    pub fn with_capability_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.capability_namespace = namespace.into();
        self
    }

    pub fn with_rpc_timeout(mut self, timeout: Duration) -> Self {
        self.rpc_timeout = timeout;
        self
    }

    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from a key lookup; unset keys keep defaults, unparsable ones are logged
    /// and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(name) = lookup(ENV_SERVICE_NAME).filter(|v| !v.trim().is_empty()) {
            config.service_name = name;
        }

        if let Some(ns) = lookup(ENV_CAPABILITY_NAMESPACE).filter(|v| !v.trim().is_empty()) {
            config.capability_namespace = ns;
        }

        if let Some(raw) = lookup(ENV_RPC_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.rpc_timeout = Duration::from_millis(ms),
                _ => warn!(
                    key = ENV_RPC_TIMEOUT_MS,
                    value = %raw,
                    "invalid RPC timeout; using default"
                ),
            }
        }

        config
    }
}
