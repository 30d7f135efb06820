//! Subscriber initialization.
//!
//! Filtering comes from `RUST_LOG` (falling back to the configured default
//! directive); output is JSON unless `SWITCHYARD_LOG_FORMAT=compact`.

use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_VAR: &str = "SWITCHYARD_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Json,
    /// Single-line human-readable output for local runs.
    Compact,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub default_directive: String,
    pub format: LogFormat,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_directive: "info".to_string(),
            format: LogFormat::Json,
        }
    }
}

impl TracingConfig {
    pub fn with_default_directive(mut self, directive: impl Into<String>) -> Self {
        self.default_directive = directive.into();
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Unknown format values fall back to JSON.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let format = lookup(LOG_FORMAT_VAR)
            .and_then(|raw| LogFormat::parse(&raw))
            .unwrap_or_default();
        Self::default().with_format(format)
    }
}

/// Install the global subscriber. A subscriber that is already installed wins.
pub fn init(config: TracingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_directive));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_comes_from_lookup() {
        let config = TracingConfig::from_lookup(|key| (key == LOG_FORMAT_VAR).then(|| "Compact".to_string()));
        assert_eq!(config.format, LogFormat::Compact);

        let config = TracingConfig::from_lookup(|_| Some("xml".to_string()));
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn init_twice_is_a_noop() {
        init(TracingConfig::default());
        init(TracingConfig::default().with_format(LogFormat::Compact));
    }
}
