//! Tracing subscriber initialization.
//!
//! Logs go to stderr so a verification report printed on stdout stays
//! machine-readable.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Component name, recorded on the startup event
    pub service_name: String,
    /// Log level filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Whether to output JSON format
    pub json_output: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            service_name: "contract-testing".to_string(),
            log_level: "info".to_string(),
            json_output: false,
        }
    }
}

impl TracingConfig {
    /// Defaults overridden by `PACT_LOG_LEVEL` and `PACT_LOG_FORMAT=json`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Same as [`Self::from_env`] with an injectable lookup.
    #[must_use]
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(level) = lookup("PACT_LOG_LEVEL") {
            config.log_level = level;
        }
        config.json_output = lookup("PACT_LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json"));
        config
    }

    /// Set the component name.
    #[must_use]
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the log level.
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable JSON output.
    #[must_use]
    pub const fn with_json_output(mut self) -> Self {
        self.json_output = true;
        self
    }
}

/// Initialize the global tracing subscriber.
///
/// Returns `false` when a subscriber was already installed, which happens
/// when several tests in one process ask for logging.
pub fn init_tracing(config: &TracingConfig) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = if config.json_output {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
            .is_ok()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .is_ok()
    };

    if installed {
        tracing::debug!(service = %config.service_name, "Tracing initialized");
    }
    installed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.service_name, "contract-testing");
        assert_eq!(config.log_level, "info");
        assert!(!config.json_output);
    }

    #[test]
    fn test_config_builder() {
        let config = TracingConfig::default()
            .with_service_name("contract-verifier")
            .with_log_level("debug")
            .with_json_output();

        assert_eq!(config.service_name, "contract-verifier");
        assert_eq!(config.log_level, "debug");
        assert!(config.json_output);
    }

    #[test]
    fn test_from_vars() {
        let config = TracingConfig::from_vars(|name| match name {
            "PACT_LOG_LEVEL" => Some("contract_pact=debug".to_string()),
            "PACT_LOG_FORMAT" => Some("JSON".to_string()),
            _ => None,
        });
        assert_eq!(config.log_level, "contract_pact=debug");
        assert!(config.json_output);

        let config = TracingConfig::from_vars(|_| None);
        assert_eq!(config.log_level, "info");
        assert!(!config.json_output);
    }

    #[test]
    fn test_second_init_is_harmless() {
        let config = TracingConfig::default();
        init_tracing(&config);
        assert!(!init_tracing(&config));
    }
}
