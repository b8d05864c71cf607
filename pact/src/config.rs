//! Typed configuration with validation and environment variable support.

use crate::broker::ConsumerVersionSelector;
use crate::matchers::MatchMode;
use contract_common::HttpConfig;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Default directory contract documents are written to.
pub const DEFAULT_PACT_DIR: &str = "./target/pacts";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid URL format
    #[error("Invalid URL for {field}: {reason}")]
    InvalidUrl {
        /// Variable or field name
        field: String,
        /// Parse failure
        reason: String,
    },

    /// Missing required field
    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    /// Invalid timeout value
    #[error("Invalid timeout: must be greater than 0")]
    InvalidTimeout,

    /// Environment variable parse error
    #[error("Failed to parse environment variable {name}: {reason}")]
    ParseError {
        /// Variable name
        name: String,
        /// Parse failure
        reason: String,
    },
}

/// Mock provider server settings.
#[derive(Debug, Clone)]
pub struct MockServerConfig {
    /// Address to bind (default: 127.0.0.1)
    pub host: String,
    /// Port to bind; 0 picks a free port (default: 0)
    pub port: u16,
    /// Object/array tolerance for request matching
    pub match_mode: MatchMode,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            match_mode: MatchMode::Loose,
        }
    }
}

impl MockServerConfig {
    /// Bind to a fixed port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the match mode.
    #[must_use]
    pub const fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }
}

/// Consumer side settings: who talks to whom and where contracts go.
#[derive(Debug, Clone)]
pub struct PactConfig {
    /// Consumer name
    pub consumer: String,
    /// Provider name
    pub provider: String,
    /// Directory contract documents are written to
    pub pact_dir: PathBuf,
}

impl PactConfig {
    /// Create a config; the directory comes from `PACT_DIR` or defaults to
    /// [`DEFAULT_PACT_DIR`].
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
            provider: provider.into(),
            pact_dir: env::var("PACT_DIR").map_or_else(|_| PathBuf::from(DEFAULT_PACT_DIR), PathBuf::from),
        }
    }

    /// Set the output directory.
    #[must_use]
    pub fn with_pact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.pact_dir = dir.into();
        self
    }
}

/// Provider verification settings.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Provider name; contracts for other providers are skipped
    pub provider_name: String,
    /// Base URL of the running provider
    pub provider_base_url: Url,
    /// Provider version reported with verification results
    pub provider_version: Option<String>,
    /// Provider branch reported with verification results
    pub provider_branch: Option<String>,
    /// Endpoint accepting provider state setup calls
    pub provider_states_setup_url: Option<Url>,
    /// Local contract documents to verify
    pub pact_files: Vec<PathBuf>,
    /// Broker to fetch contracts from
    pub broker_url: Option<Url>,
    /// Bearer token for the broker
    pub broker_token: Option<String>,
    /// Consumer versions to fetch from the broker
    pub consumer_version_selectors: Vec<ConsumerVersionSelector>,
    /// Whether to publish results to the broker
    pub publish_results: bool,
    /// Bound on every request sent to the provider
    pub request_timeout: Duration,
    /// Object/array tolerance for response matching
    pub match_mode: MatchMode,
}

impl VerifierConfig {
    /// Loads configuration from environment variables (and `.env`) with validation.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable cannot be parsed or a required one is missing.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Loads configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable cannot be parsed or a required one is missing.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            provider_name: lookup("PROVIDER_NAME")
                .ok_or_else(|| ConfigError::MissingRequired("PROVIDER_NAME".to_string()))?,
            provider_base_url: parse_url(
                "PROVIDER_BASE_URL",
                &lookup("PROVIDER_BASE_URL").unwrap_or_else(|| "http://127.0.0.1:3000".to_string()),
            )?,
            provider_version: lookup("PROVIDER_VERSION"),
            provider_branch: lookup("PROVIDER_BRANCH"),
            provider_states_setup_url: lookup("PROVIDER_STATES_SETUP_URL")
                .map(|u| parse_url("PROVIDER_STATES_SETUP_URL", &u))
                .transpose()?,
            pact_files: lookup("PACT_FILES")
                .map(|v| parse_list(&v).into_iter().map(PathBuf::from).collect())
                .unwrap_or_default(),
            broker_url: lookup("PACT_BROKER_URL")
                .map(|u| parse_url("PACT_BROKER_URL", &u))
                .transpose()?,
            broker_token: lookup("PACT_BROKER_TOKEN"),
            consumer_version_selectors: parse_selectors(lookup("PACT_CONSUMER_BRANCH")),
            publish_results: parse_var(&lookup, "PACT_PUBLISH_RESULTS", false)?,
            request_timeout: Duration::from_secs(parse_var(&lookup, "PACT_REQUEST_TIMEOUT_SECS", 30)?),
            match_mode: if parse_var(&lookup, "PACT_STRICT", false)? {
                MatchMode::Strict
            } else {
                MatchMode::Loose
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.provider_name.trim().is_empty() {
            return Err(ConfigError::MissingRequired("PROVIDER_NAME".to_string()));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.pact_files.is_empty() && self.broker_url.is_none() {
            return Err(ConfigError::MissingRequired(
                "PACT_FILES or PACT_BROKER_URL".to_string(),
            ));
        }
        if self.publish_results {
            if self.broker_url.is_none() {
                return Err(ConfigError::MissingRequired(
                    "PACT_BROKER_URL (required to publish results)".to_string(),
                ));
            }
            if self.provider_version.is_none() {
                return Err(ConfigError::MissingRequired(
                    "PROVIDER_VERSION (required to publish results)".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// HTTP client settings for calls to the provider.
    #[must_use]
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig::default()
            .with_timeout(self.request_timeout)
            .with_user_agent(format!("contract-verifier/{}", env!("CARGO_PKG_VERSION")))
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val.trim().parse().map_err(|e: T::Err| ConfigError::ParseError {
            name: name.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_url(name: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        field: name.to_string(),
        reason: e.to_string(),
    })
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_selectors(branch: Option<String>) -> Vec<ConsumerVersionSelector> {
    match branch {
        Some(branch) => vec![ConsumerVersionSelector::for_branch(branch)],
        None => vec![ConsumerVersionSelector::latest()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_minimal_local_config() {
        let config = VerifierConfig::from_vars(vars(&[
            ("PROVIDER_NAME", "feat1 provider"),
            ("PACT_FILES", "a.json, b.json,"),
        ]))
        .unwrap();

        assert_eq!(config.provider_base_url.as_str(), "http://127.0.0.1:3000/");
        assert_eq!(config.pact_files, vec![PathBuf::from("a.json"), PathBuf::from("b.json")]);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.match_mode, MatchMode::Loose);
        assert_eq!(config.consumer_version_selectors, vec![ConsumerVersionSelector::latest()]);
    }

    #[test]
    fn test_broker_config() {
        let config = VerifierConfig::from_vars(vars(&[
            ("PROVIDER_NAME", "feat1 provider"),
            ("PROVIDER_VERSION", "1.0.0"),
            ("PACT_BROKER_URL", "http://127.0.0.1:9292"),
            ("PACT_PUBLISH_RESULTS", "true"),
            ("PACT_STRICT", "true"),
            ("PACT_CONSUMER_BRANCH", "main"),
        ]))
        .unwrap();

        assert!(config.publish_results);
        assert_eq!(config.match_mode, MatchMode::Strict);
        assert_eq!(
            config.consumer_version_selectors,
            vec![ConsumerVersionSelector::for_branch("main")]
        );
    }

    #[test]
    fn test_missing_sources_rejected() {
        let err = VerifierConfig::from_vars(vars(&[("PROVIDER_NAME", "p")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingRequired(_)));
    }

    #[test]
    fn test_publish_requires_version() {
        let err = VerifierConfig::from_vars(vars(&[
            ("PROVIDER_NAME", "p"),
            ("PACT_BROKER_URL", "http://broker"),
            ("PACT_PUBLISH_RESULTS", "true"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PROVIDER_VERSION"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_url = VerifierConfig::from_vars(vars(&[
            ("PROVIDER_NAME", "p"),
            ("PACT_FILES", "a.json"),
            ("PROVIDER_BASE_URL", "not a url"),
        ]));
        assert!(matches!(bad_url, Err(ConfigError::InvalidUrl { .. })));

        let zero_timeout = VerifierConfig::from_vars(vars(&[
            ("PROVIDER_NAME", "p"),
            ("PACT_FILES", "a.json"),
            ("PACT_REQUEST_TIMEOUT_SECS", "0"),
        ]));
        assert!(matches!(zero_timeout, Err(ConfigError::InvalidTimeout)));

        let bad_bool = VerifierConfig::from_vars(vars(&[
            ("PROVIDER_NAME", "p"),
            ("PACT_FILES", "a.json"),
            ("PACT_STRICT", "yes please"),
        ]));
        assert!(matches!(bad_bool, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_pact_config_builder() {
        let config = PactConfig::new("consumer", "provider").with_pact_dir("/tmp/pacts");
        assert_eq!(config.pact_dir, PathBuf::from("/tmp/pacts"));
    }

    #[test]
    fn test_mock_server_defaults() {
        let config = MockServerConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 0);
        assert_eq!(config.match_mode, MatchMode::Loose);
    }
}
