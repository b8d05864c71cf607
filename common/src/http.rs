//! HTTP client configuration and building.
//!
//! The provider verifier and the broker client both talk HTTP; they build
//! their clients here so timeouts and the user agent stay consistent.

use reqwest::{Client, ClientBuilder};
use std::time::Duration;

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Request timeout (default: 30s)
    pub timeout: Duration,
    /// Connection timeout (default: 5s)
    pub connect_timeout: Duration,
    /// Pool idle timeout (default: 90s)
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host (default: 4)
    pub pool_max_idle_per_host: usize,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 4,
            user_agent: concat!("contract-testing/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl HttpConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Build a configured HTTP client.
///
/// Redirects are not followed: a provider answering with a redirect is
/// answering with a status that the contract has to describe.
///
/// # Errors
///
/// Returns an error if the client cannot be built (e.g., TLS initialization fails).
///
/// # Examples
///
/// ```
/// use contract_common::{HttpConfig, build_http_client};
/// use std::time::Duration;
///
/// let config = HttpConfig::default().with_timeout(Duration::from_secs(5));
/// let client = build_http_client(&config);
/// assert!(client.is_ok());
/// ```
pub fn build_http_client(config: &HttpConfig) -> Result<Client, reqwest::Error> {
    ClientBuilder::new()
        .timeout(config.timeout)
        .connect_timeout(config.connect_timeout)
        .pool_idle_timeout(config.pool_idle_timeout)
        .pool_max_idle_per_host(config.pool_max_idle_per_host)
        .user_agent(&config.user_agent)
        .redirect(reqwest::redirect::Policy::none())
        .use_rustls_tls()
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HttpConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert!(config.user_agent.starts_with("contract-testing/"));
    }

    #[test]
    fn test_config_builder() {
        let config = HttpConfig::default()
            .with_timeout(Duration::from_secs(2))
            .with_connect_timeout(Duration::from_millis(500))
            .with_user_agent("verifier");

        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.user_agent, "verifier");
    }

    #[test]
    fn test_build_client() {
        assert!(build_http_client(&HttpConfig::default()).is_ok());
    }
}
