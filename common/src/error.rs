//! Centralized error type for transport-level failures.
//!
//! Every crate in the workspace wraps `PlatformError` for the failures that
//! are not specific to contracts: network calls, (de)serialization, file I/O
//! and timeouts. Each error is classified as retryable or not.

use thiserror::Error;

/// Common error type for platform operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote service is temporarily unavailable
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded
    #[error("Rate limited")]
    RateLimited,

    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Timeout occurred
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlatformError {
    /// Check if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use contract_common::PlatformError;
    ///
    /// assert!(PlatformError::RateLimited.is_retryable());
    /// assert!(!PlatformError::NotFound("pact".to_string()).is_retryable());
    /// ```
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Unavailable(_) | Self::RateLimited | Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Classify an HTTP status returned by a remote service.
    ///
    /// Returns `None` for success statuses.
    #[must_use]
    pub fn from_status(status: u16, context: impl Into<String>) -> Option<Self> {
        let context = context.into();
        match status {
            200..=299 => None,
            404 => Some(Self::NotFound(context)),
            429 => Some(Self::RateLimited),
            500..=599 => Some(Self::Unavailable(format!("status {status}: {context}"))),
            _ => Some(Self::InvalidInput(format!("status {status}: {context}"))),
        }
    }

    /// Create an unavailable error with the given message.
    #[must_use]
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    /// Create an invalid input error with the given message.
    #[must_use]
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a timeout error with the given message.
    #[must_use]
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(PlatformError::RateLimited.is_retryable());
        assert!(PlatformError::unavailable("broker").is_retryable());
        assert!(PlatformError::timeout("provider").is_retryable());
    }

    #[test]
    fn test_non_retryable_errors() {
        assert!(!PlatformError::NotFound("pact".to_string()).is_retryable());
        assert!(!PlatformError::invalid_input("bad selector").is_retryable());
        assert!(!PlatformError::Internal("bug".to_string()).is_retryable());
    }

    #[test]
    fn test_from_status() {
        assert!(PlatformError::from_status(201, "publish").is_none());
        assert!(matches!(
            PlatformError::from_status(404, "pact"),
            Some(PlatformError::NotFound(_))
        ));
        assert!(matches!(
            PlatformError::from_status(429, "matrix"),
            Some(PlatformError::RateLimited)
        ));
        assert!(
            PlatformError::from_status(503, "broker")
                .is_some_and(|e| e.is_retryable())
        );
        assert!(
            PlatformError::from_status(400, "publish")
                .is_some_and(|e| !e.is_retryable())
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(PlatformError::RateLimited.to_string(), "Rate limited");
        assert_eq!(
            PlatformError::timeout("GET /hello").to_string(),
            "Operation timed out: GET /hello"
        );
    }
}
