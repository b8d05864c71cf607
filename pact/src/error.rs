//! Contract testing error types using thiserror 2.0.
//!
//! Matching itself never fails (see [`crate::matchers`]); these errors are
//! what the mock server, the contract store and the provider verifier
//! surface to their callers.

use crate::config::ConfigError;
use crate::matchers::Mismatch;
use contract_common::PlatformError;
use contract_common::retry::Retryable;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Closest registered interaction for a request nothing matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateMismatch {
    /// Description of the registered interaction
    pub interaction: String,
    /// Why it did not match
    pub mismatches: Vec<Mismatch>,
}

/// Contract testing errors.
#[derive(Error, Debug)]
pub enum PactError {
    /// The mock server received a request no registered interaction accepts
    #[error("No interaction found for {method} {path}{}", describe_candidates(.closest))]
    NoMatchingInteraction {
        /// Request method
        method: String,
        /// Request path
        path: String,
        /// Interactions with the same method and path, and why they failed
        closest: Vec<CandidateMismatch>,
    },

    /// An observed value violates the interaction's specification
    #[error("Interaction '{interaction}' failed:{}", describe_mismatches(.mismatches))]
    Mismatch {
        /// Interaction description
        interaction: String,
        /// Every violated expectation
        mismatches: Vec<Mismatch>,
    },

    /// A registered interaction was never exercised
    #[error("Interaction '{description}'{} was registered but never received", describe_state(.provider_state))]
    UncoveredInteraction {
        /// Interaction description
        description: String,
        /// Provider state of the interaction
        provider_state: Option<String>,
    },

    /// A contract document could not be parsed
    #[error("Malformed contract document {path}: {reason}")]
    MalformedContractDocument {
        /// Where the document came from
        path: String,
        /// Parse or validation failure
        reason: String,
    },

    /// No contract document at the given location
    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    /// The provider could not be reached or did not answer in time
    #[error("Provider unreachable: {0}")]
    ProviderUnreachable(String),

    /// The provider state hook failed
    #[error("State setup failed for '{state}': {reason}")]
    StateSetupFailed {
        /// Requested provider state
        state: String,
        /// Failure reported by the hook
        reason: String,
    },

    /// Aggregated failures of a mock server run
    #[error("{0}")]
    MockVerification(MismatchReport),

    /// The consumer test body failed
    #[error("Consumer test failed: {0}")]
    ConsumerTest(String),

    /// The broker rejected a request or returned something unexpected
    #[error("Broker error: {0}")]
    Broker(String),

    /// The mock server could not be started
    #[error("Mock server error: {0}")]
    Server(String),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Filesystem error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform error (from contract-common)
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

/// Result type for contract testing operations.
pub type PactResult<T> = Result<T, PactError>;

impl PactError {
    /// Check if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Platform(e) => e.is_retryable(),
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Create a malformed document error.
    #[must_use]
    pub fn malformed(path: impl Into<String>, reason: impl ToString) -> Self {
        Self::MalformedContractDocument {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a provider unreachable error.
    #[must_use]
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::ProviderUnreachable(msg.into())
    }

    /// Create a state setup error.
    #[must_use]
    pub fn state_setup(state: impl Into<String>, reason: impl ToString) -> Self {
        Self::StateSetupFailed {
            state: state.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a broker error.
    #[must_use]
    pub fn broker(msg: impl Into<String>) -> Self {
        Self::Broker(msg.into())
    }
}

impl Retryable for PactError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

/// Every problem found during one mock server run.
#[derive(Debug, Default)]
pub struct MismatchReport {
    /// Failures in the order they were detected
    pub failures: Vec<PactError>,
}

impl MismatchReport {
    /// Whether the run was clean.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// Requests that matched nothing.
    pub fn unmatched(&self) -> impl Iterator<Item = &PactError> {
        self.failures
            .iter()
            .filter(|f| matches!(f, PactError::NoMatchingInteraction { .. }))
    }

    /// Interactions that were never exercised.
    pub fn uncovered(&self) -> impl Iterator<Item = &PactError> {
        self.failures
            .iter()
            .filter(|f| matches!(f, PactError::UncoveredInteraction { .. }))
    }
}

impl fmt::Display for MismatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mock provider verification failed with {} problem(s):",
            self.failures.len()
        )?;
        for (index, failure) in self.failures.iter().enumerate() {
            write!(f, "\n  {}) {failure}", index + 1)?;
        }
        Ok(())
    }
}

fn describe_mismatches(mismatches: &[Mismatch]) -> String {
    mismatches
        .iter()
        .map(|m| format!("\n      - {m}"))
        .collect()
}

fn describe_candidates(candidates: &[CandidateMismatch]) -> String {
    candidates
        .iter()
        .map(|c| {
            format!(
                "\n    closest: '{}'{}",
                c.interaction,
                describe_mismatches(&c.mismatches)
            )
        })
        .collect()
}

fn describe_state(state: &Option<String>) -> String {
    state
        .as_ref()
        .map(|s| format!(" (given {s})"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_display() {
        let err = PactError::UncoveredInteraction {
            description: "a request to update with body".to_string(),
            provider_state: Some("Hello API".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Interaction 'a request to update with body' (given Hello API) was registered but never received"
        );
    }

    #[test]
    fn test_no_match_lists_closest_mismatches() {
        let err = PactError::NoMatchingInteraction {
            method: "PUT".to_string(),
            path: "/hello".to_string(),
            closest: vec![CandidateMismatch {
                interaction: "a request to update with body".to_string(),
                mismatches: vec![Mismatch::new("$.body", "an object", None)],
            }],
        };
        let text = err.to_string();
        assert!(text.starts_with("No interaction found for PUT /hello"));
        assert!(text.contains("$.body: expected an object, but it was missing"));
    }

    #[test]
    fn test_mismatch_lists_every_path() {
        let err = PactError::Mismatch {
            interaction: "get user".to_string(),
            mismatches: vec![
                Mismatch::new("$.status", "200", Some(json!(404))),
                Mismatch::new("$.body.name", "a string", None),
            ],
        };
        let text = err.to_string();
        assert!(text.contains("$.status: expected 200, got 404"));
        assert!(text.contains("$.body.name"));
    }

    #[test]
    fn test_retryable_errors() {
        assert!(PactError::Platform(PlatformError::RateLimited).is_retryable());
        assert!(!PactError::unreachable("refused").is_retryable());
        assert!(!PactError::malformed("pact.json", "eof").is_retryable());
    }

    #[test]
    fn test_report_display_numbers_failures() {
        let report = MismatchReport {
            failures: vec![
                PactError::UncoveredInteraction {
                    description: "a".to_string(),
                    provider_state: None,
                },
                PactError::UncoveredInteraction {
                    description: "b".to_string(),
                    provider_state: None,
                },
            ],
        };
        let text = report.to_string();
        assert!(text.contains("2 problem(s)"));
        assert!(text.contains("1) Interaction 'a'"));
        assert!(text.contains("2) Interaction 'b'"));
        assert_eq!(report.uncovered().count(), 2);
        assert_eq!(report.unmatched().count(), 0);
    }
}
