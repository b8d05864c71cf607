//! Per-interaction outcomes of a provider verification run.

use crate::error::PactError;
use crate::verification::{TestResult, VerificationResult};
use chrono::Utc;
use std::fmt;
use std::time::Duration;

/// What happened to one interaction.
#[derive(Debug)]
pub enum InteractionOutcome {
    /// The provider's response satisfied the interaction
    Passed,
    /// State setup, transport or matching failed
    Failed(PactError),
    /// The run was cancelled before this interaction was replayed
    NotAttempted,
}

/// Outcome of one interaction with its identity.
#[derive(Debug)]
pub struct InteractionResult {
    /// Interaction description
    pub description: String,
    /// Provider state of the interaction
    pub provider_state: Option<String>,
    /// Outcome
    pub outcome: InteractionOutcome,
    /// Time spent on state setup, request and matching
    pub duration: Duration,
}

impl InteractionResult {
    /// Whether the interaction passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self.outcome, InteractionOutcome::Passed)
    }

    /// The failure, if any.
    #[must_use]
    pub const fn error(&self) -> Option<&PactError> {
        match &self.outcome {
            InteractionOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Result of replaying one contract against a provider.
#[derive(Debug)]
pub struct VerificationReport {
    /// Consumer name
    pub consumer: String,
    /// Provider name
    pub provider: String,
    /// One entry per interaction, in contract order
    pub results: Vec<InteractionResult>,
}

impl VerificationReport {
    /// Every interaction attempted and passed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.results.iter().all(InteractionResult::is_passed)
    }

    /// Whether the run stopped before reaching every interaction.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.results
            .iter()
            .any(|r| matches!(r.outcome, InteractionOutcome::NotAttempted))
    }

    /// Number of passed interactions.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.results.iter().filter(|r| r.is_passed()).count()
    }

    /// Failed interactions.
    pub fn failures(&self) -> impl Iterator<Item = &InteractionResult> {
        self.results.iter().filter(|r| r.error().is_some())
    }

    /// Broker-facing result for this run.
    #[must_use]
    pub fn to_result(&self, provider_version: impl Into<String>) -> VerificationResult {
        VerificationResult {
            success: self.is_success(),
            provider: self.provider.clone(),
            consumer: self.consumer.clone(),
            provider_version: provider_version.into(),
            provider_branch: None,
            verified_at: Utc::now(),
            test_results: self
                .results
                .iter()
                .map(|r| TestResult {
                    interaction_description: r.description.clone(),
                    success: r.is_passed(),
                    mismatches: r.error().map(|e| vec![e.to_string()]).unwrap_or_default(),
                })
                .collect(),
        }
    }
}

impl fmt::Display for VerificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Verifying a pact between {} and {}",
            self.consumer, self.provider
        )?;
        for result in &self.results {
            let status = match &result.outcome {
                InteractionOutcome::Passed => "OK",
                InteractionOutcome::Failed(_) => "FAILED",
                InteractionOutcome::NotAttempted => "NOT ATTEMPTED",
            };
            write!(f, "  {}", result.description)?;
            if let Some(state) = &result.provider_state {
                write!(f, " (given {state})")?;
            }
            writeln!(f, " ... {status}")?;
            if let Some(error) = result.error() {
                for line in error.to_string().lines() {
                    writeln!(f, "      {line}")?;
                }
            }
        }
        let failed = self.failures().count();
        write!(
            f,
            "{} interaction(s), {} passed, {failed} failed",
            self.results.len(),
            self.passed()
        )?;
        if self.is_partial() {
            write!(f, " (run cancelled)")?;
        }
        Ok(())
    }
}
