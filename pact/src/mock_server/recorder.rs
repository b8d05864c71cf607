//! Per-run coverage bookkeeping for a mock server.

use crate::contract::Interaction;
use crate::error::{CandidateMismatch, MismatchReport, PactError};
use serde::Serialize;
use serde_json::Value;

/// Index of an interaction in registration order.
pub type InteractionId = usize;

/// Coverage of one registered interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InteractionRecord {
    /// Interaction description
    pub description: String,
    /// Provider state of the interaction
    pub provider_state: Option<String>,
    /// Requests that matched this interaction
    pub hits: u64,
    /// Requests with this interaction's method and path that did not match it
    pub mismatched_requests: u64,
}

impl InteractionRecord {
    /// Whether the interaction was exercised at least once.
    #[must_use]
    pub const fn is_hit(&self) -> bool {
        self.hits > 0
    }
}

/// A request no registered interaction accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnmatchedRequest {
    /// Request method
    pub method: String,
    /// Request path
    pub path: String,
    /// Decoded request body, if any
    pub body: Option<Value>,
    /// Interactions with the same method and path, and why they failed
    pub closest: Vec<CandidateMismatch>,
}

impl From<UnmatchedRequest> for PactError {
    fn from(request: UnmatchedRequest) -> Self {
        Self::NoMatchingInteraction {
            method: request.method,
            path: request.path,
            closest: request.closest,
        }
    }
}

/// Flag and counter table for one setup→teardown window. Never persisted.
#[derive(Debug, Clone, Default)]
pub struct RunRecord {
    interactions: Vec<InteractionRecord>,
    unmatched: Vec<UnmatchedRequest>,
}

impl RunRecord {
    /// Start a record for the given interactions, all unhit.
    #[must_use]
    pub fn new(interactions: &[Interaction]) -> Self {
        Self {
            interactions: interactions
                .iter()
                .map(|i| InteractionRecord {
                    description: i.description.clone(),
                    provider_state: i.provider_state.clone(),
                    hits: 0,
                    mismatched_requests: 0,
                })
                .collect(),
            unmatched: Vec::new(),
        }
    }

    /// Count a matching request.
    pub fn mark_hit(&mut self, id: InteractionId) {
        if let Some(record) = self.interactions.get_mut(id) {
            record.hits += 1;
        }
    }

    /// Count a request that shared method and path with an interaction but
    /// failed to match it.
    pub fn record_mismatch(&mut self, id: InteractionId) {
        if let Some(record) = self.interactions.get_mut(id) {
            record.mismatched_requests += 1;
        }
    }

    /// Remember a request nothing matched.
    pub fn record_unmatched(&mut self, request: UnmatchedRequest) {
        self.unmatched.push(request);
    }

    /// Every interaction hit and no request left unmatched.
    #[must_use]
    pub fn is_fully_covered(&self) -> bool {
        self.unmatched.is_empty() && self.interactions.iter().all(InteractionRecord::is_hit)
    }

    /// Requests nothing matched, in arrival order.
    #[must_use]
    pub fn unmatched_requests(&self) -> &[UnmatchedRequest] {
        &self.unmatched
    }

    /// Per-interaction coverage in registration order.
    #[must_use]
    pub fn interactions(&self) -> &[InteractionRecord] {
        &self.interactions
    }

    /// Interactions never exercised.
    pub fn uncovered(&self) -> impl Iterator<Item = &InteractionRecord> {
        self.interactions.iter().filter(|r| !r.is_hit())
    }

    /// Every problem of the run: unmatched requests first, then uncovered
    /// interactions.
    #[must_use]
    pub fn failures(&self) -> MismatchReport {
        let unmatched = self.unmatched.iter().cloned().map(PactError::from);
        let uncovered = self.uncovered().map(|r| PactError::UncoveredInteraction {
            description: r.description.clone(),
            provider_state: r.provider_state.clone(),
        });
        MismatchReport {
            failures: unmatched.chain(uncovered).collect(),
        }
    }
}
