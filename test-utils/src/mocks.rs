//! Mock implementations for testing.
//!
//! In-memory stand-ins for the broker and the provider state hook.

use async_trait::async_trait;
use contract_pact::{
    BrokerClient, BrokerPact, CanIDeployResult, ConsumerVersionSelector, Contract,
    ContractVersion, MatrixEntry, PactError, PactResult, ProviderStateHandler, VerificationResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// A contract as the mock broker stores it.
#[derive(Debug, Clone)]
pub struct PublishedContract {
    /// The contract document
    pub contract: Contract,
    /// Consumer version it was published for
    pub version: ContractVersion,
}

/// Mock broker client for testing.
#[derive(Debug, Default, Clone)]
pub struct MockBrokerClient {
    published: Arc<RwLock<Vec<PublishedContract>>>,
    verifications: Arc<RwLock<Vec<VerificationResult>>>,
    pending: Arc<RwLock<HashSet<String>>>,
    unavailable: Arc<AtomicBool>,
}

impl MockBrokerClient {
    /// Create a new mock broker client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail as if the broker were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Mark contracts from `consumer` as pending.
    pub async fn mark_pending(&self, consumer: &str) {
        self.pending.write().await.insert(consumer.to_string());
    }

    /// Get all published contracts.
    pub async fn get_published(&self) -> Vec<PublishedContract> {
        self.published.read().await.clone()
    }

    /// Get all reported verification results.
    pub async fn get_verifications(&self) -> Vec<VerificationResult> {
        self.verifications.read().await.clone()
    }

    fn check_available(&self) -> PactResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PactError::broker("mock broker unavailable"));
        }
        Ok(())
    }

    fn selected(entry: &PublishedContract, selectors: &[ConsumerVersionSelector]) -> bool {
        if selectors.is_empty() {
            return true;
        }
        selectors.iter().any(|selector| {
            let consumer_ok = selector
                .consumer
                .as_ref()
                .is_none_or(|c| *c == entry.contract.consumer.name);
            let branch_ok = selector
                .branch
                .as_ref()
                .is_none_or(|b| entry.version.branch.as_ref() == Some(b));
            let tag_ok = selector
                .tag
                .as_ref()
                .is_none_or(|t| entry.version.tags.contains(t));
            consumer_ok && branch_ok && tag_ok
        })
    }
}

#[async_trait]
impl BrokerClient for MockBrokerClient {
    async fn publish(&self, contract: &Contract, version: &ContractVersion) -> PactResult<()> {
        self.check_available()?;
        self.published.write().await.push(PublishedContract {
            contract: contract.clone(),
            version: version.clone(),
        });
        Ok(())
    }

    async fn fetch(&self, provider: &str, selectors: &[ConsumerVersionSelector]) -> PactResult<Vec<BrokerPact>> {
        self.check_available()?;
        let published = self.published.read().await;
        let pending = self.pending.read().await;

        // Latest matching publication per consumer.
        let mut pacts: Vec<BrokerPact> = Vec::new();
        for entry in published.iter().rev() {
            let consumer = &entry.contract.consumer.name;
            if entry.contract.provider.name != provider
                || !Self::selected(entry, selectors)
                || pacts.iter().any(|p| &p.contract.consumer.name == consumer)
            {
                continue;
            }
            pacts.push(BrokerPact {
                contract: entry.contract.clone(),
                source_url: Some(format!("mock://pacts/{provider}/{consumer}/{}", entry.version.version)),
                verification_url: Some(format!("mock://verifications/{provider}/{consumer}")),
                pending: pending.contains(consumer),
            });
        }
        pacts.reverse();
        Ok(pacts)
    }

    async fn publish_verification(&self, pact: &BrokerPact, result: &VerificationResult) -> PactResult<()> {
        self.check_available()?;
        if pact.verification_url.is_none() {
            return Err(PactError::broker("pact has no verification link"));
        }
        self.verifications.write().await.push(result.clone());
        Ok(())
    }

    async fn can_i_deploy(&self, pacticipant: &str, version: &str) -> PactResult<CanIDeployResult> {
        self.check_available()?;
        let published = self.published.read().await;
        let verifications = self.verifications.read().await;

        let matrix = published
            .iter()
            .filter(|p| p.contract.consumer.name == pacticipant && p.version.version == version)
            .map(|p| {
                let provider = &p.contract.provider.name;
                verifications
                    .iter()
                    .rev()
                    .find(|v| v.consumer == pacticipant && &v.provider == provider)
                    .map_or_else(
                        || MatrixEntry::unverified(pacticipant, version, provider.clone()),
                        |v| MatrixEntry::new(pacticipant, version, provider.clone(), v.provider_version.clone(), v.success),
                    )
            })
            .collect();
        Ok(CanIDeployResult::from_matrix(matrix))
    }
}

/// Provider state handler that records every state it is asked to set.
#[derive(Debug, Default, Clone)]
pub struct RecordingStateHandler {
    states: Arc<RwLock<Vec<String>>>,
    failing: Arc<RwLock<HashSet<String>>>,
}

impl RecordingStateHandler {
    /// Create a new recording handler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make setup of `state` fail.
    pub async fn fail_on(&self, state: &str) {
        self.failing.write().await.insert(state.to_string());
    }

    /// States set so far, in call order.
    pub async fn get_states(&self) -> Vec<String> {
        self.states.read().await.clone()
    }
}

#[async_trait]
impl ProviderStateHandler for RecordingStateHandler {
    async fn set_state(&self, state: &str) -> PactResult<()> {
        self.states.write().await.push(state.to_string());
        if self.failing.read().await.contains(state) {
            return Err(PactError::state_setup(state, "mock failure"));
        }
        Ok(())
    }
}
