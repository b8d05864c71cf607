//! Consumer-driven contract testing.
//!
//! The consumer side registers [`Interaction`]s with a [`MockServer`], drives
//! its client code against it and, when every interaction was exercised,
//! persists the agreed [`Contract`] through the [`ContractStore`]. The
//! provider side replays that contract against a running provider with the
//! [`ProviderVerifier`]. Both directions judge observed values with the
//! [`matchers`] engine.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod broker;
pub mod config;
pub mod consumer;
pub mod contract;
pub mod error;
pub mod matchers;
pub mod matrix;
pub mod mock_server;
pub mod store;
pub mod verification;
pub mod verifier;

pub use broker::{BrokerClient, BrokerConfig, BrokerPact, ConsumerVersionSelector, HttpBrokerClient};
pub use config::{ConfigError, MockServerConfig, PactConfig, VerifierConfig};
pub use consumer::ConsumerPact;
pub use contract::{
    Contract, ContractMetadata, Interaction, InteractionKey, PactSpecification, Participant,
    Request, Response,
};
pub use error::{CandidateMismatch, MismatchReport, PactError, PactResult};
pub use matchers::{MatchMode, MatchResult, Matcher, Mismatch, match_headers, matches};
pub use matrix::{CanIDeployResult, MatrixEntry};
pub use mock_server::{MockRequest, MockResponse, MockServer, RunRecord};
pub use store::ContractStore;
pub use verification::{ContractVersion, VerificationResult};
pub use verifier::{
    HttpStateHandler, InteractionOutcome, InteractionResult, NoopStateHandler,
    ProviderStateHandler, ProviderVerifier, StateHandlers, VerificationReport,
};
