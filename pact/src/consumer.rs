//! Consumer test harness: the setup → exercise → verify → teardown lifecycle.

use crate::config::{MockServerConfig, PactConfig};
use crate::contract::{Contract, Interaction};
use crate::error::{PactError, PactResult};
use crate::mock_server::MockServer;
use crate::store::ContractStore;
use futures::FutureExt;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use tracing::{info, instrument, warn};

/// Interactions a consumer expects from one provider, plus where the agreed
/// contract is written once a test run proves them.
///
/// ```no_run
/// # async fn run() -> contract_pact::PactResult<()> {
/// use contract_pact::{ConsumerPact, Interaction, Request, Response};
///
/// let pact = ConsumerPact::new("web", "api").interaction(Interaction::new(
///     "ping",
///     Request::new("GET", "/ping"),
///     Response::new(200),
/// ));
/// pact.execute_test(|url| async move {
///     reqwest::get(format!("{url}/ping")).await.map(|_| ())
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConsumerPact {
    contract: Contract,
    store: ContractStore,
    server: MockServerConfig,
}

impl ConsumerPact {
    /// Create a harness writing to `PACT_DIR` or `./target/pacts`.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self::with_config(&PactConfig::new(consumer, provider))
    }

    /// Create a harness from explicit settings.
    #[must_use]
    pub fn with_config(config: &PactConfig) -> Self {
        Self {
            contract: Contract::new(config.consumer.clone(), config.provider.clone()),
            store: ContractStore::new(config.pact_dir.clone()),
            server: MockServerConfig::default(),
        }
    }

    /// Override mock server settings.
    #[must_use]
    pub fn with_server_config(mut self, config: MockServerConfig) -> Self {
        self.server = config;
        self
    }

    /// Register an interaction for the next test run.
    #[must_use]
    pub fn interaction(mut self, interaction: Interaction) -> Self {
        self.contract.interactions.push(interaction);
        self
    }

    /// Registered interactions.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.contract.interactions
    }

    /// Where the contract is persisted.
    #[must_use]
    pub const fn store(&self) -> &ContractStore {
        &self.store
    }

    /// Run `test` against a fresh mock server.
    ///
    /// The server is torn down whatever the test does, including panicking;
    /// a panic is resumed afterwards. The contract is written only when the
    /// test succeeded and every interaction was exercised.
    ///
    /// # Errors
    ///
    /// Returns `ConsumerTest` if the test body failed, `MockVerification` if
    /// coverage was incomplete, or a store error if the contract could not
    /// be written.
    #[instrument(skip(self, test), fields(consumer = %self.contract.consumer.name, provider = %self.contract.provider.name))]
    pub async fn execute_test<F, Fut, T, E>(&self, test: F) -> PactResult<T>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let server = MockServer::start(self.contract.interactions.clone(), &self.server).await?;
        let url = server.url();

        let outcome = AssertUnwindSafe(async move { test(url).await })
            .catch_unwind()
            .await;
        let verification = server.verify();
        server.teardown().await;

        let value = match outcome {
            Err(payload) => {
                warn!("Consumer test panicked");
                panic::resume_unwind(payload)
            }
            Ok(Err(e)) => return Err(PactError::ConsumerTest(e.to_string())),
            Ok(Ok(value)) => value,
        };
        verification?;

        let written = self.store.write(&self.contract, &self.contract.interactions)?;
        info!(
            path = %self.store.path_for(&written).display(),
            "Consumer test passed"
        );
        Ok(value)
    }
}
