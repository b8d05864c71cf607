//! Provider state setup hooks.

use crate::error::{PactError, PactResult};
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::json;
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, instrument, warn};
use url::Url;

/// Establishes a named precondition on the provider before an interaction
/// is replayed.
#[async_trait]
pub trait ProviderStateHandler: Send + Sync {
    /// Put the provider into `state`.
    ///
    /// # Errors
    ///
    /// Returns `StateSetupFailed` when the provider could not be prepared.
    async fn set_state(&self, state: &str) -> PactResult<()>;
}

/// Accepts every state without doing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopStateHandler;

#[async_trait]
impl ProviderStateHandler for NoopStateHandler {
    async fn set_state(&self, _state: &str) -> PactResult<()> {
        Ok(())
    }
}

/// Posts `{"state": .., "action": "setup"}` to a setup endpoint exposed by
/// the provider.
#[derive(Debug, Clone)]
pub struct HttpStateHandler {
    client: reqwest::Client,
    url: Url,
}

impl HttpStateHandler {
    /// Create a handler posting to `url`.
    #[must_use]
    pub const fn new(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl ProviderStateHandler for HttpStateHandler {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn set_state(&self, state: &str) -> PactResult<()> {
        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({ "state": state, "action": "setup", "params": {} }))
            .send()
            .await
            .map_err(|e| PactError::state_setup(state, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PactError::state_setup(
                state,
                format!("state endpoint returned {status}: {body}"),
            ));
        }
        debug!("Provider state established");
        Ok(())
    }
}

type StateFn = Box<dyn Fn() -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// In-process handlers keyed by state name. Unknown states are logged and
/// skipped.
///
/// ```
/// use contract_pact::StateHandlers;
///
/// let handlers = StateHandlers::new()
///     .on("Hello API", || async { Ok(()) });
/// assert!(handlers.contains("Hello API"));
/// ```
#[derive(Default)]
pub struct StateHandlers {
    handlers: HashMap<String, StateFn>,
}

impl StateHandlers {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the setup for `state`.
    #[must_use]
    pub fn on<F, Fut>(mut self, state: impl Into<String>, setup: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.handlers
            .insert(state.into(), Box::new(move || Box::pin(setup())));
        self
    }

    /// Whether `state` has a handler.
    #[must_use]
    pub fn contains(&self, state: &str) -> bool {
        self.handlers.contains_key(state)
    }
}

impl fmt::Debug for StateHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandlers")
            .field("states", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[async_trait]
impl ProviderStateHandler for StateHandlers {
    async fn set_state(&self, state: &str) -> PactResult<()> {
        let Some(setup) = self.handlers.get(state) else {
            warn!(state, "No handler for provider state, skipping");
            return Ok(());
        };
        setup()
            .await
            .map_err(|e| PactError::state_setup(state, format!("{e:#}")))
    }
}
