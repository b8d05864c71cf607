//! Provider verification: replay a contract against a running provider.
//!
//! Interactions are replayed serially, one at a time, so that state setup
//! hooks stay deterministic. A failing interaction never stops the run;
//! every interaction is attempted and reported.

mod report;
mod state;

pub use report::{InteractionOutcome, InteractionResult, VerificationReport};
pub use state::{HttpStateHandler, NoopStateHandler, ProviderStateHandler, StateHandlers};

use crate::contract::{Contract, Interaction};
use crate::error::{PactError, PactResult};
use crate::matchers::{MatchMode, Mismatch, match_body, match_headers, render_body};
use contract_common::{HttpConfig, build_http_client};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Replays contract interactions as real HTTP requests and checks the
/// provider's responses.
///
/// ```no_run
/// # async fn run(contract: contract_pact::Contract) -> contract_pact::PactResult<()> {
/// use contract_common::HttpConfig;
/// use contract_pact::{ProviderVerifier, StateHandlers};
///
/// let verifier = ProviderVerifier::new(&HttpConfig::default())?
///     .with_state_handler(StateHandlers::new().on("Hello API", || async { Ok(()) }));
/// let base = url::Url::parse("http://127.0.0.1:3000").expect("valid url");
/// let report = verifier.verify(&contract, &base).await;
/// assert!(report.is_success(), "{report}");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ProviderVerifier {
    client: reqwest::Client,
    state_handler: Arc<dyn ProviderStateHandler>,
    match_mode: MatchMode,
    headers: Vec<(String, String)>,
}

impl std::fmt::Debug for ProviderVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderVerifier")
            .field("match_mode", &self.match_mode)
            .field("headers", &self.headers.iter().map(|(n, _)| n).collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ProviderVerifier {
    /// Create a verifier whose requests are bounded by `config.timeout`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &HttpConfig) -> PactResult<Self> {
        Ok(Self {
            client: build_http_client(config)?,
            state_handler: Arc::new(NoopStateHandler),
            match_mode: MatchMode::Loose,
            headers: Vec::new(),
        })
    }

    /// Set the provider state hook.
    #[must_use]
    pub fn with_state_handler(mut self, handler: impl ProviderStateHandler + 'static) -> Self {
        self.state_handler = Arc::new(handler);
        self
    }

    /// Set the object/array tolerance for response bodies.
    #[must_use]
    pub const fn with_match_mode(mut self, mode: MatchMode) -> Self {
        self.match_mode = mode;
        self
    }

    /// Add a header to every replayed request, e.g. credentials the contract
    /// leaves out.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Verify every interaction of `contract` against the provider at `base_url`.
    pub async fn verify(&self, contract: &Contract, base_url: &Url) -> VerificationReport {
        self.verify_until(contract, base_url, std::future::pending()).await
    }

    /// Like [`verify`](Self::verify), but stops when `cancel` completes.
    ///
    /// An in-flight interaction is abandoned; it and every later interaction
    /// are reported `NotAttempted`. Results already collected are kept.
    #[instrument(skip(self, contract, cancel), fields(consumer = %contract.consumer.name, provider = %contract.provider.name, %base_url))]
    pub async fn verify_until<C>(&self, contract: &Contract, base_url: &Url, cancel: C) -> VerificationReport
    where
        C: Future<Output = ()>,
    {
        tokio::pin!(cancel);
        let mut cancelled = false;
        let mut results = Vec::with_capacity(contract.interactions.len());

        for interaction in &contract.interactions {
            let started = Instant::now();
            let outcome = if cancelled {
                InteractionOutcome::NotAttempted
            } else {
                tokio::select! {
                    biased;
                    () = &mut cancel => {
                        warn!("Verification cancelled");
                        cancelled = true;
                        InteractionOutcome::NotAttempted
                    }
                    result = self.verify_interaction(interaction, base_url) => match result {
                        Ok(()) => InteractionOutcome::Passed,
                        Err(e) => InteractionOutcome::Failed(e),
                    },
                }
            };
            results.push(InteractionResult {
                description: interaction.description.clone(),
                provider_state: interaction.provider_state.clone(),
                outcome,
                duration: started.elapsed(),
            });
        }

        let report = VerificationReport {
            consumer: contract.consumer.name.clone(),
            provider: contract.provider.name.clone(),
            results,
        };
        info!(
            interactions = report.results.len(),
            passed = report.passed(),
            success = report.is_success(),
            "Verification finished"
        );
        report
    }

    #[instrument(skip_all, fields(interaction = %interaction.description))]
    async fn verify_interaction(&self, interaction: &Interaction, base_url: &Url) -> PactResult<()> {
        if let Some(state) = &interaction.provider_state {
            self.state_handler.set_state(state).await?;
        }

        let expected = &interaction.request;
        let url = provider_url(base_url, &expected.path);
        let method = reqwest::Method::from_bytes(expected.method.as_bytes())
            .map_err(|e| PactError::malformed(&interaction.description, e))?;

        let mut request = self.client.request(method.clone(), url.clone());
        let mut content_type = None;
        for (name, value) in &expected.headers {
            if name.eq_ignore_ascii_case("content-type") {
                content_type = Some(value.to_ascii_lowercase());
            }
            request = request.header(name.as_str(), value.as_str());
        }
        for (name, value) in &self.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &expected.body {
            if content_type.is_none() {
                request = request.header("Content-Type", "application/json");
            }
            let json = content_type.as_deref().is_none_or(|ct| ct.contains("json"));
            request = request.body(render_body(body, json));
        }

        debug!(%method, %url, "Replaying request");
        let response = request
            .send()
            .await
            .map_err(|e| PactError::unreachable(format!("{method} {url}: {e}")))?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(n, v)| v.to_str().ok().map(|v| (n.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| PactError::unreachable(format!("{method} {url}: reading body: {e}")))?;

        let want = &interaction.response;
        let mut result = match_headers(
            headers.iter().map(|(n, v)| (n.as_str(), v.as_str())),
            &want.headers,
        );
        result.extend(match_body(&body, want.body.as_ref(), self.match_mode));
        let mut mismatches = result.into_mismatches();
        if status != want.status {
            mismatches.insert(
                0,
                Mismatch::new("$.status", want.status.to_string(), Some(json!(status))),
            );
        }

        if mismatches.is_empty() {
            debug!("Interaction verified");
            Ok(())
        } else {
            warn!(mismatches = mismatches.len(), "Interaction failed");
            Err(PactError::Mismatch {
                interaction: interaction.description.clone(),
                mismatches,
            })
        }
    }
}

/// `base_url` with `path` appended to its own path.
fn provider_url(base_url: &Url, path: &str) -> Url {
    let mut url = base_url.clone();
    let joined = format!(
        "{}/{}",
        base_url.path().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    url.set_path(&joined);
    url
}
