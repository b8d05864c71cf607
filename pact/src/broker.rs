//! Pact Broker client.
//!
//! The broker is a pass-through store: contracts are published after a
//! consumer run, fetched for verification, and verification results are
//! sent back. Only the HAL endpoints those steps need are used.

use crate::contract::Contract;
use crate::error::{PactError, PactResult};
use crate::matrix::{CanIDeployResult, MatrixEntry};
use crate::verification::{ContractVersion, VerificationResult};
use async_trait::async_trait;
use contract_common::{HttpConfig, PlatformError, RetryConfig, RetryPolicy, build_http_client};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, instrument};
use url::Url;

/// Which consumer versions' contracts a provider should verify.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumerVersionSelector {
    /// Latest version (of the tag or branch, if given)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest: Option<bool>,
    /// Consumer branch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Consumer version tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// The consumer's main branch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_branch: Option<bool>,
    /// Versions currently deployed or released
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployed_or_released: Option<bool>,
    /// Restrict to one consumer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumer: Option<String>,
}

impl ConsumerVersionSelector {
    /// Latest version of every consumer.
    #[must_use]
    pub fn latest() -> Self {
        Self {
            latest: Some(true),
            ..Self::default()
        }
    }

    /// Latest version on a branch.
    #[must_use]
    pub fn for_branch(branch: impl Into<String>) -> Self {
        Self {
            branch: Some(branch.into()),
            ..Self::default()
        }
    }

    /// Latest version with a tag.
    #[must_use]
    pub fn for_tag(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            latest: Some(true),
            ..Self::default()
        }
    }

    /// Each consumer's main branch.
    #[must_use]
    pub fn main_branch() -> Self {
        Self {
            main_branch: Some(true),
            ..Self::default()
        }
    }

    /// Deployed or released versions.
    #[must_use]
    pub fn deployed_or_released() -> Self {
        Self {
            deployed_or_released: Some(true),
            ..Self::default()
        }
    }

    /// Restrict to one consumer.
    #[must_use]
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = Some(consumer.into());
        self
    }
}

/// A contract fetched from the broker, with the links needed to report on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerPact {
    /// The contract document
    pub contract: Contract,
    /// Where the document was fetched from
    pub source_url: Option<String>,
    /// Where verification results are posted
    pub verification_url: Option<String>,
    /// Whether the broker considers the pact pending for this provider
    pub pending: bool,
}

/// Broker operations used by consumer and provider pipelines.
#[async_trait]
pub trait BrokerClient: Send + Sync {
    /// Publish a contract for a consumer version.
    async fn publish(&self, contract: &Contract, version: &ContractVersion) -> PactResult<()>;

    /// Fetch the contracts `provider` must verify.
    async fn fetch(&self, provider: &str, selectors: &[ConsumerVersionSelector]) -> PactResult<Vec<BrokerPact>>;

    /// Report a verification result for a fetched contract.
    async fn publish_verification(&self, pact: &BrokerPact, result: &VerificationResult) -> PactResult<()>;

    /// Ask whether a participant version may be deployed.
    async fn can_i_deploy(&self, pacticipant: &str, version: &str) -> PactResult<CanIDeployResult>;
}

/// Broker location and credentials.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Broker base URL
    pub base_url: Url,
    /// Bearer token
    pub token: Option<String>,
    /// HTTP client settings
    pub http: HttpConfig,
    /// Retry settings for transient failures
    pub retry: RetryConfig,
}

impl BrokerConfig {
    /// Create a config with default HTTP and retry settings.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            token: None,
            http: HttpConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    /// Set the bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set retry settings.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// [`BrokerClient`] speaking the Pact Broker HAL API.
#[derive(Debug, Clone)]
pub struct HttpBrokerClient {
    client: reqwest::Client,
    config: BrokerConfig,
    retry: RetryPolicy,
}

impl HttpBrokerClient {
    /// Create a client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: BrokerConfig) -> PactResult<Self> {
        Ok(Self {
            client: build_http_client(&config.http)?,
            retry: RetryPolicy::new(config.retry.clone()),
            config,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> PactResult<Url> {
        let mut url = self.config.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| PactError::broker(format!("invalid broker URL {}", self.config.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send with auth and retries; non-2xx statuses become errors.
    async fn send<F>(&self, build: F) -> PactResult<reqwest::Response>
    where
        F: Fn(&reqwest::Client) -> reqwest::RequestBuilder + Sync,
    {
        let build = &build;
        self.retry
            .execute(move || async move {
                let mut request = build(&self.client);
                if let Some(token) = &self.config.token {
                    request = request.bearer_auth(token);
                }
                let response = request.send().await?;
                let status = response.status();
                if let Some(err) = PlatformError::from_status(status.as_u16(), response.url().to_string()) {
                    let body = response.text().await.unwrap_or_default();
                    debug!(%status, body = %body, "Broker request failed");
                    return Err(PactError::Platform(err));
                }
                Ok(response)
            })
            .await
    }

    async fn get_json(&self, url: &str) -> PactResult<Value> {
        let response = self.send(|c| c.get(url)).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl BrokerClient for HttpBrokerClient {
    #[instrument(skip(self, contract), fields(consumer = %contract.consumer.name, provider = %contract.provider.name, version = %version.version))]
    async fn publish(&self, contract: &Contract, version: &ContractVersion) -> PactResult<()> {
        let consumer = contract.consumer.name.as_str();
        let url = self.endpoint(&[
            "pacts",
            "provider",
            &contract.provider.name,
            "consumer",
            consumer,
            "version",
            &version.version,
        ])?;
        self.send(|c| c.put(url.clone()).json(contract)).await?;

        if let Some(branch) = &version.branch {
            let url = self.endpoint(&["pacticipants", consumer, "branches", branch, "versions", &version.version])?;
            self.send(|c| c.put(url.clone()).json(&json!({}))).await?;
        }
        for tag in &version.tags {
            let url = self.endpoint(&["pacticipants", consumer, "versions", &version.version, "tags", tag])?;
            self.send(|c| c.put(url.clone()).json(&json!({}))).await?;
        }

        info!(interactions = contract.interactions.len(), "Contract published");
        Ok(())
    }

    #[instrument(skip(self, selectors))]
    async fn fetch(&self, provider: &str, selectors: &[ConsumerVersionSelector]) -> PactResult<Vec<BrokerPact>> {
        let url = self.endpoint(&["pacts", "provider", provider, "for-verification"])?;
        let body = json!({
            "consumerVersionSelectors": selectors,
            "includePendingStatus": true,
        });
        let listing: ForVerification = self
            .send(|c| c.post(url.clone()).json(&body))
            .await?
            .json()
            .await?;

        let mut pacts = Vec::with_capacity(listing.embedded.pacts.len());
        for entry in listing.embedded.pacts {
            let href = entry.links.self_link.href;
            let document = self.get_json(&href).await?;
            let verification_url = document
                .pointer("/_links/pb:publish-verification-results/href")
                .and_then(Value::as_str)
                .map(String::from);
            let contract: Contract =
                serde_json::from_value(document).map_err(|e| PactError::malformed(&href, e))?;
            pacts.push(BrokerPact {
                contract,
                source_url: Some(href),
                verification_url,
                pending: entry.verification_properties.pending,
            });
        }

        info!(count = pacts.len(), "Contracts fetched");
        Ok(pacts)
    }

    #[instrument(skip(self, pact, result), fields(consumer = %result.consumer, success = result.success))]
    async fn publish_verification(&self, pact: &BrokerPact, result: &VerificationResult) -> PactResult<()> {
        let url = pact
            .verification_url
            .as_deref()
            .ok_or_else(|| PactError::broker("contract has no verification results link"))?;
        let body = json!({
            "success": result.success,
            "providerApplicationVersion": result.provider_version,
            "providerVersionBranch": result.provider_branch,
            "verifiedBy": {
                "implementation": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "testResults": result.test_results,
        });
        self.send(|c| c.post(url).json(&body)).await?;
        info!("Verification result published");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn can_i_deploy(&self, pacticipant: &str, version: &str) -> PactResult<CanIDeployResult> {
        let mut url = self.endpoint(&["matrix"])?;
        url.query_pairs_mut()
            .append_pair("q[][pacticipant]", pacticipant)
            .append_pair("q[][version]", version)
            .append_pair("latestby", "cvp")
            .append_pair("latest", "true");

        let matrix: MatrixResponse = self.send(|c| c.get(url.clone())).await?.json().await?;
        let entries = matrix
            .matrix
            .into_iter()
            .map(|row| match (row.provider.version, row.verification_result) {
                (Some(provider_version), Some(verification)) => MatrixEntry::new(
                    row.consumer.name,
                    row.consumer.version.number,
                    row.provider.name,
                    provider_version.number,
                    verification.success,
                ),
                _ => MatrixEntry::unverified(row.consumer.name, row.consumer.version.number, row.provider.name),
            })
            .collect();

        Ok(CanIDeployResult::from_summary(
            matrix.summary.deployable,
            matrix.summary.reason,
            entries,
        ))
    }
}

#[derive(Debug, Deserialize)]
struct ForVerification {
    #[serde(rename = "_embedded")]
    embedded: Embedded,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    #[serde(default)]
    pacts: Vec<PactEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PactEntry {
    #[serde(default)]
    verification_properties: VerificationProperties,
    #[serde(rename = "_links")]
    links: PactLinks,
}

#[derive(Debug, Default, Deserialize)]
struct VerificationProperties {
    #[serde(default)]
    pending: bool,
}

#[derive(Debug, Deserialize)]
struct PactLinks {
    #[serde(rename = "self")]
    self_link: Link,
}

#[derive(Debug, Deserialize)]
struct Link {
    href: String,
}

#[derive(Debug, Deserialize)]
struct MatrixResponse {
    #[serde(default)]
    summary: MatrixSummary,
    #[serde(default)]
    matrix: Vec<MatrixRow>,
}

#[derive(Debug, Default, Deserialize)]
struct MatrixSummary {
    deployable: Option<bool>,
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MatrixRow {
    consumer: ConsumerRow,
    provider: ProviderRow,
    verification_result: Option<VerificationRow>,
}

#[derive(Debug, Deserialize)]
struct ConsumerRow {
    name: String,
    version: VersionRow,
}

#[derive(Debug, Deserialize)]
struct ProviderRow {
    name: String,
    version: Option<VersionRow>,
}

#[derive(Debug, Deserialize)]
struct VersionRow {
    number: String,
}

#[derive(Debug, Deserialize)]
struct VerificationRow {
    success: bool,
}
