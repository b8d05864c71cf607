//! Contract Verifier - Main Entry Point
//!
//! Replays consumer contracts, from local files and/or a broker, against a
//! running provider and exits non-zero if any of them fails.

use std::process::ExitCode;

use anyhow::Context;
use contract_common::{TracingConfig, build_http_client, init_tracing};
use contract_pact::{
    BrokerClient, BrokerConfig, BrokerPact, ContractStore, HttpBrokerClient, HttpStateHandler,
    ProviderVerifier, VerificationResult, VerifierConfig,
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let _ = dotenvy::dotenv();
    init_tracing(&TracingConfig::from_env().with_service_name("contract-verifier"));

    let config = VerifierConfig::from_env().context("invalid verifier configuration")?;
    info!(
        provider = %config.provider_name,
        base_url = %config.provider_base_url,
        "Starting provider verification"
    );

    let mut verifier = ProviderVerifier::new(&config.http_config())?.with_match_mode(config.match_mode);
    if let Some(url) = &config.provider_states_setup_url {
        let client = build_http_client(&config.http_config())?;
        verifier = verifier.with_state_handler(HttpStateHandler::new(client, url.clone()));
    }

    let broker = match &config.broker_url {
        Some(url) => {
            let mut broker_config = BrokerConfig::new(url.clone());
            if let Some(token) = &config.broker_token {
                broker_config = broker_config.with_token(token.clone());
            }
            Some(HttpBrokerClient::new(broker_config)?)
        }
        None => None,
    };

    let pacts = collect_pacts(&config, broker.as_ref()).await?;
    if pacts.is_empty() {
        warn!("No contracts to verify");
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with a partial report");
            let _ = cancel_tx.send(true);
        }
        std::future::pending::<()>().await;
    });

    let mut ok = true;
    for (index, pact) in pacts.iter().enumerate() {
        let mut cancelled = cancel_rx.clone();
        let report = verifier
            .verify_until(&pact.contract, &config.provider_base_url, async move {
                let _ = cancelled.wait_for(|c| *c).await;
            })
            .await;
        println!("{report}\n");

        if !report.is_success() {
            if pact.pending {
                warn!(consumer = %report.consumer, "Pending contract failed, not counted");
            } else {
                ok = false;
            }
        }
        if report.is_partial() {
            let remaining = &pacts[index + 1..];
            if !remaining.is_empty() {
                println!("{}", not_attempted(remaining));
            }
            warn!(remaining = remaining.len(), "Run interrupted");
            ok = false;
            break;
        }

        if config.publish_results {
            if let (Some(broker), Some(version)) = (&broker, &config.provider_version) {
                let mut result = report.to_result(version.clone());
                result.provider_branch.clone_from(&config.provider_branch);
                ok &= publish_result(broker, pact, &result).await;
            }
        }
    }

    if ok {
        info!(contracts = pacts.len(), "Provider verification passed");
        Ok(ExitCode::SUCCESS)
    } else {
        error!("Provider verification failed");
        Ok(ExitCode::FAILURE)
    }
}

/// Report a result to the broker. Contracts without a verification link
/// (local files) are skipped. Returns `false` only when publishing failed.
async fn publish_result<B>(broker: &B, pact: &BrokerPact, result: &VerificationResult) -> bool
where
    B: BrokerClient + ?Sized,
{
    if pact.verification_url.is_none() {
        debug!(
            consumer = %result.consumer,
            source = pact.source_url.as_deref().unwrap_or_default(),
            "No verification link, result not published"
        );
        return true;
    }
    match broker.publish_verification(pact, result).await {
        Ok(()) => true,
        Err(e) => {
            error!(error = %e, consumer = %result.consumer, "Failed to publish verification result");
            false
        }
    }
}

/// Summary of the contracts an interrupted run never reached.
fn not_attempted(pacts: &[BrokerPact]) -> String {
    let mut out = format!("Not attempted ({}):", pacts.len());
    for pact in pacts {
        out.push_str("\n  - ");
        out.push_str(&pact.contract.consumer.name);
        if let Some(source) = &pact.source_url {
            out.push_str(" (");
            out.push_str(source);
            out.push(')');
        }
    }
    out
}

/// Local files first, then the broker; contracts for other providers are skipped.
async fn collect_pacts(
    config: &VerifierConfig,
    broker: Option<&HttpBrokerClient>,
) -> anyhow::Result<Vec<BrokerPact>> {
    let mut pacts = Vec::new();
    for path in &config.pact_files {
        let contract = ContractStore::load(path)
            .with_context(|| format!("loading {}", path.display()))?;
        pacts.push(BrokerPact {
            contract,
            source_url: Some(path.display().to_string()),
            verification_url: None,
            pending: false,
        });
    }
    if let Some(broker) = broker {
        pacts.extend(
            broker
                .fetch(&config.provider_name, &config.consumer_version_selectors)
                .await
                .context("fetching contracts from broker")?,
        );
    }

    pacts.retain(|pact| {
        let matches = pact.contract.provider.name == config.provider_name;
        if !matches {
            warn!(
                provider = %pact.contract.provider.name,
                source = pact.source_url.as_deref().unwrap_or_default(),
                "Skipping contract for another provider"
            );
        }
        matches
    });
    Ok(pacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use contract_pact::{
        CanIDeployResult, ConsumerVersionSelector, Contract, ContractVersion, PactError, PactResult,
    };
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CountingBroker {
        published: Mutex<usize>,
        failing: bool,
    }

    #[async_trait]
    impl BrokerClient for CountingBroker {
        async fn publish(&self, _: &Contract, _: &ContractVersion) -> PactResult<()> {
            Ok(())
        }

        async fn fetch(&self, _: &str, _: &[ConsumerVersionSelector]) -> PactResult<Vec<BrokerPact>> {
            Ok(Vec::new())
        }

        async fn publish_verification(&self, _: &BrokerPact, _: &VerificationResult) -> PactResult<()> {
            if self.failing {
                return Err(PactError::broker("down"));
            }
            *self.published.lock() += 1;
            Ok(())
        }

        async fn can_i_deploy(&self, _: &str, _: &str) -> PactResult<CanIDeployResult> {
            Ok(CanIDeployResult::from_matrix(Vec::new()))
        }
    }

    fn pact(consumer: &str, verification_url: Option<&str>) -> BrokerPact {
        BrokerPact {
            contract: Contract::new(consumer, "api"),
            source_url: Some(format!("pacts/{consumer}.json")),
            verification_url: verification_url.map(str::to_string),
            pending: false,
        }
    }

    fn result() -> VerificationResult {
        VerificationResult {
            success: true,
            provider: "api".to_string(),
            consumer: "web".to_string(),
            provider_version: "1.0.0".to_string(),
            provider_branch: None,
            verified_at: chrono::Utc::now(),
            test_results: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_local_contract_not_published() {
        let broker = CountingBroker::default();
        assert!(publish_result(&broker, &pact("web", None), &result()).await);
        assert_eq!(*broker.published.lock(), 0);
    }

    #[tokio::test]
    async fn test_broker_contract_published() {
        let broker = CountingBroker::default();
        let linked = pact("web", Some("http://broker/verifications"));
        assert!(publish_result(&broker, &linked, &result()).await);
        assert_eq!(*broker.published.lock(), 1);
    }

    #[tokio::test]
    async fn test_publish_failure_fails_run() {
        let broker = CountingBroker { failing: true, ..CountingBroker::default() };
        let linked = pact("web", Some("http://broker/verifications"));
        assert!(!publish_result(&broker, &linked, &result()).await);
    }

    #[test]
    fn test_not_attempted_lists_remaining() {
        let summary = not_attempted(&[pact("web", None), pact("cli", None)]);
        assert_eq!(
            summary,
            "Not attempted (2):\n  - web (pacts/web.json)\n  - cli (pacts/cli.json)"
        );
    }
}
