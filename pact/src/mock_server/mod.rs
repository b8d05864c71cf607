//! Mock provider server.
//!
//! For the lifetime of one consumer test the server accepts only requests
//! that match a registered [`Interaction`], answers with the interaction's
//! response (examples substituted for rules) and records coverage in a
//! [`RunRecord`]. `verify()` then fails unless every interaction was hit and
//! nothing went unmatched.
//!
//! ```no_run
//! # async fn run() -> contract_pact::PactResult<()> {
//! use contract_pact::{Interaction, MockServer, Request, Response};
//!
//! let server = MockServer::setup(vec![Interaction::new(
//!     "ping",
//!     Request::new("GET", "/ping"),
//!     Response::new(200),
//! )])
//! .await?;
//! reqwest::get(format!("{}/ping", server.url())).await?;
//! server.verify()?;
//! server.teardown().await;
//! # Ok(())
//! # }
//! ```

mod http;
mod recorder;

pub use recorder::{InteractionId, InteractionRecord, RunRecord, UnmatchedRequest};

use crate::config::MockServerConfig;
use crate::contract::Interaction;
use crate::error::{CandidateMismatch, PactError, PactResult};
use crate::matchers::{MatchMode, match_body, match_headers, parse_body, render_body};
use contract_common::{Counter, render_prometheus};
use parking_lot::Mutex;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Header set on the diagnostic response to an unmatched request.
pub const UNMATCHED_HEADER: &str = "x-pact-unmatched";

/// A request as seen by the matcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockRequest {
    /// HTTP method
    pub method: String,
    /// Path without query string
    pub path: String,
    /// Headers in arrival order; names may repeat
    pub headers: Vec<(String, String)>,
    /// Raw body
    pub body: Vec<u8>,
}

impl MockRequest {
    /// Create a request without headers or body.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the raw body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Set a JSON body and content type.
    #[must_use]
    pub fn with_json(self, body: &serde_json::Value) -> Self {
        self.with_header("Content-Type", "application/json")
            .with_body(body.to_string())
    }
}

/// A response produced by the mock server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockResponse {
    /// HTTP status
    pub status: u16,
    /// Headers
    pub headers: Vec<(String, String)>,
    /// Raw body
    pub body: Vec<u8>,
}

impl MockResponse {
    /// First header with this name, compared case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Body decoded as JSON, if it is JSON.
    #[must_use]
    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.body).ok()
    }
}

/// Request counters of one server.
#[derive(Debug)]
pub struct ServerMetrics {
    /// Every request received
    pub requests_total: Counter,
    /// Requests answered from an interaction
    pub requests_matched: Counter,
    /// Requests nothing matched
    pub requests_unmatched: Counter,
}

impl ServerMetrics {
    fn new() -> Self {
        Self {
            requests_total: Counter::new("mock_server_requests_total", "Requests received"),
            requests_matched: Counter::new("mock_server_requests_matched", "Requests matched to an interaction"),
            requests_unmatched: Counter::new("mock_server_requests_unmatched", "Requests matching no interaction"),
        }
    }

    /// Prometheus text rendering.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        render_prometheus([&self.requests_total, &self.requests_matched, &self.requests_unmatched])
    }
}

/// Matching and recording shared by every connection of one server.
#[derive(Debug)]
pub(crate) struct Dispatcher {
    run_id: Uuid,
    interactions: Vec<Interaction>,
    mode: MatchMode,
    record: Mutex<RunRecord>,
    metrics: ServerMetrics,
}

impl Dispatcher {
    fn new(interactions: Vec<Interaction>, mode: MatchMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            record: Mutex::new(RunRecord::new(&interactions)),
            interactions,
            mode,
            metrics: ServerMetrics::new(),
        }
    }

    /// Select the most specific accepting interaction and answer from it.
    #[instrument(level = "debug", skip(self, request), fields(run = %self.run_id, method = %request.method, path = %request.path))]
    fn handle(&self, request: &MockRequest) -> MockResponse {
        self.metrics.requests_total.inc();

        let headers = || request.headers.iter().map(|(n, v)| (n.as_str(), v.as_str()));
        let mut best: Option<(InteractionId, usize)> = None;
        let mut rejected = Vec::new();

        for (id, interaction) in self.interactions.iter().enumerate() {
            let expected = &interaction.request;
            if !expected.method.eq_ignore_ascii_case(&request.method) || expected.path != request.path {
                continue;
            }
            let mut result = match_headers(headers(), &expected.headers);
            result.extend(match_body(&request.body, expected.body.as_ref(), self.mode));
            if result.is_ok() {
                let score = expected.headers.len() * 2
                    + expected.body.as_ref().map_or(0, crate::matchers::Matcher::specificity);
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((id, score));
                }
            } else {
                rejected.push((id, result.into_mismatches()));
            }
        }

        let mut record = self.record.lock();
        if let Some((id, _)) = best {
            record.mark_hit(id);
            drop(record);
            self.metrics.requests_matched.inc();
            let interaction = &self.interactions[id];
            debug!(interaction = %interaction.description, "Request matched");
            return synthesize(interaction);
        }

        let closest: Vec<CandidateMismatch> = rejected
            .into_iter()
            .map(|(id, mismatches)| {
                record.record_mismatch(id);
                CandidateMismatch {
                    interaction: self.interactions[id].description.clone(),
                    mismatches,
                }
            })
            .collect();
        record.record_unmatched(UnmatchedRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            body: parse_body(&request.body),
            closest: closest.clone(),
        });
        drop(record);
        self.metrics.requests_unmatched.inc();
        warn!(candidates = closest.len(), "No interaction found for request");

        let body = json!({
            "error": "No interaction found",
            "method": request.method,
            "path": request.path,
            "mismatches": closest,
        });
        MockResponse {
            status: 500,
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (UNMATCHED_HEADER.to_string(), "true".to_string()),
            ],
            body: body.to_string().into_bytes(),
        }
    }
}

/// Response template with examples substituted.
fn synthesize(interaction: &Interaction) -> MockResponse {
    let template = &interaction.response;
    let mut headers: Vec<(String, String)> = template
        .headers
        .iter()
        .map(|(n, v)| (n.clone(), v.clone()))
        .collect();
    let content_type = template
        .headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-type"))
        .map(|(_, v)| v.to_ascii_lowercase());

    let body = match &template.body {
        Some(spec) => {
            if content_type.is_none() {
                headers.push(("Content-Type".to_string(), "application/json".to_string()));
            }
            let json = content_type.as_deref().is_none_or(|ct| ct.contains("json"));
            render_body(spec, json)
        }
        None => Vec::new(),
    };

    MockResponse {
        status: template.status,
        headers,
        body,
    }
}

/// A running mock provider bound to one local port.
///
/// Dropping the server aborts its accept loop and releases the socket;
/// [`MockServer::teardown`] does the same gracefully.
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    dispatcher: Arc<Dispatcher>,
    shutdown: Option<oneshot::Sender<()>>,
    join_handle: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Start a server on a free local port with default settings.
    ///
    /// # Errors
    ///
    /// Returns `Server` if the socket cannot be bound.
    pub async fn setup(interactions: Vec<Interaction>) -> PactResult<Self> {
        Self::start(interactions, &MockServerConfig::default()).await
    }

    /// Start a server with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns `Server` if the socket cannot be bound.
    pub async fn start(interactions: Vec<Interaction>, config: &MockServerConfig) -> PactResult<Self> {
        let listener = TcpListener::bind((config.host.as_str(), config.port))
            .await
            .map_err(|e| PactError::Server(format!("bind {}:{}: {e}", config.host, config.port)))?;
        let addr = listener
            .local_addr()
            .map_err(|e| PactError::Server(format!("local address: {e}")))?;

        let dispatcher = Arc::new(Dispatcher::new(interactions, config.match_mode));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let join_handle = tokio::spawn(http::serve(listener, Arc::clone(&dispatcher), shutdown_rx));

        info!(
            run = %dispatcher.run_id,
            %addr,
            interactions = dispatcher.interactions.len(),
            "Mock server started"
        );

        Ok(Self {
            addr,
            dispatcher,
            shutdown: Some(shutdown_tx),
            join_handle: Some(join_handle),
        })
    }

    /// Bound socket address.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL, e.g. `http://127.0.0.1:54321`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Registered interactions.
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.dispatcher.interactions
    }

    /// Answer a request directly, exactly as the listener would.
    #[must_use]
    pub fn handle(&self, request: &MockRequest) -> MockResponse {
        self.dispatcher.handle(request)
    }

    /// Snapshot of coverage so far.
    #[must_use]
    pub fn record(&self) -> RunRecord {
        self.dispatcher.record.lock().clone()
    }

    /// Request counters.
    #[must_use]
    pub fn metrics(&self) -> &ServerMetrics {
        &self.dispatcher.metrics
    }

    /// Check that every interaction was hit and nothing went unmatched.
    ///
    /// # Errors
    ///
    /// Returns `MockVerification` listing every problem of the run.
    pub fn verify(&self) -> PactResult<()> {
        let report = self.dispatcher.record.lock().failures();
        if report.is_empty() {
            info!(run = %self.dispatcher.run_id, "Mock server verified");
            return Ok(());
        }
        warn!(
            run = %self.dispatcher.run_id,
            unmatched = report.unmatched().count(),
            uncovered = report.uncovered().count(),
            "Mock server verification failed"
        );
        Err(PactError::MockVerification(report))
    }

    /// Stop accepting, close the socket and return the final record.
    pub async fn teardown(mut self) -> RunRecord {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(handle) = self.join_handle.take() {
            if let Err(e) = handle.await {
                debug!(error = %e, "Mock server task ended abnormally");
            }
        }
        debug!(run = %self.dispatcher.run_id, "Mock server stopped");
        self.record()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        if let Some(handle) = self.join_handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{Request, Response};
    use crate::matchers::Matcher;
    use serde_json::json;

    fn update_hello() -> Interaction {
        Interaction::new(
            "a request to update with body",
            Request::new("PUT", "/hello").with_json_body(json!({"message": "Hello, World!"})),
            Response::new(200).with_body(Matcher::object([(
                "message",
                Matcher::string_like("Updated. Hello, World!"),
            )])),
        )
        .given("Hello API")
    }

    fn dispatcher(interactions: Vec<Interaction>) -> Dispatcher {
        Dispatcher::new(interactions, MatchMode::Loose)
    }

    #[test]
    fn test_matching_request_gets_example_response() {
        let d = dispatcher(vec![update_hello()]);
        let response = d.handle(
            &MockRequest::new("put", "/hello").with_json(&json!({"message": "Hello, World!"})),
        );

        assert_eq!(response.status, 200);
        assert_eq!(response.json(), Some(json!({"message": "Updated. Hello, World!"})));
        assert_eq!(response.header("content-type"), Some("application/json"));
        assert!(d.record.lock().is_fully_covered());
        assert_eq!(d.metrics.requests_matched.get(), 1);
    }

    #[test]
    fn test_empty_body_is_unmatched() {
        let d = dispatcher(vec![update_hello()]);
        let response = d.handle(
            &MockRequest::new("PUT", "/hello").with_header("Content-Type", "application/json"),
        );

        assert_eq!(response.status, 500);
        assert_eq!(response.header(UNMATCHED_HEADER), Some("true"));
        let body = response.json().unwrap();
        assert_eq!(body["error"], "No interaction found");
        assert_eq!(body["mismatches"][0]["mismatches"][0]["path"], "$.body");

        let record = d.record.lock();
        assert_eq!(record.unmatched_requests().len(), 1);
        assert_eq!(record.interactions()[0].mismatched_requests, 1);
        assert_eq!(record.failures().failures.len(), 2);
    }

    #[test]
    fn test_most_specific_interaction_wins() {
        let generic = Interaction::new(
            "any message",
            Request::new("PUT", "/hello")
                .with_body(Matcher::object([("message", Matcher::string_like("x"))])),
            Response::new(202),
        );
        let exact = Interaction::new(
            "exact message",
            Request::new("PUT", "/hello").with_body(json!({"message": "hi"})),
            Response::new(200),
        );
        let d = dispatcher(vec![generic, exact]);

        assert_eq!(d.handle(&MockRequest::new("PUT", "/hello").with_json(&json!({"message": "hi"}))).status, 200);
        assert_eq!(d.handle(&MockRequest::new("PUT", "/hello").with_json(&json!({"message": "yo"}))).status, 202);
    }

    #[test]
    fn test_ties_go_to_first_registered() {
        let first = Interaction::new("first", Request::new("GET", "/x"), Response::new(200));
        let second = Interaction::new("second", Request::new("GET", "/x"), Response::new(201));
        let d = dispatcher(vec![first, second]);

        assert_eq!(d.handle(&MockRequest::new("GET", "/x")).status, 200);
        let record = d.record.lock();
        assert_eq!(record.interactions()[0].hits, 1);
        assert_eq!(record.interactions()[1].hits, 0);
    }

    #[test]
    fn test_declared_text_content_type() {
        let interaction = Interaction::new(
            "ping",
            Request::new("GET", "/ping"),
            Response::new(200)
                .with_header("Content-Type", "text/plain")
                .with_body("pong"),
        );
        let response = dispatcher(vec![interaction]).handle(&MockRequest::new("GET", "/ping"));
        assert_eq!(response.body, b"pong");
        assert_eq!(response.headers.len(), 1);
    }

    #[tokio::test]
    async fn test_server_lifecycle_over_http() {
        let server = MockServer::setup(vec![update_hello()]).await.unwrap();
        let url = format!("{}/hello", server.url());

        let response = reqwest::Client::new()
            .put(&url)
            .json(&json!({"message": "Hello, World!"}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, json!({"message": "Updated. Hello, World!"}));

        server.verify().unwrap();
        assert_eq!(server.metrics().requests_total.get(), 1);

        let addr = server.addr();
        let record = server.teardown().await;
        assert!(record.is_fully_covered());
        assert!(tokio::net::TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_verify_reports_uncovered() {
        let server = MockServer::setup(vec![update_hello()]).await.unwrap();
        let err = server.verify().unwrap_err();
        match err {
            PactError::MockVerification(report) => assert_eq!(report.uncovered().count(), 1),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_servers_are_isolated() {
        let a = MockServer::setup(vec![update_hello()]).await.unwrap();
        let b = MockServer::setup(vec![update_hello()]).await.unwrap();
        assert_ne!(a.addr(), b.addr());

        let response = a.handle(&MockRequest::new("PUT", "/hello").with_json(&json!({"message": "Hello, World!"})));
        assert_eq!(response.status, 200);
        assert!(a.verify().is_ok());
        assert!(b.verify().is_err());
    }
}
