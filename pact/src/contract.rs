//! Pact contract types.

use crate::matchers::Matcher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Pact specification version written into new contract documents.
pub const PACT_SPEC_VERSION: &str = "3.0.0";

/// A Pact contract between consumer and provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Contract {
    /// Consumer participant
    pub consumer: Participant,
    /// Provider participant
    pub provider: Participant,
    /// Contract interactions
    #[serde(default)]
    pub interactions: Vec<Interaction>,
    /// Contract metadata
    #[serde(default)]
    pub metadata: ContractMetadata,
}

impl Contract {
    /// Create an empty contract for a consumer/provider pair.
    #[must_use]
    pub fn new(consumer: impl Into<String>, provider: impl Into<String>) -> Self {
        Self {
            consumer: Participant::new(consumer),
            provider: Participant::new(provider),
            interactions: Vec::new(),
            metadata: ContractMetadata::default(),
        }
    }

    /// Add an interaction.
    #[must_use]
    pub fn with_interaction(mut self, interaction: Interaction) -> Self {
        self.interactions.push(interaction);
        self
    }

    /// Unordered identity of the pair, used to decide whether two documents
    /// describe the same agreement.
    #[must_use]
    pub fn pair(&self) -> (String, String) {
        let (a, b) = (self.consumer.name.clone(), self.provider.name.clone());
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Whether both documents belong to the same pair.
    #[must_use]
    pub fn same_pair(&self, other: &Self) -> bool {
        self.pair() == other.pair()
    }

    /// File name used when persisting this contract's pair:
    /// `<first>+<second>.json`, names in [`Self::pair`] order.
    ///
    /// Distinct pairs always get distinct names, and both orientations of
    /// one pair get the same name.
    #[must_use]
    pub fn file_name(&self) -> String {
        let (first, second) = self.pair();
        format!("{}+{}.json", escape_name(&first), escape_name(&second))
    }

    /// Find an interaction by description.
    #[must_use]
    pub fn interaction(&self, description: &str) -> Option<&Interaction> {
        self.interactions
            .iter()
            .find(|i| i.description == description)
    }

    /// Merge interactions into this contract.
    ///
    /// An interaction whose [`InteractionKey`] equals an existing one replaces
    /// it in place; any other is appended.
    pub fn merge<'a, I>(&mut self, interactions: I)
    where
        I: IntoIterator<Item = &'a Interaction>,
    {
        for interaction in interactions {
            let key = interaction.key();
            match self.interactions.iter().position(|i| i.key() == key) {
                Some(index) => self.interactions[index] = interaction.clone(),
                None => self.interactions.push(interaction.clone()),
            }
        }
    }
}

/// Spaces become `_`; anything outside `[A-Za-z0-9-]` is written as `%XX`
/// per UTF-8 byte, so `+` never occurs and the mapping is injective.
fn escape_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            ' ' => out.push('_'),
            c if c.is_ascii_alphanumeric() || c == '-' => out.push(c),
            c => {
                let mut buf = [0u8; 4];
                for byte in c.encode_utf8(&mut buf).bytes() {
                    let _ = write!(out, "%{byte:02X}");
                }
            }
        }
    }
    out
}

/// A participant in a contract (consumer or provider).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    /// Participant name
    pub name: String,
}

impl Participant {
    /// Create a new participant.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// An interaction in a contract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Interaction description
    pub description: String,
    /// Provider state (precondition)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_state: Option<String>,
    /// Expected request
    pub request: Request,
    /// Expected response
    pub response: Response,
}

impl Interaction {
    /// Create an interaction without a provider state.
    #[must_use]
    pub fn new(description: impl Into<String>, request: Request, response: Response) -> Self {
        Self {
            description: description.into(),
            provider_state: None,
            request,
            response,
        }
    }

    /// Set the provider state the provider must establish first.
    #[must_use]
    pub fn given(mut self, state: impl Into<String>) -> Self {
        self.provider_state = Some(state.into());
        self
    }

    /// Deduplication key of this interaction.
    #[must_use]
    pub fn key(&self) -> InteractionKey {
        InteractionKey {
            description: self.description.clone(),
            provider_state: self.provider_state.clone(),
            request_signature: self.request.signature(),
        }
    }
}

/// Identity of an interaction inside a contract document: description,
/// provider state and request signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InteractionKey {
    /// Interaction description
    pub description: String,
    /// Provider state, if any
    pub provider_state: Option<String>,
    /// Canonical rendering of method, path, headers and body
    pub request_signature: String,
}

/// HTTP request in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Request {
    /// HTTP method
    pub method: String,
    /// Request path
    pub path: String,
    /// Request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Matcher>,
}

impl Request {
    /// Create a request without headers or body.
    #[must_use]
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into().to_ascii_uppercase(),
            path: path.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body specification.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Matcher>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body and a matching `Content-Type` header.
    #[must_use]
    pub fn with_json_body(self, body: impl Into<Matcher>) -> Self {
        self.with_header("Content-Type", "application/json")
            .with_body(body)
    }

    /// Canonical rendering used in [`InteractionKey`].
    #[must_use]
    pub fn signature(&self) -> String {
        let mut out = format!("{} {}", self.method.to_ascii_uppercase(), self.path);
        let headers: BTreeMap<String, &str> = self
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
            .collect();
        for (name, value) in headers {
            let _ = write!(out, " {name}={value}");
        }
        if let Some(body) = &self.body {
            out.push(' ');
            write_canonical(&mut out, &Value::from(body.clone()));
        }
        out
    }
}

/// HTTP response in an interaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Response {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// Response body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Matcher>,
}

impl Response {
    /// Create a response with only a status.
    #[must_use]
    pub const fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body specification.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Matcher>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Contract metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContractMetadata {
    /// Pact specification version
    #[serde(rename = "pactSpecification")]
    pub pact_specification: PactSpecification,
}

/// Pact specification version.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PactSpecification {
    /// Version string
    pub version: String,
}

impl Default for ContractMetadata {
    fn default() -> Self {
        Self {
            pact_specification: PactSpecification {
                version: PACT_SPEC_VERSION.to_string(),
            },
        }
    }
}

/// JSON with object keys sorted, independent of how `serde_json` orders maps.
fn write_canonical(out: &mut String, value: &Value) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, val)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(out, val);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(out, item);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn put_hello(message: &str) -> Interaction {
        Interaction::new(
            "a request to update with body",
            Request::new("PUT", "/hello").with_json_body(json!({ "message": message })),
            Response::new(200).with_body(Matcher::object([(
                "message",
                Matcher::string_like(format!("Updated. {message}")),
            )])),
        )
        .given("Hello API")
    }

    #[test]
    fn test_contract_serialization() {
        let contract = Contract::new("Pact feat1 consumer", "feat1 provider")
            .with_interaction(put_hello("Hello, World!"));

        let json = serde_json::to_string(&contract).unwrap();
        let restored: Contract = serde_json::from_str(&json).unwrap();
        assert_eq!(contract, restored);
    }

    #[test]
    fn test_document_layout() {
        let contract = Contract::new("consumer", "provider").with_interaction(put_hello("hi"));
        let value = serde_json::to_value(&contract).unwrap();

        assert_eq!(value["consumer"]["name"], "consumer");
        assert_eq!(value["interactions"][0]["providerState"], "Hello API");
        assert_eq!(value["interactions"][0]["request"]["method"], "PUT");
        assert_eq!(
            value["interactions"][0]["response"]["body"]["message"]["pact:matcher:type"],
            "type"
        );
        assert_eq!(value["metadata"]["pactSpecification"]["version"], PACT_SPEC_VERSION);
    }

    #[test]
    fn test_key_includes_request_signature() {
        let a = put_hello("Hello, World!");
        let b = put_hello("Goodbye");
        assert_eq!(a.description, b.description);
        assert_ne!(a.key(), b.key());
        assert_eq!(a.key(), put_hello("Hello, World!").key());
    }

    #[test]
    fn test_signature_ignores_header_name_case() {
        let a = Request::new("put", "/hello").with_header("Content-Type", "application/json");
        let b = Request::new("PUT", "/hello").with_header("content-type", " application/json");
        assert_eq!(a.signature(), b.signature());
    }

    #[test]
    fn test_merge_replaces_and_appends() {
        let mut contract = Contract::new("c", "p").with_interaction(put_hello("Hello, World!"));

        let mut changed = put_hello("Hello, World!");
        changed.response.status = 201;
        contract.merge(&[changed.clone(), put_hello("Other")]);

        assert_eq!(contract.interactions.len(), 2);
        assert_eq!(contract.interactions[0], changed);
    }

    #[test]
    fn test_pair_is_unordered() {
        let a = Contract::new("web", "api");
        let b = Contract::new("api", "web");
        assert!(a.same_pair(&b));
        assert!(!a.same_pair(&Contract::new("web", "billing")));
    }

    #[test]
    fn test_file_name_escaped() {
        let contract = Contract::new("Pact feat1 consumer", "feat1 provider");
        assert_eq!(contract.file_name(), "Pact_feat1_consumer+feat1_provider.json");
        assert_eq!(Contract::new("a.b", "c_d").file_name(), "a%2Eb+c%5Fd.json");
    }

    #[test]
    fn test_file_name_shared_by_both_orientations() {
        assert_eq!(
            Contract::new("web", "api").file_name(),
            Contract::new("api", "web").file_name()
        );
    }

    #[test]
    fn test_file_names_of_distinct_pairs_differ() {
        let pairs = [("a-b", "c"), ("a", "b-c"), ("a b", "c"), ("a_b", "c"), ("a+b", "c"), ("a", "b+c")];
        let names: std::collections::HashSet<_> = pairs
            .iter()
            .map(|(c, p)| Contract::new(*c, *p).file_name())
            .collect();
        assert_eq!(names.len(), pairs.len());
    }
}
