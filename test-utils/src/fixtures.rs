//! Test fixtures with sample data.
//!
//! The hello interactions mirror the contract the sample consumer and
//! provider agree on: `PUT /hello` with a message, answered with an updated
//! message, and a `400` for an empty body.

use chrono::{DateTime, Utc};
use contract_pact::{
    Contract, ContractVersion, Interaction, Matcher, Request, Response, VerificationResult,
};
use serde_json::json;

/// Consumer of the V2 hello suite.
pub const CONSUMER: &str = "Pact feat1 consumer";
/// Consumer of the V3 hello suite.
pub const CONSUMER_V3: &str = "PactV3 feat1 consumer";
/// Consumer of the V4 hello suite.
pub const CONSUMER_V4: &str = "PactV4 feat1 consumer";
/// Provider of every hello suite.
pub const PROVIDER: &str = "feat1 provider";
/// Provider state every hello interaction requires.
pub const HELLO_STATE: &str = "Hello API";
/// Message sent by the consumer.
pub const HELLO_MESSAGE: &str = "Hello, World!";

/// `PUT /hello {"message": "Hello, World!"}` answered with
/// `200 {"message": string-like("Updated. Hello, World!")}`.
#[must_use]
pub fn update_hello() -> Interaction {
    update_hello_with(HELLO_MESSAGE)
}

/// Same as [`update_hello`] with a different message.
#[must_use]
pub fn update_hello_with(message: &str) -> Interaction {
    Interaction::new(
        "a request to update with body",
        Request::new("PUT", "/hello").with_json_body(json!({ "message": message })),
        Response::new(200).with_body(Matcher::object([(
            "message",
            Matcher::string_like(format!("Updated. {message}")),
        )])),
    )
    .given(HELLO_STATE)
}

/// `PUT /hello` without a body answered with `400`.
#[must_use]
pub fn update_hello_without_body() -> Interaction {
    Interaction::new(
        "a request to update without body",
        Request::new("PUT", "/hello"),
        Response::new(400).with_body(Matcher::object([(
            "message",
            Matcher::string_like("message should not be empty"),
        )])),
    )
    .given(HELLO_STATE)
}

/// The full hello contract for `consumer`.
#[must_use]
pub fn hello_contract(consumer: &str) -> Contract {
    Contract::new(consumer, PROVIDER)
        .with_interaction(update_hello())
        .with_interaction(update_hello_without_body())
}

/// Version `1.0.0` on `main`, tagged with its branch.
#[must_use]
pub fn sample_version() -> ContractVersion {
    ContractVersion::new("1.0.0")
        .with_branch("main")
        .with_tag("main")
}

/// A passing verification result for the hello contract.
#[must_use]
pub fn sample_verification_result(verified_at: DateTime<Utc>) -> VerificationResult {
    VerificationResult {
        success: true,
        provider: PROVIDER.to_string(),
        consumer: CONSUMER.to_string(),
        provider_version: "1.0.0".to_string(),
        provider_branch: Some("main".to_string()),
        verified_at,
        test_results: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_contract_shape() {
        let contract = hello_contract(CONSUMER);
        assert_eq!(contract.interactions.len(), 2);
        assert!(contract.interactions.iter().all(|i| i.provider_state.as_deref() == Some(HELLO_STATE)));
        assert_ne!(contract.interactions[0].key(), contract.interactions[1].key());
    }

    #[test]
    fn test_messages_distinguish_interactions() {
        assert_ne!(update_hello().key(), update_hello_with("Bonjour").key());
    }
}
