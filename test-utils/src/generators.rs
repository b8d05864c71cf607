//! Shared proptest generators for contract testing types.

use contract_pact::{Contract, Interaction, Matcher, Request, Response};
use proptest::prelude::*;
use serde_json::{Value, json};

/// Generate participant names, including the ones the hello suites use.
pub fn participant_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("Pact feat1 consumer".to_string()),
        Just("PactV3 feat1 consumer".to_string()),
        Just("PactV4 feat1 consumer".to_string()),
        Just("feat1 provider".to_string()),
        "[a-z][a-z0-9-]{2,15}",
    ]
}

/// Generate HTTP methods.
pub fn http_method_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("GET".to_string()),
        Just("POST".to_string()),
        Just("PUT".to_string()),
        Just("DELETE".to_string()),
        Just("PATCH".to_string()),
    ]
}

/// Generate request paths.
pub fn path_strategy() -> impl Strategy<Value = String> {
    "/[a-z][a-z0-9/-]{2,30}"
}

/// Generate HTTP status codes.
pub fn http_status_code_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![
        Just(200u16),
        Just(201),
        Just(204),
        Just(400),
        Just(404),
        Just(409),
        Just(500),
    ]
}

/// Generate arbitrary JSON values without floats.
pub fn json_value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ,.!]{0,20}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,8}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Generate examples for structural `like` rules: null, flat objects, and
/// arrays whose elements share one type.
pub fn shape_strategy() -> impl Strategy<Value = Value> {
    let scalar = prop_oneof![
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    prop_oneof![
        Just(Value::Null),
        prop::collection::btree_map("[a-z]{1,6}", scalar, 0..4)
            .prop_map(|m| Value::Object(m.into_iter().collect())),
        prop::collection::vec(any::<i32>().prop_map(Value::from), 1..4).prop_map(Value::Array),
    ]
}

/// Generate body specifications mixing literals and rules.
pub fn matcher_strategy() -> impl Strategy<Value = Matcher> {
    let leaf = prop_oneof![
        "[a-zA-Z ]{0,12}".prop_map(Matcher::literal),
        shape_strategy().prop_map(Matcher::like),
        "[a-zA-Z ]{0,12}".prop_map(Matcher::string_like),
        any::<i32>().prop_map(Matcher::number_like),
        any::<i32>().prop_map(|i| Matcher::integer_like(i64::from(i))),
        any::<bool>().prop_map(Matcher::boolean_like),
        "[a-z]{1,8}".prop_map(|s| Matcher::regex("[a-z]+", s)),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::btree_map("[a-z]{1,6}", inner.clone(), 1..4).prop_map(Matcher::object),
            (inner, 0usize..3).prop_map(|(element, min)| Matcher::each_like(element, min)),
        ]
    })
}

/// Generate object body specifications, the shape JSON APIs exchange.
pub fn object_matcher_strategy() -> impl Strategy<Value = Matcher> {
    prop::collection::btree_map("[a-z]{1,6}", matcher_strategy(), 1..5).prop_map(Matcher::object)
}

/// Generate interactions with optional provider state and bodies.
pub fn interaction_strategy() -> impl Strategy<Value = Interaction> {
    (
        "[a-z ]{5,30}",
        prop::option::of("[A-Z][a-z ]{3,20}"),
        http_method_strategy(),
        path_strategy(),
        prop::option::of(object_matcher_strategy()),
        http_status_code_strategy(),
        prop::option::of(object_matcher_strategy()),
    )
        .prop_map(|(description, state, method, path, req_body, status, resp_body)| {
            let mut request = Request::new(method, path);
            if let Some(body) = req_body {
                request = request.with_json_body(body);
            }
            let mut response = Response::new(status);
            if let Some(body) = resp_body {
                response = response.with_body(body);
            }
            let interaction = Interaction::new(description, request, response);
            match state {
                Some(state) => interaction.given(state),
                None => interaction,
            }
        })
}

/// Generate contracts with deduplicated interactions.
pub fn contract_strategy() -> impl Strategy<Value = Contract> {
    (
        participant_strategy(),
        participant_strategy(),
        prop::collection::vec(interaction_strategy(), 0..6),
    )
        .prop_map(|(consumer, provider, interactions)| {
            let mut contract = Contract::new(consumer, provider);
            contract.merge(&interactions);
            contract
        })
}

/// Generate a value of the wrong JSON type for `spec`'s example.
pub fn wrong_type_for(spec: &Matcher) -> Value {
    match spec.example() {
        Value::String(_) => json!(0),
        _ => json!("wrong type"),
    }
}
