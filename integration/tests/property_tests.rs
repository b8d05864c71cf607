//! Property-based tests over generated contracts.
//!
//! Tests validate:
//! - Property 1: Literal Self-Match
//! - Property 1b: Example Self-Match
//! - Property 3: Contract Save/Load Round-Trip
//! - Property 4: Idempotent Merge

use contract_pact::matchers::matches_with;
use contract_pact::{ContractStore, MatchMode, Matcher, matches};
use contract_test_utils::{contract_strategy, json_value_strategy, matcher_strategy};
use proptest::prelude::*;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// **Property 1: Literal Self-Match**
    /// *For any* JSON value x, matching x against literal(x) SHALL succeed.
    #[test]
    fn prop_literal_self_match(value in json_value_strategy()) {
        let result = matches(&value, &Matcher::literal(value.clone()));
        prop_assert!(result.is_ok(), "{:?}", result.mismatches());
    }

    /// **Property 1b: Example Self-Match**
    /// *For any* specification, its own example SHALL satisfy it, strictly.
    #[test]
    fn prop_example_satisfies_spec(spec in matcher_strategy()) {
        let result = matches_with(&spec.example(), &spec, MatchMode::Strict, "$");
        prop_assert!(result.is_ok(), "{:?}", result.mismatches());
    }

    /// **Property 3: Contract Save/Load Round-Trip**
    /// *For any* contract, load(save(contract)) SHALL equal the contract, and
    /// saving it again SHALL produce identical bytes.
    #[test]
    fn prop_save_load_roundtrip(contract in contract_strategy()) {
        let dir = tempfile::tempdir().unwrap();
        let path = ContractStore::new(dir.path()).path_for(&contract);

        ContractStore::save(&contract, &path).unwrap();
        let first = std::fs::read(&path).unwrap();
        let loaded = ContractStore::load(&path).unwrap();
        prop_assert_eq!(&loaded, &contract);

        ContractStore::save(&loaded, &path).unwrap();
        prop_assert_eq!(std::fs::read(&path).unwrap(), first);
    }

    /// **Property 4: Idempotent Merge**
    /// *For any* contract, merging its own interactions SHALL leave it unchanged.
    #[test]
    fn prop_idempotent_merge(contract in contract_strategy()) {
        let merged = ContractStore::merge(contract.clone(), &contract).unwrap();
        prop_assert_eq!(merged, contract);
    }
}
