//! Header comparison: case-insensitive names, only expected headers checked.

use super::engine::{MatchResult, Mismatch};
use serde_json::Value;
use std::collections::BTreeMap;

/// Match observed headers against the expected ones.
///
/// Repeated observed headers are joined with `", "`. Values are compared after
/// trimming and normalizing the whitespace around commas. A `Content-Type`
/// expectation without parameters accepts an observed value with parameters
/// (`application/json` matches `application/json; charset=utf-8`).
#[must_use]
pub fn match_headers<'a, I>(observed: I, expected: &BTreeMap<String, String>) -> MatchResult
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut actual: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in observed {
        actual
            .entry(name.to_ascii_lowercase())
            .and_modify(|v| {
                v.push_str(", ");
                v.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    let mut result = MatchResult::ok();
    for (name, want) in expected {
        let key = name.to_ascii_lowercase();
        let path = format!("$.headers.{key}");
        match actual.get(&key) {
            None => result.push(Mismatch::new(path, format!("{want:?}"), None)),
            Some(got) if header_value_eq(&key, got, want) => {}
            Some(got) => result.push(Mismatch::new(
                path,
                format!("{want:?}"),
                Some(Value::String(got.clone())),
            )),
        }
    }
    result
}

fn normalize(value: &str) -> String {
    value
        .split(',')
        .map(str::trim)
        .collect::<Vec<_>>()
        .join(", ")
}

fn header_value_eq(name: &str, observed: &str, expected: &str) -> bool {
    let observed = normalize(observed);
    let expected = normalize(expected);
    if observed == expected {
        return true;
    }
    if name == "content-type" {
        let media_type = |v: &str| v.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
        if !expected.contains(';') {
            return media_type(&observed) == media_type(&expected);
        }
        return observed.eq_ignore_ascii_case(&expected);
    }
    false
}
