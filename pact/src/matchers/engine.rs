//! Evaluation of observed JSON values against matcher trees.
//!
//! The engine never fails: every mismatch in the structure is collected and
//! returned, so a report always shows the complete picture.

use super::{Matcher, json_type};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How tolerant object and array comparison is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Extra object keys and trailing array elements are accepted.
    #[default]
    Loose,
    /// Extra object keys and trailing array elements are mismatches.
    Strict,
}

/// One violated expectation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// JSON path of the offending value, e.g. `$.body.items[0].id`
    pub path: String,
    /// What the contract required
    pub expected: String,
    /// What was found; `None` when the value was absent
    pub observed: Option<Value>,
}

impl Mismatch {
    /// Create a mismatch.
    #[must_use]
    pub fn new(path: impl Into<String>, expected: impl Into<String>, observed: Option<Value>) -> Self {
        Self {
            path: path.into(),
            expected: expected.into(),
            observed,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.observed {
            Some(observed) => write!(f, "{}: expected {}, got {observed}", self.path, self.expected),
            None => write!(f, "{}: expected {}, but it was missing", self.path, self.expected),
        }
    }
}

/// Outcome of a match: ok when no mismatch was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    mismatches: Vec<Mismatch>,
}

impl MatchResult {
    /// A successful result.
    #[must_use]
    pub const fn ok() -> Self {
        Self { mismatches: Vec::new() }
    }

    /// Whether the observed value satisfied the expectation.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Mismatches in the order they were found.
    #[must_use]
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Consume the result, returning its mismatches.
    #[must_use]
    pub fn into_mismatches(self) -> Vec<Mismatch> {
        self.mismatches
    }

    /// Append the mismatches of another result.
    pub fn extend(&mut self, other: Self) {
        self.mismatches.extend(other.mismatches);
    }

    pub(crate) fn push(&mut self, mismatch: Mismatch) {
        self.mismatches.push(mismatch);
    }
}

/// Match `observed` against `expected` loosely, rooted at `$`.
#[must_use]
pub fn matches(observed: &Value, expected: &Matcher) -> MatchResult {
    matches_with(observed, expected, MatchMode::Loose, "$")
}

/// Match `observed` against `expected` with an explicit mode and root path.
#[must_use]
pub fn matches_with(observed: &Value, expected: &Matcher, mode: MatchMode, root: &str) -> MatchResult {
    let mut walker = Walker {
        mode,
        result: MatchResult::ok(),
    };
    walker.check(root, observed, expected);
    walker.result
}

struct Walker {
    mode: MatchMode,
    result: MatchResult,
}

impl Walker {
    fn fail(&mut self, path: &str, expected: impl Into<String>, observed: Option<&Value>) {
        self.result
            .push(Mismatch::new(path, expected, observed.cloned()));
    }

    fn check(&mut self, path: &str, observed: &Value, expected: &Matcher) {
        match expected {
            Matcher::Literal(value) => {
                if !literal_eq(observed, value) {
                    self.fail(path, expected.describe(), Some(observed));
                }
            }
            Matcher::Object(fields) => {
                let Value::Object(actual) = observed else {
                    self.fail(path, expected.describe(), Some(observed));
                    return;
                };
                for (key, spec) in fields {
                    let child = field_path(path, key);
                    match actual.get(key) {
                        Some(value) => self.check(&child, value, spec),
                        None => self.fail(&child, spec.describe(), None),
                    }
                }
                if self.mode == MatchMode::Strict {
                    for (key, value) in actual {
                        if !fields.contains_key(key) {
                            self.fail(&field_path(path, key), "no such field", Some(value));
                        }
                    }
                }
            }
            Matcher::Array(items) => {
                let Value::Array(actual) = observed else {
                    self.fail(path, expected.describe(), Some(observed));
                    return;
                };
                for (index, spec) in items.iter().enumerate() {
                    let child = index_path(path, index);
                    match actual.get(index) {
                        Some(value) => self.check(&child, value, spec),
                        None => self.fail(&child, spec.describe(), None),
                    }
                }
                if self.mode == MatchMode::Strict && actual.len() > items.len() {
                    for (index, value) in actual.iter().enumerate().skip(items.len()) {
                        self.fail(&index_path(path, index), "no such element", Some(value));
                    }
                }
            }
            Matcher::StringLike(_) => {
                if !observed.is_string() {
                    self.fail(path, expected.describe(), Some(observed));
                }
            }
            Matcher::NumberLike(_) => {
                if !observed.is_number() {
                    self.fail(path, expected.describe(), Some(observed));
                }
            }
            Matcher::IntegerLike(_) => {
                if !(observed.is_i64() || observed.is_u64()) {
                    self.fail(path, expected.describe(), Some(observed));
                }
            }
            Matcher::BooleanLike(_) => {
                if !observed.is_boolean() {
                    self.fail(path, expected.describe(), Some(observed));
                }
            }
            Matcher::Type(shape) => self.check_type(path, observed, shape.example()),
            Matcher::Regex { pattern, .. } => self.check_regex(path, observed, pattern, expected),
            Matcher::EachLike { min, element } => {
                let Value::Array(actual) = observed else {
                    self.fail(path, expected.describe(), Some(observed));
                    return;
                };
                if actual.len() < *min {
                    self.fail(
                        path,
                        format!("at least {min} element(s), found {}", actual.len()),
                        Some(observed),
                    );
                }
                for (index, value) in actual.iter().enumerate() {
                    self.check(&index_path(path, index), value, element);
                }
            }
        }
    }

    fn check_type(&mut self, path: &str, observed: &Value, example: &Value) {
        match (example, observed) {
            (Value::Object(shape), Value::Object(actual)) => {
                for (key, field) in shape {
                    let child = field_path(path, key);
                    match actual.get(key) {
                        Some(value) => self.check_type(&child, value, field),
                        None => self.fail(&child, format!("a value of type {}", json_type(field)), None),
                    }
                }
                if self.mode == MatchMode::Strict {
                    for (key, value) in actual {
                        if !shape.contains_key(key) {
                            self.fail(&field_path(path, key), "no such field", Some(value));
                        }
                    }
                }
            }
            (Value::Array(shape), Value::Array(actual)) => {
                if let Some(first) = shape.first() {
                    for (index, value) in actual.iter().enumerate() {
                        self.check_type(&index_path(path, index), value, first);
                    }
                }
            }
            _ if json_type(example) == json_type(observed) => {}
            _ => self.fail(
                path,
                format!("a value of type {}", json_type(example)),
                Some(observed),
            ),
        }
    }

    fn check_regex(&mut self, path: &str, observed: &Value, pattern: &str, expected: &Matcher) {
        let Value::String(text) = observed else {
            self.fail(path, expected.describe(), Some(observed));
            return;
        };
        match Regex::new(&format!("^(?:{pattern})$")) {
            Ok(re) if re.is_match(text) => {}
            Ok(_) => self.fail(path, expected.describe(), Some(observed)),
            Err(e) => self.fail(path, format!("a valid pattern /{pattern}/ ({e})"), Some(observed)),
        }
    }
}

/// Equality for scalars where numbers compare by value (`1 == 1.0`).
fn literal_eq(observed: &Value, expected: &Value) -> bool {
    match (observed, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(x), Some(y)) => x == y,
            _ => match (a.as_u64(), b.as_u64()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_f64() == b.as_f64(),
            },
        },
        _ => observed == expected,
    }
}

fn field_path(parent: &str, key: &str) -> String {
    let plain = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if plain {
        format!("{parent}.{key}")
    } else {
        format!("{parent}['{key}']")
    }
}

fn index_path(parent: &str, index: usize) -> String {
    format!("{parent}[{index}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_matches_itself() {
        let value = json!({"message": "Hello, World!", "count": 2, "tags": ["a"]});
        assert!(matches(&value, &Matcher::literal(value.clone())).is_ok());
    }

    #[test]
    fn test_numbers_compare_numerically() {
        assert!(matches(&json!(1.0), &Matcher::literal(json!(1))).is_ok());
        assert!(!matches(&json!(1.5), &Matcher::literal(json!(1))).is_ok());
        assert!(!matches(&json!("1"), &Matcher::literal(json!(1))).is_ok());
    }

    #[test]
    fn test_string_like() {
        let spec = Matcher::string_like("example");
        assert!(matches(&json!("anything"), &spec).is_ok());

        let result = matches(&json!(42), &spec);
        assert_eq!(result.mismatches().len(), 1);
        assert_eq!(result.mismatches()[0].path, "$");
        assert_eq!(result.mismatches()[0].observed, Some(json!(42)));
    }

    #[test]
    fn test_number_integer_boolean_like() {
        assert!(matches(&json!(3.25), &Matcher::number_like(1)).is_ok());
        assert!(!matches(&json!("3"), &Matcher::number_like(1)).is_ok());
        assert!(matches(&json!(-3), &Matcher::integer_like(1)).is_ok());
        assert!(!matches(&json!(3.5), &Matcher::integer_like(1)).is_ok());
        assert!(matches(&json!(false), &Matcher::boolean_like(true)).is_ok());
        assert!(!matches(&json!(0), &Matcher::boolean_like(true)).is_ok());
    }

    #[test]
    fn test_regex_matches_whole_string() {
        let spec = Matcher::regex("\\d{3}", "123");
        assert!(matches(&json!("456"), &spec).is_ok());
        assert!(!matches(&json!("4567"), &spec).is_ok());
        assert!(!matches(&json!(456), &spec).is_ok());
    }

    #[test]
    fn test_invalid_regex_is_a_mismatch() {
        let result = matches(&json!("x"), &Matcher::regex("(", "x"));
        assert!(!result.is_ok());
        assert!(result.mismatches()[0].expected.contains("valid pattern"));
    }

    #[test]
    fn test_missing_field_reported_at_path() {
        let spec = Matcher::literal(json!({"message": "Hello, World!"}));
        let result = matches_with(&json!({}), &spec, MatchMode::Loose, "$.body");
        assert_eq!(
            result.mismatches(),
            &[Mismatch::new("$.body.message", "\"Hello, World!\"", None)]
        );
    }

    #[test]
    fn test_extra_fields_tolerated_unless_strict() {
        let spec = Matcher::literal(json!({"a": 1}));
        let observed = json!({"a": 1, "b": 2});
        assert!(matches(&observed, &spec).is_ok());

        let strict = matches_with(&observed, &spec, MatchMode::Strict, "$");
        assert_eq!(strict.mismatches().len(), 1);
        assert_eq!(strict.mismatches()[0].path, "$.b");
    }

    #[test]
    fn test_arrays_compare_up_to_expected_length() {
        let spec = Matcher::literal(json!([1, 2]));
        assert!(matches(&json!([1, 2, 3]), &spec).is_ok());
        assert!(!matches_with(&json!([1, 2, 3]), &spec, MatchMode::Strict, "$").is_ok());

        let short = matches(&json!([1]), &spec);
        assert_eq!(short.mismatches()[0].path, "$[1]");
        assert_eq!(short.mismatches()[0].observed, None);
    }

    #[test]
    fn test_each_like_checks_length_and_elements() {
        let spec = Matcher::each_like(Matcher::object([("id", Matcher::integer_like(1))]), 2);
        assert!(matches(&json!([{"id": 1}, {"id": 9}]), &spec).is_ok());

        let result = matches(&json!([{"id": "x"}]), &spec);
        let paths: Vec<_> = result.mismatches().iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["$", "$[0].id"]);
    }

    #[test]
    fn test_type_matcher_cascades() {
        let spec = Matcher::like(json!({"user": {"name": "alice", "roles": ["admin"]}}));
        assert!(matches(&json!({"user": {"name": "bob", "roles": ["a", "b"]}}), &spec).is_ok());

        let result = matches(&json!({"user": {"name": 1, "roles": [2]}}), &spec);
        let paths: Vec<_> = result.mismatches().iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["$.user.name", "$.user.roles[0]"]);
    }

    #[test]
    fn test_collects_all_mismatches() {
        let spec = Matcher::object([
            ("a", Matcher::string_like("x")),
            ("b", Matcher::literal(json!(true))),
            ("c", Matcher::number_like(1)),
        ]);
        let result = matches(&json!({"a": 1, "b": false}), &spec);
        assert_eq!(result.mismatches().len(), 3);
    }

    #[test]
    fn test_unusual_keys_are_quoted() {
        let spec = Matcher::literal(json!({"content type": "x"}));
        let result = matches(&json!({}), &spec);
        assert_eq!(result.mismatches()[0].path, "$['content type']");
    }

    #[test]
    fn test_mismatch_display() {
        let missing = Mismatch::new("$.body.message", "a string", None);
        assert_eq!(missing.to_string(), "$.body.message: expected a string, but it was missing");

        let wrong = Mismatch::new("$.status", "200", Some(json!(500)));
        assert_eq!(wrong.to_string(), "$.status: expected 200, got 500");
    }
}
