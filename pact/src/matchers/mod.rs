//! Matcher trees: request/response body specifications mixing literal
//! values with type-level rules.
//!
//! A [`Matcher`] is persisted in contract documents using the Pact V3
//! integration JSON form, where a rule is an object carrying a
//! `pact:matcher:type` key:
//!
//! ```json
//! { "message": { "pact:matcher:type": "type", "value": "Updated. Hello, World!" } }
//! ```
//!
//! Everything else is a literal. An object or array that must be matched
//! exactly, as a single value, is written as an `equality` rule.

mod body;
mod engine;
mod headers;

pub use body::{BODY_PATH, match_body, parse_body, render_body};
pub use engine::{MatchMode, MatchResult, Mismatch, matches, matches_with};
pub use headers::match_headers;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

const MATCHER_TYPE_KEY: &str = "pact:matcher:type";

/// One node of a body specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "Value")]
pub enum Matcher {
    /// Exact value. Scalars compare numerically for numbers; objects and
    /// arrays held here compare as a whole.
    Literal(Value),
    /// Object whose fields are themselves specifications.
    Object(BTreeMap<String, Matcher>),
    /// Array compared element-wise.
    Array(Vec<Matcher>),
    /// Any string.
    StringLike(String),
    /// Any number.
    NumberLike(Number),
    /// Any integer.
    IntegerLike(i64),
    /// Any boolean.
    BooleanLike(bool),
    /// Any value with the same shape as the example, compared by type only,
    /// cascading into objects and arrays.
    Type(Shape),
    /// A string matching `pattern` in full.
    Regex {
        /// Regular expression the whole observed string must match
        pattern: String,
        /// Value used when generating requests or responses
        example: String,
    },
    /// An array of at least `min` elements, each matching `element`.
    EachLike {
        /// Minimum number of elements
        min: usize,
        /// Specification every element must satisfy
        element: Box<Matcher>,
    },
}

/// Example of a [`Matcher::Type`] node: `null`, an object or an array.
///
/// Only [`Matcher::like`] builds one; scalar examples become the dedicated
/// rule variants instead, so every tree has exactly one encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape(Value);

impl Shape {
    /// The example value.
    #[must_use]
    pub const fn example(&self) -> &Value {
        &self.0
    }
}

impl Matcher {
    /// Build a literal tree from plain JSON. No rule objects are interpreted.
    #[must_use]
    pub fn literal(value: impl Into<Value>) -> Self {
        match value.into() {
            Value::Object(map) => Self::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Self::literal(v)))
                    .collect(),
            ),
            Value::Array(items) => Self::Array(items.into_iter().map(Self::literal).collect()),
            scalar => Self::Literal(scalar),
        }
    }

    /// Build an object node from `(field, specification)` pairs.
    #[must_use]
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Self)>,
    {
        Self::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Any string, with `example` used for generated messages.
    #[must_use]
    pub fn string_like(example: impl Into<String>) -> Self {
        Self::StringLike(example.into())
    }

    /// Any number.
    #[must_use]
    pub fn number_like(example: impl Into<Number>) -> Self {
        Self::NumberLike(example.into())
    }

    /// Any integer.
    #[must_use]
    pub const fn integer_like(example: i64) -> Self {
        Self::IntegerLike(example)
    }

    /// Any boolean.
    #[must_use]
    pub const fn boolean_like(example: bool) -> Self {
        Self::BooleanLike(example)
    }

    /// Match by type against the shape of `example`.
    ///
    /// Strings, numbers and booleans map onto the dedicated variants.
    #[must_use]
    pub fn like(example: impl Into<Value>) -> Self {
        match example.into() {
            Value::String(s) => Self::StringLike(s),
            Value::Number(n) => Self::NumberLike(n),
            Value::Bool(b) => Self::BooleanLike(b),
            other => Self::Type(Shape(other)),
        }
    }

    /// A string matching `pattern`.
    #[must_use]
    pub fn regex(pattern: impl Into<String>, example: impl Into<String>) -> Self {
        Self::Regex {
            pattern: pattern.into(),
            example: example.into(),
        }
    }

    /// An array with at least `min` elements matching `element`.
    #[must_use]
    pub fn each_like(element: Self, min: usize) -> Self {
        Self::EachLike {
            min,
            element: Box::new(element),
        }
    }

    /// Concrete value described by this specification.
    ///
    /// Literals produce themselves, rules produce their example.
    #[must_use]
    pub fn example(&self) -> Value {
        match self {
            Self::Literal(v) | Self::Type(Shape(v)) => v.clone(),
            Self::Object(fields) => Value::Object(
                fields
                    .iter()
                    .map(|(k, m)| (k.clone(), m.example()))
                    .collect(),
            ),
            Self::Array(items) => Value::Array(items.iter().map(Self::example).collect()),
            Self::StringLike(s) => Value::String(s.clone()),
            Self::Regex { example, .. } => Value::String(example.clone()),
            Self::NumberLike(n) => Value::Number(n.clone()),
            Self::IntegerLike(i) => Value::from(*i),
            Self::BooleanLike(b) => Value::Bool(*b),
            Self::EachLike { min, element } => {
                let example = element.example();
                Value::Array(vec![example; (*min).max(1)])
            }
        }
    }

    /// Number of constraints this specification places on a value.
    ///
    /// Literal leaves weigh more than rule leaves so that, of two
    /// specifications accepting the same request, the more literal one wins.
    #[must_use]
    pub fn specificity(&self) -> usize {
        match self {
            Self::Literal(_) => 2,
            Self::Object(fields) => 1 + fields.values().map(Self::specificity).sum::<usize>(),
            Self::Array(items) => 1 + items.iter().map(Self::specificity).sum::<usize>(),
            Self::EachLike { element, .. } => 1 + element.specificity(),
            Self::StringLike(_)
            | Self::NumberLike(_)
            | Self::IntegerLike(_)
            | Self::BooleanLike(_)
            | Self::Type(_)
            | Self::Regex { .. } => 1,
        }
    }

    /// Short human description used in mismatch reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Literal(v) => v.to_string(),
            Self::Object(_) => "an object".to_string(),
            Self::Array(items) => format!("an array of {} element(s)", items.len()),
            Self::StringLike(example) => format!("a string (like {example:?})"),
            Self::NumberLike(example) => format!("a number (like {example})"),
            Self::IntegerLike(example) => format!("an integer (like {example})"),
            Self::BooleanLike(_) => "a boolean".to_string(),
            Self::Type(shape) => format!("a value of type {}", json_type(shape.example())),
            Self::Regex { pattern, .. } => format!("a string matching /{pattern}/"),
            Self::EachLike { min, element } => format!(
                "an array of at least {min} element(s) each {}",
                element.describe()
            ),
        }
    }
}

impl From<Value> for Matcher {
    fn from(value: Value) -> Self {
        Self::literal(value)
    }
}

impl From<&str> for Matcher {
    fn from(value: &str) -> Self {
        Self::Literal(Value::String(value.to_string()))
    }
}

/// JSON type name of a value.
pub(crate) const fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn rule(kind: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(MATCHER_TYPE_KEY.to_string(), Value::String(kind.to_string()));
    map.insert("value".to_string(), value);
    map
}

impl From<Matcher> for Value {
    fn from(matcher: Matcher) -> Self {
        match matcher {
            Matcher::Literal(v @ (Self::Object(_) | Self::Array(_))) => Self::Object(rule("equality", v)),
            Matcher::Literal(v) => v,
            Matcher::Object(fields) => Self::Object(
                fields
                    .into_iter()
                    .map(|(k, m)| (k, Self::from(m)))
                    .collect(),
            ),
            Matcher::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            Matcher::StringLike(s) => Self::Object(rule("type", Self::String(s))),
            Matcher::Type(Shape(v)) => Self::Object(rule("type", v)),
            Matcher::NumberLike(n) => Self::Object(rule("number", Self::Number(n))),
            Matcher::IntegerLike(i) => Self::Object(rule("integer", Self::from(i))),
            Matcher::BooleanLike(b) => Self::Object(rule("boolean", Self::Bool(b))),
            Matcher::Regex { pattern, example } => {
                let mut map = rule("regex", Self::String(example));
                map.insert("regex".to_string(), Self::String(pattern));
                Self::Object(map)
            }
            Matcher::EachLike { min, element } => {
                let mut map = rule("type", Self::Array(vec![Self::from(*element)]));
                map.insert("min".to_string(), Self::from(min));
                Self::Object(map)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Matcher {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::decode(value).map_err(serde::de::Error::custom)
    }
}

impl Matcher {
    /// Read the integration JSON form back into a tree.
    fn decode(value: Value) -> Result<Self, String> {
        match value {
            Value::Object(map) if map.contains_key(MATCHER_TYPE_KEY) => decode_rule(map),
            Value::Object(map) => map
                .into_iter()
                .map(|(k, v)| Self::decode(v).map(|m| (k, m)))
                .collect::<Result<BTreeMap<_, _>, _>>()
                .map(Self::Object),
            Value::Array(items) => items
                .into_iter()
                .map(Self::decode)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Array),
            scalar => Ok(Self::Literal(scalar)),
        }
    }
}

fn decode_rule(mut map: Map<String, Value>) -> Result<Matcher, String> {
    let kind = match map.remove(MATCHER_TYPE_KEY) {
        Some(Value::String(kind)) => kind,
        other => return Err(format!("matcher type must be a string, got {other:?}")),
    };
    let value = map
        .remove("value")
        .ok_or_else(|| format!("'{kind}' matcher is missing its value"))?;

    match kind.as_str() {
        "type" => match map.remove("min") {
            Some(min) => {
                let min = min
                    .as_u64()
                    .and_then(|m| usize::try_from(m).ok())
                    .ok_or_else(|| format!("'min' must be a non-negative integer, got {min}"))?;
                let element = match value {
                    Value::Array(items) if !items.is_empty() => {
                        items.into_iter().next().map(Matcher::decode).transpose()?
                    }
                    _ => None,
                }
                .ok_or("array matcher needs a non-empty example array")?;
                Ok(Matcher::each_like(element, min))
            }
            None => Ok(Matcher::like(value)),
        },
        "number" | "decimal" => match value {
            Value::Number(n) => Ok(Matcher::NumberLike(n)),
            other => Err(format!("'{kind}' matcher needs a numeric example, got {other}")),
        },
        "integer" => value
            .as_i64()
            .map(Matcher::IntegerLike)
            .ok_or_else(|| format!("'integer' matcher needs an integer example, got {value}")),
        "boolean" => value
            .as_bool()
            .map(Matcher::BooleanLike)
            .ok_or_else(|| format!("'boolean' matcher needs a boolean example, got {value}")),
        "regex" => {
            let pattern = match map.remove("regex") {
                Some(Value::String(p)) => p,
                _ => return Err("'regex' matcher is missing its pattern".to_string()),
            };
            match value {
                Value::String(example) => Ok(Matcher::Regex { pattern, example }),
                other => Err(format!("'regex' matcher needs a string example, got {other}")),
            }
        }
        "equality" => Ok(Matcher::Literal(value)),
        other => Err(format!("unsupported matcher type '{other}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_literal_normalizes_containers() {
        let matcher = Matcher::literal(json!({"message": "hi", "tags": [1, 2]}));
        let expected = Matcher::object([
            ("message", Matcher::Literal(json!("hi"))),
            (
                "tags",
                Matcher::Array(vec![Matcher::Literal(json!(1)), Matcher::Literal(json!(2))]),
            ),
        ]);
        assert_eq!(matcher, expected);
    }

    #[test]
    fn test_like_picks_dedicated_variant() {
        assert_eq!(Matcher::like("x"), Matcher::StringLike("x".to_string()));
        assert_eq!(Matcher::like(true), Matcher::BooleanLike(true));
        assert!(matches!(Matcher::like(json!({"a": 1})), Matcher::Type(_)));
    }

    #[test]
    fn test_encodes_pact_integration_json() {
        let body = Matcher::object([("message", Matcher::string_like("Updated. Hello, World!"))]);
        let encoded = serde_json::to_value(&body).unwrap();
        assert_eq!(
            encoded,
            json!({"message": {"pact:matcher:type": "type", "value": "Updated. Hello, World!"}})
        );
    }

    #[test]
    fn test_decodes_every_rule_kind() {
        let encoded = json!({
            "name": {"pact:matcher:type": "type", "value": "alice"},
            "age": {"pact:matcher:type": "integer", "value": 30},
            "score": {"pact:matcher:type": "decimal", "value": 1.5},
            "active": {"pact:matcher:type": "boolean", "value": true},
            "id": {"pact:matcher:type": "regex", "regex": "\\d+", "value": "42"},
            "items": {"pact:matcher:type": "type", "min": 2, "value": [{"sku": "A"}]},
            "exact": {"pact:matcher:type": "equality", "value": {"k": "v"}},
        });

        let decoded: Matcher = serde_json::from_value(encoded).unwrap();
        let Matcher::Object(fields) = decoded else {
            panic!("expected object");
        };
        assert_eq!(fields["name"], Matcher::string_like("alice"));
        assert_eq!(fields["age"], Matcher::IntegerLike(30));
        assert!(matches!(fields["score"], Matcher::NumberLike(_)));
        assert_eq!(fields["active"], Matcher::BooleanLike(true));
        assert_eq!(fields["id"], Matcher::regex("\\d+", "42"));
        assert_eq!(
            fields["items"],
            Matcher::each_like(Matcher::literal(json!({"sku": "A"})), 2)
        );
        assert_eq!(fields["exact"], Matcher::Literal(json!({"k": "v"})));
    }

    #[test]
    fn test_shape_and_whole_value_literals_round_trip() {
        let body = Matcher::object([
            ("meta", Matcher::like(json!({"id": 1, "tags": ["a"]}))),
            ("nothing", Matcher::like(json!(null))),
            ("pinned", Matcher::Literal(json!({"k": [1, 2]}))),
            ("name", Matcher::like("s")),
        ]);
        let encoded = serde_json::to_value(&body).unwrap();
        assert_eq!(
            encoded["pinned"],
            json!({"pact:matcher:type": "equality", "value": {"k": [1, 2]}})
        );

        let decoded: Matcher = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, body);
    }

    #[test]
    fn test_like_never_wraps_scalars() {
        for example in [json!("s"), json!(1), json!(true)] {
            assert!(!matches!(Matcher::like(example), Matcher::Type(_)));
        }
    }

    #[test]
    fn test_rejects_malformed_rules() {
        let cases = [
            json!({"pact:matcher:type": "regex", "value": "1"}),
            json!({"pact:matcher:type": "type"}),
            json!({"pact:matcher:type": "type", "min": -1, "value": [1]}),
            json!({"pact:matcher:type": "type", "min": 1, "value": []}),
            json!({"pact:matcher:type": "semver", "value": "1.0.0"}),
        ];
        for case in cases {
            assert!(serde_json::from_value::<Matcher>(case.clone()).is_err(), "{case}");
        }
    }

    #[test]
    fn test_example_substitutes_rules() {
        let body = Matcher::object([
            ("message", Matcher::string_like("Updated. Hello, World!")),
            ("ids", Matcher::each_like(Matcher::integer_like(7), 2)),
            ("code", Matcher::regex("[A-Z]{3}", "ABC")),
        ]);
        assert_eq!(
            body.example(),
            json!({"message": "Updated. Hello, World!", "ids": [7, 7], "code": "ABC"})
        );
    }

    #[test]
    fn test_specificity_prefers_literals() {
        let literal = Matcher::literal(json!({"message": "Hello, World!"}));
        let typed = Matcher::object([("message", Matcher::string_like("Hello, World!"))]);
        assert!(literal.specificity() > typed.specificity());
    }
}
