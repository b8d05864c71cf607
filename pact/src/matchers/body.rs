//! Raw HTTP bodies against body specifications.

use super::Matcher;
use super::engine::{MatchMode, MatchResult, Mismatch, matches_with};
use serde_json::Value;

/// Path under which body mismatches are reported.
pub const BODY_PATH: &str = "$.body";

/// Match raw body bytes against an optional specification.
///
/// No specification accepts any body. An empty body is reported missing.
/// JSON bodies are parsed; anything else is compared as a string.
#[must_use]
pub fn match_body(observed: &[u8], expected: Option<&Matcher>, mode: MatchMode) -> MatchResult {
    let Some(expected) = expected else {
        return MatchResult::ok();
    };
    match parse_body(observed) {
        None => {
            let mut result = MatchResult::ok();
            result.push(Mismatch::new(BODY_PATH, expected.describe(), None));
            result
        }
        Some(value) => matches_with(&value, expected, mode, BODY_PATH),
    }
}

/// Decode a body for matching; `None` when it is empty.
#[must_use]
pub fn parse_body(bytes: &[u8]) -> Option<Value> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    Some(
        serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned())),
    )
}

/// Wire form of a body specification: the example rendered as JSON, or the
/// raw text when the example is a plain string and the content type is not JSON.
#[must_use]
pub fn render_body(spec: &Matcher, json: bool) -> Vec<u8> {
    match spec.example() {
        Value::String(text) if !json => text.into_bytes(),
        value => value.to_string().into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_expectation_accepts_anything() {
        assert!(match_body(b"", None, MatchMode::Loose).is_ok());
        assert!(match_body(b"garbage", None, MatchMode::Loose).is_ok());
    }

    #[test]
    fn test_empty_body_is_missing() {
        let spec = Matcher::literal(json!({"message": "Hello, World!"}));
        let result = match_body(b"", Some(&spec), MatchMode::Loose);
        assert_eq!(result.mismatches().len(), 1);
        assert_eq!(result.mismatches()[0].path, "$.body");
        assert_eq!(result.mismatches()[0].observed, None);
    }

    #[test]
    fn test_json_body_paths() {
        let spec = Matcher::object([("message", Matcher::string_like("x"))]);
        let result = match_body(br#"{"message": 1}"#, Some(&spec), MatchMode::Loose);
        assert_eq!(result.mismatches()[0].path, "$.body.message");
    }

    #[test]
    fn test_text_body_compared_as_string() {
        let spec = Matcher::literal("pong");
        assert!(match_body(b"pong", Some(&spec), MatchMode::Loose).is_ok());
        assert!(!match_body(b"ping", Some(&spec), MatchMode::Loose).is_ok());
    }

    #[test]
    fn test_render_body() {
        let spec = Matcher::object([("message", Matcher::string_like("Updated. Hello, World!"))]);
        assert_eq!(
            render_body(&spec, true),
            br#"{"message":"Updated. Hello, World!"}"#.to_vec()
        );
        assert_eq!(render_body(&Matcher::literal("pong"), false), b"pong".to_vec());
        assert_eq!(render_body(&Matcher::literal("pong"), true), br#""pong""#.to_vec());
    }
}
