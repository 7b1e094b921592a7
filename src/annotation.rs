// =====================================================
// DOCBLOCK ANNOTATION PARSING
// =====================================================

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnnotationError {
    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),
}

/// One parsed annotation value.
///
/// `Flag` marks a bare `@key` with no trailing value. It is distinct from
/// both a missing key and an empty string value.
#[derive(Debug, Clone, PartialEq)]
pub enum AnnotationValue {
    Flag,
    Text(String),
    Json(Value),
}

impl AnnotationValue {
    fn from_raw(raw: &str) -> Self {
        if raw.is_empty() {
            return AnnotationValue::Flag;
        }
        match serde_json::from_str::<Value>(raw) {
            Ok(decoded) => AnnotationValue::Json(decoded),
            Err(_) => AnnotationValue::Text(raw.to_string()),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            AnnotationValue::Text(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            AnnotationValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_flag(&self) -> bool {
        matches!(self, AnnotationValue::Flag)
    }
}

#[derive(Debug, Clone)]
struct RawAnnotation {
    key: String,
    raw: String,
    value: AnnotationValue,
}

/// Annotations scanned out of one docblock.
///
/// Duplicate keys collapse to the LAST occurrence.
#[derive(Debug, Clone, Default)]
pub struct AnnotationSet {
    matches: Vec<RawAnnotation>,
}

impl AnnotationSet {
    /// Collapsed mapping, first-seen key order, last value per key.
    pub fn values(&self) -> Vec<(String, AnnotationValue)> {
        let mut collapsed: Vec<(String, AnnotationValue)> = Vec::new();
        for entry in &self.matches {
            match collapsed.iter_mut().find(|(key, _)| *key == entry.key) {
                Some((_, value)) => *value = entry.value.clone(),
                None => collapsed.push((entry.key.clone(), entry.value.clone())),
            }
        }
        collapsed
    }

    /// Last occurrence of `key`, or `None` when absent.
    pub fn get_parameter(&self, key: &str) -> Option<AnnotationValue> {
        self.matches
            .iter()
            .rev()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
            .map(|entry| entry.value.clone())
    }

    /// Raw text of the FIRST occurrence of `key`. A bare flag yields an
    /// empty string; an absent key yields `None`.
    pub fn get_first_parameter(&self, key: &str) -> Option<String> {
        self.matches
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
            .map(|entry| entry.raw.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.matches
            .iter()
            .any(|entry| entry.key.eq_ignore_ascii_case(key))
    }

    pub fn keys(&self) -> Vec<String> {
        self.values().into_iter().map(|(key, _)| key).collect()
    }

    pub fn len(&self) -> usize {
        self.values().len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

fn annotation_pattern() -> Regex {
    // A value runs until the next @key or a line break.
    Regex::new(r"@([A-Za-z_][A-Za-z0-9_\-]*)([^@\r\n]*)").unwrap()
}

/// Scan a docblock for `@key value` annotations.
///
/// Values are trimmed and JSON-decoded when possible; a failed decode keeps
/// the raw trimmed string. A bare `@key` becomes [`AnnotationValue::Flag`].
pub fn parse(doc_text: &str) -> AnnotationSet {
    let mut matches = Vec::new();
    for capture in annotation_pattern().captures_iter(doc_text) {
        let key = capture[1].to_string();
        let raw = capture[2]
            .trim()
            .trim_end_matches("*/")
            .trim_end_matches('*')
            .trim()
            .to_string();
        let value = AnnotationValue::from_raw(&raw);
        matches.push(RawAnnotation { key, raw, value });
    }
    AnnotationSet { matches }
}

fn quoted_pair_pattern() -> Regex {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_\-]*)\s*=\s*"([^"]*)""#).unwrap()
}

fn unquoted_pair_pattern() -> Regex {
    Regex::new(r#"([A-Za-z_][A-Za-z0-9_\-]*)\s*=\s*([^\s"()=]+)"#).unwrap()
}

fn bare_token_pattern() -> Regex {
    Regex::new(r"[A-Za-z0-9_.\-]+").unwrap()
}

/// Parse the query-string-like body of one annotation, e.g.
/// `(name="foo" flag)`, into attribute pairs.
///
/// Quoted values, unquoted `key=value` pairs and bare flags (value `true`)
/// are recognized in three sequential passes. Numeric bare tokens are
/// key-prefixed with `_` so they cannot collide with list indices.
pub fn parse_key_value(body: &str) -> Result<Map<String, Value>, AnnotationError> {
    let trimmed = body
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .trim();

    if trimmed.matches('"').count() % 2 != 0 {
        return Err(AnnotationError::InvalidAnnotation(format!(
            "Unbalanced quoting in annotation body: {}",
            body.trim()
        )));
    }

    let mut pairs = Map::new();
    let mut remainder = trimmed.to_string();

    // Pass 1: key="value"
    let quoted = quoted_pair_pattern();
    for capture in quoted.captures_iter(&remainder) {
        pairs.insert(capture[1].to_string(), Value::String(capture[2].to_string()));
    }
    remainder = quoted.replace_all(&remainder, " ").into_owned();

    // Pass 2: key=value
    let unquoted = unquoted_pair_pattern();
    for capture in unquoted.captures_iter(&remainder) {
        pairs
            .entry(capture[1].to_string())
            .or_insert_with(|| Value::String(capture[2].to_string()));
    }
    remainder = unquoted.replace_all(&remainder, " ").into_owned();

    // Pass 3: bare flags
    for token in bare_token_pattern().find_iter(&remainder) {
        let token = token.as_str();
        let key = if token.chars().all(|c| c.is_ascii_digit()) {
            format!("_{}", token)
        } else {
            token.to_string()
        };
        pairs.entry(key).or_insert(Value::Bool(true));
    }

    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_value_round_trips_unchanged() {
        let set = parse("/**\n * @role producer\n */");
        assert_eq!(
            set.get_parameter("role"),
            Some(AnnotationValue::Text("producer".to_string()))
        );
    }

    #[test]
    fn json_value_is_decoded() {
        let set = parse("/** @cfg {\"a\":1} */");
        let value = set.get_parameter("cfg").unwrap();
        assert_eq!(value.as_json(), Some(&serde_json::json!({"a": 1})));
    }

    #[test]
    fn malformed_json_degrades_to_text() {
        let set = parse("/** @cfg {\"a\": */");
        assert!(set.get_parameter("cfg").unwrap().as_text().is_some());
    }

    #[test]
    fn duplicate_annotation_last_wins() {
        let set = parse("/**\n * @role admin\n * @role producer\n */");
        assert_eq!(
            set.get_parameter("role"),
            Some(AnnotationValue::Text("producer".to_string()))
        );
        // Collapsed view keeps one entry per key.
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn bare_key_is_a_flag() {
        let set = parse("/**\n * @JSON\n * @Table(name=\"song\")\n */");
        assert!(set.get_parameter("JSON").unwrap().is_flag());
        assert!(!set.get_parameter("Table").unwrap().is_flag());
    }

    #[test]
    fn first_parameter_returns_first_occurrence() {
        let set = parse("/**\n * @role admin\n * @role producer\n */");
        assert_eq!(set.get_first_parameter("role"), Some("admin".to_string()));
    }

    #[test]
    fn missing_key_is_none() {
        let set = parse("/** @Table(name=\"song\") */");
        assert_eq!(set.get_parameter("Column"), None);
        assert_eq!(set.get_first_parameter("Column"), None);
    }

    #[test]
    fn key_value_body_with_quoted_and_flags() {
        let pairs = parse_key_value("(name=\"user_song\" required)").unwrap();
        assert_eq!(pairs.get("name"), Some(&Value::String("user_song".to_string())));
        assert_eq!(pairs.get("required"), Some(&Value::Bool(true)));
    }

    #[test]
    fn key_value_body_with_unquoted_pair() {
        let pairs = parse_key_value("(length=255 nullable)").unwrap();
        assert_eq!(pairs.get("length"), Some(&Value::String("255".to_string())));
        assert_eq!(pairs.get("nullable"), Some(&Value::Bool(true)));
    }

    #[test]
    fn numeric_bare_token_is_underscore_prefixed() {
        let pairs = parse_key_value("(42)").unwrap();
        assert_eq!(pairs.get("_42"), Some(&Value::Bool(true)));
    }

    #[test]
    fn unbalanced_quote_is_invalid() {
        let result = parse_key_value("(name=\"song)");
        assert!(matches!(result, Err(AnnotationError::InvalidAnnotation(_))));
    }

    #[test]
    fn quoted_value_keeps_spaces() {
        let pairs = parse_key_value("(label=\"My Song Title\")").unwrap();
        assert_eq!(
            pairs.get("label"),
            Some(&Value::String("My Song Title".to_string()))
        );
    }
}
