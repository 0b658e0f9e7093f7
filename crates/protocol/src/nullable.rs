//! Normalization of loosely-typed upstream JSON.
//!
//! The analysis agent writes whatever JSON it likes: numbers, booleans, `null`, or the
//! literal strings `"null"` / `"undefined"`. Fields routed through [`deserialize`] come out
//! as `Option<String>` with every "nothing here" spelling collapsed to `None`, so nothing
//! downstream ever compares against the sentinel again.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

const ABSENT_SENTINELS: &[&str] = &["null", "undefined"];

pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(normalize_value))
}

pub fn normalize_value(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => normalize_str(&text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        other => Some(other.to_string()),
    }
}

pub fn normalize_str(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() || ABSENT_SENTINELS.contains(&trimmed) {
        return None;
    }
    Some(trimmed.to_string())
}
