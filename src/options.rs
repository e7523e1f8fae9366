//! Tolerant option-list extraction from model responses.
//!
//! Models asked for a JSON array of options still wrap it in prose, return
//! an object-of-strings instead, or number the keys. Extraction is an
//! ordered list of strategies tried in sequence; the first one that applies
//! decides the outcome. A strategy that finds its bracket form but cannot
//! parse it fails the whole attempt rather than falling through, since the
//! brackets almost certainly were the model's answer.

use crate::error::CyoaError;
use serde_json::Value;

type Strategy = fn(&str) -> Option<Result<Value, serde_json::Error>>;

/// Tried in order; `None` means "does not apply, try the next one".
const STRATEGIES: &[Strategy] = &[bracketed_array, bracketed_object];

/// Extract the option list from a raw model response.
pub fn parse_options(content: &str) -> Result<Vec<String>, CyoaError> {
    let value = STRATEGIES
        .iter()
        .find_map(|strategy| strategy(content))
        .ok_or_else(|| CyoaError::Parse("no JSON array found in response".into()))?
        .map_err(|e| CyoaError::Parse(format!("invalid JSON in response: {e}")))?;

    let Value::Array(items) = value else {
        return Err(CyoaError::Parse("options are not a JSON array".into()));
    };
    if items.is_empty() {
        return Err(CyoaError::Parse("options array is empty".into()));
    }

    Ok(items.iter().map(normalize_option).collect())
}

/// Greedy `[...]` slice: first `[` through last `]`.
fn bracketed_array(text: &str) -> Option<Result<Value, serde_json::Error>> {
    let slice = slice_between(text, '[', ']')?;
    Some(serde_json::from_str(slice))
}

/// Greedy `{...}` slice. A parsed object contributes its values in
/// document order; a parsed array is used directly.
fn bracketed_object(text: &str) -> Option<Result<Value, serde_json::Error>> {
    let slice = slice_between(text, '{', '}')?;
    Some(serde_json::from_str(slice).map(|value| match value {
        Value::Object(map) => Value::Array(map.into_iter().map(|(_, v)| v).collect()),
        other => other,
    }))
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Flatten one option value to plain text. Objects contribute the first
/// non-empty of their `text`/`content`/`message`/`value` string fields,
/// falling back to the object's JSON text.
fn normalize_option(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => ["text", "content", "message", "value"]
            .iter()
            .find_map(|key| {
                map.get(*key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()),
        other => other.to_string(),
    }
}
