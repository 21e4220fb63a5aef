use crate::error::ConnectorError;
use rmcp::model::{CallToolResult, Content};
use serde::Serialize;
use serde_json::{Map as JsonMap, Value as JsonValue};

/// List-valued keys that mean "this call returned items".
const RESULT_LIST_KEYS: &[&str] = &["results", "files", "metadata", "values"];

const QUERY_FIELD_KEYS: &[&str] = &["query", "range", "folder_id"];

fn build_no_results_message(key: &str, query_hint: Option<String>) -> String {
    let label = match key {
        "results" => "results".to_string(),
        "values" => "cell values".to_string(),
        other => other.replace('_', " "),
    };

    match query_hint {
        Some(query) => format!("No {} found for \"{}\".", label, query),
        None => format!("No {} found for the requested input.", label),
    }
}

fn maybe_attach_no_results_message(map: &mut JsonMap<String, JsonValue>) -> Option<String> {
    let mut empty_key: Option<&str> = None;
    for key in RESULT_LIST_KEYS {
        match map.get(*key) {
            Some(JsonValue::Array(items)) if !items.is_empty() => return None,
            Some(JsonValue::Array(_)) if empty_key.is_none() => empty_key = Some(key),
            _ => {}
        }
    }
    let key = empty_key?;

    let query_hint = map
        .iter()
        .find_map(|(k, v)| {
            if QUERY_FIELD_KEYS.iter().any(|candidate| candidate == k) {
                v.as_str().map(|s| s.trim().to_string())
            } else {
                None
            }
        })
        .filter(|s| !s.is_empty());

    let message = build_no_results_message(key, query_hint);
    map.entry("message".to_string())
        .or_insert(JsonValue::String(message.clone()));
    map.entry("no_results".to_string())
        .or_insert(JsonValue::Bool(true));
    Some(message)
}

fn into_object(value: JsonValue) -> JsonMap<String, JsonValue> {
    match value {
        JsonValue::Object(m) => m,
        other => {
            let mut m = JsonMap::new();
            m.insert("data".to_string(), other);
            m
        }
    }
}

/// Build a CallToolResult carrying the structured JSON plus a text rendering
/// for clients that only read `content`.
pub fn structured_result_with_text<T: Serialize>(
    data: &T,
    text_fallback: Option<String>,
) -> Result<CallToolResult, ConnectorError> {
    let value = serde_json::to_value(data).map_err(|e| ConnectorError::Other(e.to_string()))?;
    let mut map = into_object(value);

    maybe_attach_no_results_message(&mut map);

    let structured = JsonValue::Object(map);
    let text = match text_fallback {
        Some(text) => text,
        None => serde_json::to_string_pretty(&structured)?,
    };

    Ok(CallToolResult {
        content: vec![Content::text(text)],
        structured_content: Some(structured),
        is_error: Some(false),
        meta: None,
    })
}

/// Tool-level failure: the host sees `is_error` and a structured error body
/// instead of a protocol fault.
pub fn structured_error_result(body: JsonValue) -> CallToolResult {
    let map = into_object(body);
    let text = map
        .get("error")
        .and_then(|e| e.as_str())
        .unwrap_or("tool call failed")
        .to_string();

    CallToolResult {
        content: vec![Content::text(text)],
        structured_content: Some(JsonValue::Object(map)),
        is_error: Some(true),
        meta: None,
    }
}

/// Human readable byte count, base 1024 with two decimals ("1.50 KB").
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if value < 1024.0 {
            return format!("{:.2} {}", value, unit);
        }
        value /= 1024.0;
    }
    format!("{:.2} PB", value)
}

/// Round a currency amount to cents.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
