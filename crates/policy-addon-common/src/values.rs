//! Helm values trees and their precedence merge
//!
//! Each values source produces a [`Values`] object. Sources are merged in a
//! fixed order with [`merge_values`]; later sources override earlier ones.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::Error;

/// A Helm values tree (the top level is always a JSON object)
pub type Values = Map<String, Value>;

/// Serialize a typed values record into a [`Values`] object
pub fn to_values<T: Serialize>(record: &T) -> Result<Values, Error> {
    match serde_json::to_value(record)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::serialization(format!(
            "values must serialize to a JSON object, got {}",
            json_type(&other)
        ))),
    }
}

/// Merge `src` into `dst`
///
/// Objects are merged key by key, recursively. Any other value in `src`
/// replaces the value in `dst`, arrays included. A `null` in `src` never
/// overrides.
pub fn merge_values(dst: &mut Values, src: Values) {
    for (key, value) in src {
        if value.is_null() {
            continue;
        }
        match value {
            Value::Object(incoming) => match dst.get_mut(&key) {
                Some(Value::Object(existing)) => merge_values(existing, incoming),
                _ => {
                    dst.insert(key, Value::Object(incoming));
                }
            },
            value => {
                dst.insert(key, value);
            }
        }
    }
}

/// Insert `value` at the dotted `path` (e.g. `global.proxyConfig`), creating
/// intermediate objects and replacing non-object intermediates
pub fn set_path(values: &mut Values, path: &str, value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = values;
    while let Some(segment) = segments.next() {
        if segments.peek().is_none() {
            current.insert(segment.to_string(), value);
            return;
        }
        let entry = current
            .entry(segment.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        current = match entry {
            Value::Object(map) => map,
            _ => return,
        };
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
