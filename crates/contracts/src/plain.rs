//! Rendering of store-native values as ordinary JSON, for responses that hand
//! extracted values to clients rather than raw documents.

use std::str::FromStr;

use crate::{AttributeValue, encode_base64};

/// Parses a store number string into a JSON number carrying the exact digits
/// the store returned. Strings that are not valid JSON numbers stay strings.
pub fn number_to_json(raw: &str) -> serde_json::Value {
    let raw = raw.trim();
    serde_json::Number::from_str(raw)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

pub fn to_plain_json(value: &AttributeValue) -> serde_json::Value {
    match value {
        AttributeValue::S(v) => serde_json::Value::String(v.clone()),
        AttributeValue::N(v) => number_to_json(v),
        AttributeValue::B(bytes) => serde_json::Value::String(encode_base64(bytes)),
        AttributeValue::Bool(v) => serde_json::Value::Bool(*v),
        AttributeValue::Null(_) => serde_json::Value::Null,
        AttributeValue::M(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), to_plain_json(v));
            }
            serde_json::Value::Object(out)
        }
        AttributeValue::L(values) => {
            serde_json::Value::Array(values.iter().map(to_plain_json).collect::<Vec<_>>())
        }
        AttributeValue::Ss(values) => serde_json::Value::from(values.clone()),
        AttributeValue::Ns(values) => serde_json::Value::Array(
            values
                .iter()
                .map(|v| number_to_json(v))
                .collect::<Vec<_>>(),
        ),
        AttributeValue::Bs(values) => serde_json::Value::Array(
            values
                .iter()
                .map(|v| serde_json::Value::String(encode_base64(v)))
                .collect::<Vec<_>>(),
        ),
    }
}
