//! Firestore REST typed-value encoding.
//!
//! Every value travels as a single-key object naming its type, e.g.
//! `{"stringValue": "a"}` or `{"mapValue": {"fields": {...}}}`.
//! Integers are sent as decimal strings.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Number, Value};

use crate::repository::{FieldValue, Fields, StoreError};

pub fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Boolean(b) => json!({ "booleanValue": b }),
        FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
        FieldValue::Double(d) => match Number::from_f64(*d) {
            Some(n) => json!({ "doubleValue": n }),
            None if d.is_nan() => json!({ "doubleValue": "NaN" }),
            None if *d > 0.0 => json!({ "doubleValue": "Infinity" }),
            None => json!({ "doubleValue": "-Infinity" }),
        },
        FieldValue::String(s) => json!({ "stringValue": s }),
        FieldValue::Timestamp(ts) => {
            json!({ "timestampValue": ts.to_rfc3339_opts(SecondsFormat::AutoSi, true) })
        }
        FieldValue::Array(values) => json!({
            "arrayValue": { "values": values.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
    }
}

pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect::<Map<_, _>>(),
    )
}

/// Decode the `fields` object of a document or map value. A missing
/// `fields` key means an empty map.
pub fn decode_fields(fields: Option<&Value>) -> Result<Fields, StoreError> {
    match fields {
        None | Some(Value::Null) => Ok(Fields::new()),
        Some(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| decode_value(v).map(|fv| (k.clone(), fv)))
            .collect(),
        Some(other) => Err(StoreError::Decode(format!(
            "expected fields object, got {}",
            other
        ))),
    }
}

pub fn decode_value(value: &Value) -> Result<FieldValue, StoreError> {
    let obj = value
        .as_object()
        .ok_or_else(|| StoreError::Decode(format!("expected typed value, got {}", value)))?;

    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| StoreError::Decode("empty typed value".to_string()))?;

    match kind.as_str() {
        "nullValue" => Ok(FieldValue::Null),
        "booleanValue" => inner
            .as_bool()
            .map(FieldValue::Boolean)
            .ok_or_else(|| bad(kind, inner)),
        "integerValue" => decode_integer(inner).ok_or_else(|| bad(kind, inner)),
        "doubleValue" => decode_double(inner).ok_or_else(|| bad(kind, inner)),
        "timestampValue" => inner
            .as_str()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|ts| FieldValue::Timestamp(ts.with_timezone(&Utc)))
            .ok_or_else(|| bad(kind, inner)),
        "stringValue" | "bytesValue" | "referenceValue" => inner
            .as_str()
            .map(|s| FieldValue::String(s.to_string()))
            .ok_or_else(|| bad(kind, inner)),
        "geoPointValue" => {
            let mut point = Fields::new();
            for axis in ["latitude", "longitude"] {
                let coord = inner.get(axis).and_then(Value::as_f64).unwrap_or(0.0);
                point.insert(axis.to_string(), FieldValue::Double(coord));
            }
            Ok(FieldValue::Map(point))
        }
        "arrayValue" => match inner.get("values") {
            None | Some(Value::Null) => Ok(FieldValue::Array(Vec::new())),
            Some(Value::Array(values)) => values
                .iter()
                .map(decode_value)
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::Array),
            Some(_) => Err(bad(kind, inner)),
        },
        "mapValue" => decode_fields(inner.get("fields")).map(FieldValue::Map),
        other => Err(StoreError::Decode(format!("unknown value type {}", other))),
    }
}

fn decode_integer(inner: &Value) -> Option<FieldValue> {
    match inner {
        Value::String(s) => s.parse().ok().map(FieldValue::Integer),
        Value::Number(n) => n.as_i64().map(FieldValue::Integer),
        _ => None,
    }
}

fn decode_double(inner: &Value) -> Option<FieldValue> {
    match inner {
        Value::Number(n) => n.as_f64().map(FieldValue::Double),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(FieldValue::Double(f64::NAN)),
            "Infinity" => Some(FieldValue::Double(f64::INFINITY)),
            "-Infinity" => Some(FieldValue::Double(f64::NEG_INFINITY)),
            _ => s.parse().ok().map(FieldValue::Double),
        },
        _ => None,
    }
}

fn bad(kind: &str, inner: &Value) -> StoreError {
    StoreError::Decode(format!("invalid {}: {}", kind, inner))
}

/// Quote a top-level field name for use in an update mask.
pub fn field_path(name: &str) -> String {
    let simple = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if simple {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_decode_document_fields() {
        let fields = json!({
            "name": {"stringValue": "art/1.jpg"},
            "views": {"integerValue": "12"},
            "liked": {"arrayValue": {"values": [{"stringValue": "u1"}]}},
            "disliked": {"arrayValue": {}},
            "webDetection": {"mapValue": {"fields": {
                "webEntities": {"arrayValue": {"values": [
                    {"mapValue": {"fields": {
                        "entityId": {"stringValue": "/m/01"},
                        "score": {"doubleValue": 0.9},
                        "description": {"nullValue": null}
                    }}}
                ]}},
                "cachedAt": {"timestampValue": "2025-01-02T03:04:05.123456Z"}
            }}}
        });

        let decoded = decode_fields(Some(&fields)).unwrap();
        assert_eq!(decoded["views"], FieldValue::Integer(12));
        assert_eq!(decoded["disliked"], FieldValue::Array(vec![]));

        let detection = decoded["webDetection"].as_map().unwrap();
        assert!(matches!(detection["cachedAt"], FieldValue::Timestamp(_)));
        let entity = detection["webEntities"].as_array().unwrap()[0].as_map().unwrap();
        assert_eq!(entity["score"], FieldValue::Double(0.9));
        assert_eq!(entity["description"], FieldValue::Null);
    }

    #[test]
    fn test_encode_uses_typed_values() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let mut inner = Fields::new();
        inner.insert("count".into(), FieldValue::Integer(3));
        inner.insert("at".into(), FieldValue::Timestamp(ts));
        inner.insert("tags".into(), FieldValue::Array(vec![FieldValue::Boolean(true)]));

        let encoded = encode_value(&FieldValue::Map(inner));
        assert_eq!(
            encoded,
            json!({"mapValue": {"fields": {
                "at": {"timestampValue": "2025-01-02T03:04:05Z"},
                "count": {"integerValue": "3"},
                "tags": {"arrayValue": {"values": [{"booleanValue": true}]}}
            }}})
        );
    }

    #[test]
    fn test_encode_then_decode_preserves_timestamp() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let value = FieldValue::Timestamp(ts);
        assert_eq!(decode_value(&encode_value(&value)).unwrap(), value);
    }

    #[test]
    fn test_decode_rejects_unknown_type() {
        let err = decode_value(&json!({"weirdValue": 1})).unwrap_err();
        assert!(err.to_string().contains("weirdValue"));
    }

    #[test]
    fn test_field_path_quoting() {
        assert_eq!(field_path("webDetection"), "webDetection");
        assert_eq!(field_path("_x1"), "_x1");
        assert_eq!(field_path("doc-ids"), "`doc-ids`");
        assert_eq!(field_path("1st"), "`1st`");
        assert_eq!(field_path("a`b"), "`a\\`b`");
    }
}
