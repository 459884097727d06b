//! Document field values.
//!
//! Stores hand documents around as maps of `FieldValue`. The set of variants
//! follows what a document database can hold natively, so that timestamps
//! survive a round trip instead of degrading into strings.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value};

/// Top-level fields of a document.
pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(Fields),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<FieldValue>> {
        match self {
            FieldValue::Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&Fields> {
        match self {
            FieldValue::Map(fields) => Some(fields),
            _ => None,
        }
    }

    /// Convert plain JSON. Integral numbers that fit `i64` become
    /// `Integer`, everything else numeric becomes `Double`.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FieldValue::String(s.clone()),
            Value::Array(values) => FieldValue::Array(values.iter().map(Self::from_json).collect()),
            Value::Object(map) => FieldValue::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render as plain JSON. Timestamps become RFC 3339 strings and
    /// non-finite doubles become `null`.
    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Null => Value::Null,
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::Number((*i).into()),
            FieldValue::Double(d) => Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Timestamp(ts) => {
                Value::String(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true))
            }
            FieldValue::Array(values) => Value::Array(values.iter().map(Self::to_json).collect()),
            FieldValue::Map(fields) => Value::Object(fields_to_json(fields)),
        }
    }
}

/// Render a whole document as a JSON object.
pub fn fields_to_json(fields: &Fields) -> Map<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.clone(), v.to_json()))
        .collect()
}

/// Read a JSON object into document fields. Returns `None` for non-objects.
pub fn fields_from_json(value: &Value) -> Option<Fields> {
    match FieldValue::from_json(value) {
        FieldValue::Map(fields) => Some(fields),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_numbers_split_into_integer_and_double() {
        assert_eq!(FieldValue::from_json(&json!(3)), FieldValue::Integer(3));
        assert_eq!(FieldValue::from_json(&json!(0.75)), FieldValue::Double(0.75));
        assert_eq!(FieldValue::from_json(&json!(1.0)), FieldValue::Double(1.0));
    }

    #[test]
    fn test_json_round_trip_of_nested_document() {
        let doc = json!({
            "name": "a.jpg",
            "liked": ["u1", "u2"],
            "webDetection": {
                "webEntities": [{"entityId": "x", "description": null, "score": 0.5}],
                "flag": true
            }
        });

        let fields = fields_from_json(&doc).unwrap();
        assert_eq!(Value::Object(fields_to_json(&fields)), doc);
    }

    #[test]
    fn test_timestamp_renders_as_rfc3339() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 2, 8, 30, 0).unwrap();
        assert_eq!(
            FieldValue::Timestamp(ts).to_json(),
            json!("2024-06-02T08:30:00Z")
        );
    }

    #[test]
    fn test_non_finite_double_renders_as_null() {
        assert_eq!(FieldValue::Double(f64::NAN).to_json(), Value::Null);
    }

    #[test]
    fn test_fields_from_json_rejects_non_objects() {
        assert!(fields_from_json(&json!([1, 2])).is_none());
        assert!(fields_from_json(&json!("x")).is_none());
    }
}
