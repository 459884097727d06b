//! Image documents as stored by the upstream ingestion process.
//!
//! This service only reads `name` and reads/writes `webDetection`; every
//! other field on the document belongs to someone else and is left alone.

use crate::repository::{FieldValue, Fields};

/// Field holding the storage object key of the image.
pub const NAME_FIELD: &str = "name";
/// Field holding the cached web detection result.
pub const WEB_DETECTION_FIELD: &str = "webDetection";

/// An image document, reduced to the fields this service cares about.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDocument {
    pub id: String,
    /// Storage object key. `None` when missing, empty or not a string.
    pub name: Option<String>,
    /// Stored web detection, exactly as persisted.
    pub web_detection: Option<FieldValue>,
}

impl ImageDocument {
    pub fn from_fields(id: &str, fields: &Fields) -> Self {
        let name = fields
            .get(NAME_FIELD)
            .and_then(FieldValue::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let web_detection = fields
            .get(WEB_DETECTION_FIELD)
            .filter(|v| is_present(v))
            .cloned();

        Self {
            id: id.to_string(),
            name,
            web_detection,
        }
    }

    /// Stored detection as JSON, for returning to callers verbatim.
    pub fn cached_detection(&self) -> Option<serde_json::Value> {
        self.web_detection.as_ref().map(FieldValue::to_json)
    }

    /// Whether the stored detection has at least one web entity.
    ///
    /// Empty results written after failures do not count, so those
    /// documents get another chance on the next backfill.
    pub fn has_cached_entities(&self) -> bool {
        self.web_detection
            .as_ref()
            .and_then(FieldValue::as_map)
            .and_then(|m| m.get("webEntities"))
            .and_then(FieldValue::as_array)
            .is_some_and(|entities| !entities.is_empty())
    }
}

/// Whether a stored value counts as set. Null, `false`, zero and the empty
/// string do not; maps and arrays always do, even when empty.
fn is_present(value: &FieldValue) -> bool {
    match value {
        FieldValue::Null => false,
        FieldValue::Boolean(b) => *b,
        FieldValue::Integer(n) => *n != 0,
        FieldValue::Double(n) => *n != 0.0 && !n.is_nan(),
        FieldValue::String(s) => !s.is_empty(),
        FieldValue::Timestamp(_) | FieldValue::Array(_) | FieldValue::Map(_) => true,
    }
}

/// Read the ids out of an active-id list document.
///
/// Uses `ids`, falling back to the older `docIds` field. Non-string entries
/// are dropped.
pub fn active_ids(fields: &Fields) -> Vec<String> {
    let list = fields
        .get("ids")
        .filter(|v| !v.is_null())
        .or_else(|| fields.get("docIds").filter(|v| !v.is_null()));

    list.and_then(FieldValue::as_array)
        .map(|values| {
            values
                .iter()
                .filter_map(FieldValue::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
