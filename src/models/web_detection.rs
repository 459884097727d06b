//! Web detection results.
//!
//! Two shapes live here: the raw `WebDetection` payload as the Vision API
//! returns it, where every collection may be missing, and the canonical
//! `AnnotationResult` that is cached on image documents and returned to
//! callers, where every collection is always present.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::repository::{FieldValue, StoreError};

/// Entity inferred from similar images on the web.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebEntity {
    pub entity_id: Option<String>,
    pub description: Option<String>,
    pub score: Option<f64>,
}

/// An image found on the web.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebImage {
    pub url: Option<String>,
}

/// A web page containing a matching image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebPage {
    pub url: Option<String>,
    pub page_title: Option<String>,
}

/// Best guess label for the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebLabel {
    pub label: Option<String>,
    pub language_code: Option<String>,
}

/// Canonical, persisted web detection record.
///
/// Every sequence is always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationResult {
    #[serde(default)]
    pub web_entities: Vec<WebEntity>,
    #[serde(default)]
    pub full_matching_images: Vec<WebImage>,
    #[serde(default)]
    pub partial_matching_images: Vec<WebImage>,
    #[serde(default)]
    pub pages_with_matching_images: Vec<WebPage>,
    #[serde(default)]
    pub visually_similar_images: Vec<WebImage>,
    #[serde(default)]
    pub best_guess_labels: Vec<WebLabel>,
    /// When this record was computed.
    pub cached_at: DateTime<Utc>,
}

impl AnnotationResult {
    /// All-empty record, stored when detection yields nothing so the
    /// document is not picked up again.
    pub fn empty(cached_at: DateTime<Utc>) -> Self {
        Self {
            web_entities: Vec::new(),
            full_matching_images: Vec::new(),
            partial_matching_images: Vec::new(),
            pages_with_matching_images: Vec::new(),
            visually_similar_images: Vec::new(),
            best_guess_labels: Vec::new(),
            cached_at,
        }
    }

    /// Convert to a document field value. `cachedAt` becomes a native
    /// timestamp rather than a string.
    pub fn to_field_value(&self) -> Result<FieldValue, StoreError> {
        let json = serde_json::to_value(self).map_err(|e| StoreError::Encode(e.to_string()))?;
        let mut value = FieldValue::from_json(&json);
        if let FieldValue::Map(ref mut fields) = value {
            fields.insert("cachedAt".to_string(), FieldValue::Timestamp(self.cached_at));
        }
        Ok(value)
    }
}

/// Raw `WebDetection` payload from the Vision REST API.
///
/// Mirrors the upstream shape, including fields the canonical record drops.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWebDetection {
    #[serde(default)]
    pub web_entities: Option<Vec<RawWebEntity>>,
    #[serde(default)]
    pub full_matching_images: Option<Vec<RawWebImage>>,
    #[serde(default)]
    pub partial_matching_images: Option<Vec<RawWebImage>>,
    #[serde(default)]
    pub pages_with_matching_images: Option<Vec<RawWebPage>>,
    #[serde(default)]
    pub visually_similar_images: Option<Vec<RawWebImage>>,
    #[serde(default)]
    pub best_guess_labels: Option<Vec<RawWebLabel>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWebEntity {
    pub entity_id: Option<String>,
    pub description: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawWebImage {
    pub url: Option<String>,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWebPage {
    pub url: Option<String>,
    pub score: Option<f64>,
    pub page_title: Option<String>,
    #[serde(default)]
    pub full_matching_images: Option<Vec<RawWebImage>>,
    #[serde(default)]
    pub partial_matching_images: Option<Vec<RawWebImage>>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWebLabel {
    pub label: Option<String>,
    pub language_code: Option<String>,
}
