//! Fakes shared by service and server tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::StorageConfig;
use crate::models::RawWebDetection;
use crate::repository::{
    fields_from_json, DocumentStore, Fields, ImageDocRepository, MemoryStore, StoreError,
};
use crate::vision::{VisionError, WebDetector};

type Script = Box<dyn Fn(&str) -> Result<Option<RawWebDetection>, VisionError> + Send + Sync>;

/// Web detector answering from a closure and recording every address.
pub struct FakeDetector {
    script: Script,
    calls: Mutex<Vec<String>>,
}

impl FakeDetector {
    pub fn new(
        script: impl Fn(&str) -> Result<Option<RawWebDetection>, VisionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Always returns the given payload.
    pub fn returning(payload: Value) -> Self {
        Self::new(move |_| Ok(Some(raw(payload.clone()))))
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WebDetector for FakeDetector {
    async fn detect_web(&self, image_url: &str) -> Result<Option<RawWebDetection>, VisionError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(image_url.to_string());
        }
        (self.script)(image_url)
    }
}

pub fn raw(payload: Value) -> RawWebDetection {
    serde_json::from_value(payload).unwrap()
}

pub fn painting() -> Value {
    json!({
        "webEntities": [{"entityId": "456", "description": "Painting", "score": 0.85}],
        "visuallySimilarImages": [{"url": "https://example.com/similar.jpg"}]
    })
}

pub fn storage() -> StorageConfig {
    StorageConfig {
        base_url: "https://storage.example/bucket".to_string(),
    }
}

/// Memory store that fails reads or writes of chosen document ids.
pub struct FaultyStore {
    inner: Arc<MemoryStore>,
    broken_reads: Vec<String>,
    broken_writes: Vec<String>,
}

impl FaultyStore {
    fn fault(id: &str) -> StoreError {
        StoreError::Connection(format!("store unavailable reading {}", id))
    }
}

#[async_trait]
impl DocumentStore for FaultyStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Fields>, StoreError> {
        if self.broken_reads.iter().any(|b| b == id) {
            return Err(Self::fault(id));
        }
        self.inner.get_document(collection, id).await
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        if self.broken_writes.iter().any(|b| b == id) {
            return Err(StoreError::Api {
                status: 503,
                message: format!("write to {} rejected", id),
            });
        }
        self.inner.update_fields(collection, id, fields).await
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.inner.set_document(collection, id, fields).await
    }
}

/// Memory store plus repository over the default collection names.
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub images: ImageDocRepository,
}

impl Fixture {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let images = ImageDocRepository::new(store.clone(), "image-docs", "doc-id-lists");
        Self { store, images }
    }

    /// Repository over the same documents, failing reads of `broken_reads`
    /// and writes of `broken_writes`.
    pub fn faulty(&self, broken_reads: &[&str], broken_writes: &[&str]) -> ImageDocRepository {
        let store = Arc::new(FaultyStore {
            inner: self.store.clone(),
            broken_reads: broken_reads.iter().map(|s| s.to_string()).collect(),
            broken_writes: broken_writes.iter().map(|s| s.to_string()).collect(),
        });
        ImageDocRepository::new(store, "image-docs", "doc-id-lists")
    }

    pub async fn image(&self, id: &str, fields: Value) -> &Self {
        self.store
            .insert("image-docs", id, fields_from_json(&fields).unwrap())
            .await;
        self
    }

    pub async fn list(&self, id: &str, fields: Value) -> &Self {
        self.store
            .insert("doc-id-lists", id, fields_from_json(&fields).unwrap())
            .await;
        self
    }

    pub async fn raw_image(&self, id: &str) -> Value {
        use crate::repository::fields_to_json;
        let fields = self
            .store
            .get_document("image-docs", id)
            .await
            .unwrap()
            .unwrap();
        Value::Object(fields_to_json(&fields))
    }
}
