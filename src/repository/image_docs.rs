//! Typed access to image documents and active-id lists.

use std::sync::Arc;

use crate::models::{active_ids, AnnotationResult, ImageDocument, WEB_DETECTION_FIELD};

use super::{DocumentStore, Fields, StoreError};

/// Repository for image documents on top of any `DocumentStore`.
#[derive(Clone)]
pub struct ImageDocRepository {
    store: Arc<dyn DocumentStore>,
    images_collection: String,
    id_lists_collection: String,
}

impl ImageDocRepository {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        images_collection: impl Into<String>,
        id_lists_collection: impl Into<String>,
    ) -> Self {
        Self {
            store,
            images_collection: images_collection.into(),
            id_lists_collection: id_lists_collection.into(),
        }
    }

    /// Get an image document by id.
    pub async fn get(&self, id: &str) -> Result<Option<ImageDocument>, StoreError> {
        let fields = self
            .store
            .get_document(&self.images_collection, id)
            .await?;
        Ok(fields.map(|f| ImageDocument::from_fields(id, &f)))
    }

    /// Overwrite the document's `webDetection` field. Other fields are
    /// left untouched; concurrent writers race and the last one wins.
    pub async fn save_web_detection(
        &self,
        id: &str,
        result: &AnnotationResult,
    ) -> Result<(), StoreError> {
        let mut fields = Fields::new();
        fields.insert(WEB_DETECTION_FIELD.to_string(), result.to_field_value()?);
        self.store
            .update_fields(&self.images_collection, id, fields)
            .await
    }

    /// Read the ids in an active-id list. `Ok(None)` when the list
    /// document does not exist.
    pub async fn active_ids(&self, list_id: &str) -> Result<Option<Vec<String>>, StoreError> {
        let fields = self
            .store
            .get_document(&self.id_lists_collection, list_id)
            .await?;
        Ok(fields.map(|f| active_ids(&f)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{fields_from_json, MemoryStore};
    use chrono::Utc;
    use serde_json::json;

    async fn repo_with(store: Arc<MemoryStore>) -> ImageDocRepository {
        store
            .insert(
                "image-docs",
                "a",
                fields_from_json(&json!({"name": "a.jpg", "liked": ["u1"]})).unwrap(),
            )
            .await;
        store
            .insert(
                "doc-id-lists",
                "list",
                fields_from_json(&json!({"docIds": ["a", "b"]})).unwrap(),
            )
            .await;
        ImageDocRepository::new(store, "image-docs", "doc-id-lists")
    }

    #[tokio::test]
    async fn test_save_web_detection_keeps_other_fields() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(store.clone()).await;

        repo.save_web_detection("a", &AnnotationResult::empty(Utc::now()))
            .await
            .unwrap();

        let raw = store.get_document("image-docs", "a").await.unwrap().unwrap();
        assert!(raw.contains_key("liked"));

        let doc = repo.get("a").await.unwrap().unwrap();
        assert_eq!(doc.name.as_deref(), Some("a.jpg"));
        assert!(doc.web_detection.is_some());
        assert!(!doc.has_cached_entities());
    }

    #[tokio::test]
    async fn test_active_ids_reads_list_document() {
        let store = Arc::new(MemoryStore::new());
        let repo = repo_with(store).await;

        assert_eq!(
            repo.active_ids("list").await.unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(repo.active_ids("other").await.unwrap(), None);
    }
}
