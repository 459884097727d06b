//! In-process document store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{DocumentStore, Fields, StoreError};

/// Document store held entirely in memory.
///
/// Keeps a count of update calls so callers can check how often a flow
/// wrote back to the store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<(String, String), Fields>>,
    updates: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a document directly, without counting it as an update.
    pub async fn insert(&self, collection: &str, id: &str, fields: Fields) {
        self.documents
            .write()
            .await
            .insert((collection.to_string(), id.to_string()), fields);
    }

    /// Number of `update_fields` calls that reached an existing document.
    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Fields>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .get(&(collection.to_string(), id.to_string()))
            .cloned())
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        let doc = documents
            .get_mut(&(collection.to_string(), id.to_string()))
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        doc.extend(fields);
        self.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.insert(collection, id, fields).await;
        Ok(())
    }
}
