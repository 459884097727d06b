//! Repository layer for document persistence.
//!
//! The document database is an external collaborator. Everything here talks
//! to it through the `DocumentStore` trait: get a document by id, merge a
//! few fields into it, or replace it wholesale. Backends are chosen at
//! runtime from configuration.

mod firestore;
mod image_docs;
mod memory;
mod sqlite;
mod value;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};

pub use firestore::FirestoreStore;
pub use image_docs::ImageDocRepository;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use value::{fields_from_json, fields_to_json, FieldValue, Fields};

/// Errors from document store backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Store API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode document: {0}")]
    Decode(String),

    #[error("Failed to encode document: {0}")]
    Encode(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Store misconfigured: {0}")]
    Config(String),
}

/// Access contract of the document database.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document's fields. `Ok(None)` when it does not exist.
    async fn get_document(&self, collection: &str, id: &str)
        -> Result<Option<Fields>, StoreError>;

    /// Merge the given top-level fields into an existing document.
    /// Fails with `StoreError::NotFound` if the document does not exist.
    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;

    /// Create or replace a whole document.
    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError>;
}

/// Open the store backend selected in configuration.
pub fn open_store(config: &StoreConfig) -> Result<Arc<dyn DocumentStore>, StoreError> {
    match config.backend {
        StoreBackend::Firestore => {
            let store = FirestoreStore::new(config)?;
            tracing::info!("Using Firestore document store at {}", store.documents_url());
            Ok(Arc::new(store))
        }
        StoreBackend::Sqlite => {
            let path = config.resolved_sqlite_path()?;
            tracing::info!("Using SQLite document store at {}", path.display());
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
    }
}
