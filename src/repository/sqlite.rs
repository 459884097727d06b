//! SQLite document store for local development and offline backfills.
//!
//! Documents are kept as JSON text in a single table keyed by
//! `(collection, id)`. Timestamps are written as RFC 3339 strings, so they
//! read back as strings.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use super::{fields_from_json, fields_to_json, DocumentStore, Fields, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    id TEXT NOT NULL,
    data TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (collection, id)
);
";

fn db_err(e: rusqlite::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

/// Document store backed by a SQLite file.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Config(format!(
                        "cannot create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Database("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
    }
}

fn read_document(
    conn: &Connection,
    collection: &str,
    id: &str,
) -> Result<Option<Fields>, StoreError> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM documents WHERE collection = ?1 AND id = ?2",
            params![collection, id],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)?;

    match data {
        None => Ok(None),
        Some(text) => {
            let json: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| StoreError::Decode(e.to_string()))?;
            fields_from_json(&json)
                .map(Some)
                .ok_or_else(|| StoreError::Decode(format!("{}/{} is not an object", collection, id)))
        }
    }
}

fn write_document(
    conn: &Connection,
    collection: &str,
    id: &str,
    fields: &Fields,
) -> Result<(), StoreError> {
    let data = serde_json::to_string(&fields_to_json(fields))
        .map_err(|e| StoreError::Encode(e.to_string()))?;
    conn.execute(
        "INSERT INTO documents (collection, id, data, updated_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(collection, id) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
        params![collection, id, data, chrono::Utc::now().to_rfc3339()],
    )
    .map_err(db_err)?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Fields>, StoreError> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.with_conn(move |conn| read_document(conn, &collection, &id))
            .await
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.with_conn(move |conn| {
            let mut doc = read_document(conn, &collection, &id)?.ok_or_else(|| {
                StoreError::NotFound {
                    collection: collection.clone(),
                    id: id.clone(),
                }
            })?;
            doc.extend(fields);
            write_document(conn, &collection, &id, &doc)
        })
        .await
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let (collection, id) = (collection.to_string(), id.to_string());
        self.with_conn(move |conn| write_document(conn, &collection, &id, &fields))
            .await
    }
}
