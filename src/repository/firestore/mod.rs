//! Firestore document store over the REST v1 API.
//!
//! Reads are plain `GET`s on the document resource. Field updates are
//! `PATCH`es with an update mask and an `exists` precondition, which is
//! the same merge-into-existing behavior as the SDKs' `update()`.

mod codec;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{json, Value};
use tracing::debug;

use super::{DocumentStore, Fields, StoreError};
use crate::config::StoreConfig;

/// Document store backed by Cloud Firestore.
pub struct FirestoreStore {
    client: Client,
    documents_url: String,
    auth_token: Option<String>,
}

impl FirestoreStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let project = config.project_id.as_deref().ok_or_else(|| {
            StoreError::Config(
                "Firestore project id is not set (store.project_id or GOOGLE_CLOUD_PROJECT)"
                    .to_string(),
            )
        })?;

        // The emulator speaks plain HTTP and accepts the fixed "owner" token.
        let (base, auth_token) = match config.emulator_host.as_deref() {
            Some(host) => (format!("http://{}", host), Some("owner".to_string())),
            None => (
                config.endpoint.trim_end_matches('/').to_string(),
                config.access_token.clone(),
            ),
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StoreError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            documents_url: format!(
                "{}/v1/projects/{}/databases/{}/documents",
                base, project, config.database
            ),
            auth_token,
        })
    }

    /// Root URL of the database's documents.
    pub fn documents_url(&self) -> &str {
        &self.documents_url
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.documents_url,
            urlencoding::encode(collection),
            urlencoding::encode(id)
        )
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        self.authorize(request)
            .send()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    async fn patch(
        &self,
        collection: &str,
        id: &str,
        fields: &Fields,
        query: &[(&str, String)],
    ) -> Result<(), StoreError> {
        let url = self.document_url(collection, id);
        let body = json!({ "fields": codec::encode_fields(fields) });

        let resp = self
            .send(self.client.patch(&url).query(query).json(&body))
            .await?;

        match resp.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
            status => Err(api_error(status, resp).await),
        }
    }
}

async fn api_error(status: StatusCode, resp: Response) -> StoreError {
    let body = resp.text().await.unwrap_or_default();
    StoreError::Api {
        status: status.as_u16(),
        message: body,
    }
}

#[async_trait]
impl DocumentStore for FirestoreStore {
    async fn get_document(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Fields>, StoreError> {
        let url = self.document_url(collection, id);
        debug!("GET {}", url);

        let resp = self.send(self.client.get(&url)).await?;
        match resp.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => return Err(api_error(status, resp).await),
            _ => {}
        }

        let doc: Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Decode(e.to_string()))?;

        codec::decode_fields(doc.get("fields")).map(Some)
    }

    async fn update_fields(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        let mut query: Vec<(&str, String)> = fields
            .keys()
            .map(|k| ("updateMask.fieldPaths", codec::field_path(k)))
            .collect();
        query.push(("currentDocument.exists", "true".to_string()));

        debug!("PATCH {}/{} ({} fields)", collection, id, fields.len());
        self.patch(collection, id, &fields, &query).await
    }

    async fn set_document(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> Result<(), StoreError> {
        self.patch(collection, id, &fields, &[]).await
    }
}
