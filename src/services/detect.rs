//! Interactive web detection with a cache on the image document.
//!
//! Document mode reads the image document first and only calls the
//! annotation service on a miss, writing the normalized result back onto
//! the document. Legacy address mode calls the service directly and never
//! writes anything.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::config::StorageConfig;
use crate::error::CallableError;
use crate::models::{AnnotationResult, ImageDocument};
use crate::repository::ImageDocRepository;
use crate::vision::WebDetector;

use super::normalize;

const INTERNAL_MESSAGE: &str = "Failed to detect web entities";

/// The authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub uid: String,
}

impl CallerIdentity {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }
}

/// Request payload of `detectWeb`.
///
/// Both fields are read leniently: anything other than a non-empty string
/// counts as absent.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectWebRequest {
    #[serde(default, deserialize_with = "non_empty_string")]
    pub image_doc_id: Option<String>,
    #[serde(default, deserialize_with = "non_empty_string")]
    pub image_url: Option<String>,
}

fn non_empty_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    })
}

/// How the image to analyze is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageTarget {
    /// Image document id, with the address to use if the document is gone.
    Document {
        id: String,
        fallback_url: Option<String>,
    },
    /// Direct image address (legacy, never cached).
    Url(String),
}

impl DetectWebRequest {
    pub fn for_document(id: impl Into<String>) -> Self {
        Self {
            image_doc_id: Some(id.into()),
            image_url: None,
        }
    }

    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            image_doc_id: None,
            image_url: Some(url.into()),
        }
    }

    /// Resolve the addressing mode. A document id wins over an address.
    pub fn target(&self) -> Option<ImageTarget> {
        match (&self.image_doc_id, &self.image_url) {
            (Some(id), fallback) => Some(ImageTarget::Document {
                id: id.clone(),
                fallback_url: fallback.clone(),
            }),
            (None, Some(url)) => Some(ImageTarget::Url(url.clone())),
            (None, None) => None,
        }
    }
}

/// Detection payload returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DetectionData {
    /// Stored value, returned exactly as persisted.
    Cached(Value),
    /// Freshly computed record.
    Fresh(AnnotationResult),
}

/// Response payload of `detectWeb`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectWebResponse {
    pub success: bool,
    pub data: Option<DetectionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached: Option<bool>,
}

impl DetectWebResponse {
    fn hit(stored: Value) -> Self {
        Self {
            success: true,
            data: Some(DetectionData::Cached(stored)),
            cached: Some(true),
        }
    }

    fn miss(result: AnnotationResult) -> Self {
        Self {
            success: true,
            data: Some(DetectionData::Fresh(result)),
            cached: Some(false),
        }
    }

    fn uncached(result: Option<AnnotationResult>) -> Self {
        Self {
            success: true,
            data: result.map(DetectionData::Fresh),
            cached: None,
        }
    }
}

/// Cache-aside web detection for interactive callers.
pub struct DetectService {
    images: ImageDocRepository,
    detector: Arc<dyn WebDetector>,
    storage: StorageConfig,
}

impl DetectService {
    pub fn new(
        images: ImageDocRepository,
        detector: Arc<dyn WebDetector>,
        storage: StorageConfig,
    ) -> Self {
        Self {
            images,
            detector,
            storage,
        }
    }

    /// Run web detection for one request.
    pub async fn detect(
        &self,
        caller: Option<&CallerIdentity>,
        request: &DetectWebRequest,
    ) -> Result<DetectWebResponse, CallableError> {
        let caller = caller.ok_or_else(|| {
            CallableError::Unauthenticated("User must be authenticated".to_string())
        })?;

        let target = request.target().ok_or_else(|| {
            CallableError::InvalidArgument("imageDocId or imageUrl is required".to_string())
        })?;

        match target {
            ImageTarget::Document { id, fallback_url } => {
                match self.images.get(&id).await.map_err(internal)? {
                    Some(doc) => self.detect_document(caller, doc).await,
                    None => match fallback_url {
                        Some(url) => {
                            debug!("Image document {} not found, using imageUrl", id);
                            self.detect_url(caller, &url).await
                        }
                        None => Err(CallableError::NotFound(format!(
                            "Image document {} not found",
                            id
                        ))),
                    },
                }
            }
            ImageTarget::Url(url) => self.detect_url(caller, &url).await,
        }
    }

    async fn detect_document(
        &self,
        caller: &CallerIdentity,
        doc: ImageDocument,
    ) -> Result<DetectWebResponse, CallableError> {
        if let Some(stored) = doc.cached_detection() {
            info!("Cache hit for {} (caller {})", doc.id, caller.uid);
            return Ok(DetectWebResponse::hit(stored));
        }

        let name = doc.name.as_deref().ok_or_else(|| {
            CallableError::NotFound(format!("Image document {} has no file name", doc.id))
        })?;

        let image_url = self.storage.object_url(name);
        info!(
            "Cache miss for {}, detecting {} (caller {})",
            doc.id, image_url, caller.uid
        );

        let Some(raw) = self
            .detector
            .detect_web(&image_url)
            .await
            .map_err(internal)?
        else {
            info!("No web detection results for {}", doc.id);
            return Ok(DetectWebResponse::uncached(None));
        };

        let result = normalize(raw, Utc::now());
        self.images
            .save_web_detection(&doc.id, &result)
            .await
            .map_err(internal)?;

        debug!(
            "Cached {} entities for {}",
            result.web_entities.len(),
            doc.id
        );
        Ok(DetectWebResponse::miss(result))
    }

    async fn detect_url(
        &self,
        caller: &CallerIdentity,
        image_url: &str,
    ) -> Result<DetectWebResponse, CallableError> {
        info!("Detecting {} without caching (caller {})", image_url, caller.uid);

        let raw = self
            .detector
            .detect_web(image_url)
            .await
            .map_err(internal)?;

        Ok(DetectWebResponse::uncached(
            raw.map(|raw| normalize(raw, Utc::now())),
        ))
    }
}

fn internal(err: impl std::fmt::Display) -> CallableError {
    error!("{}: {}", INTERNAL_MESSAGE, err);
    CallableError::internal(INTERNAL_MESSAGE, err)
}
