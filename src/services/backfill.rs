//! Batch backfill of cached web detection.
//!
//! Walks the active-id list in order, one document at a time, and fills the
//! `webDetection` field wherever it has no entities yet. Failures are
//! written as empty records so the next run does not retry them. The driver
//! pauses after every annotation call to stay under the upstream rate limit.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::StorageConfig;
use crate::models::AnnotationResult;
use crate::repository::{ImageDocRepository, StoreError};
use crate::vision::WebDetector;

use super::normalize;

/// Why a document was not sent for detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotFound,
    AlreadyCached,
    NoFileName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotFound => write!(f, "document not found"),
            SkipReason::AlreadyCached => write!(f, "already cached"),
            SkipReason::NoFileName => write!(f, "no filename"),
        }
    }
}

/// Events emitted during a backfill run.
#[derive(Debug, Clone, PartialEq)]
pub enum BackfillEvent {
    /// Run started
    Started { total_documents: usize },
    /// Detection started for a document
    DocumentStarted {
        document_id: String,
        image_url: String,
    },
    /// Result stored
    DocumentCompleted {
        document_id: String,
        entities: usize,
        similar_images: usize,
    },
    /// Detection or storage failed; an empty record was stored if possible
    DocumentFailed { document_id: String, error: String },
    /// Document skipped
    DocumentSkipped {
        document_id: String,
        reason: SkipReason,
    },
    /// Run complete
    Complete {
        processed: usize,
        skipped: usize,
        errors: usize,
    },
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackfillSummary {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub total: usize,
}

/// Errors that abort a run before any document is touched.
#[derive(Debug, Error)]
pub enum BackfillError {
    #[error("Failed to read active-id list {list_id}: {source}")]
    ListUnavailable {
        list_id: String,
        #[source]
        source: StoreError,
    },

    #[error("No active image ids found in list {0}")]
    EmptyList(String),
}

/// Sequential cache filler over an active-id list.
pub struct BackfillDriver {
    images: ImageDocRepository,
    detector: Arc<dyn WebDetector>,
    storage: StorageConfig,
    delay: Duration,
}

enum Outcome {
    Stored(AnnotationResult),
    Failed(String),
}

impl BackfillDriver {
    pub fn new(
        images: ImageDocRepository,
        detector: Arc<dyn WebDetector>,
        storage: StorageConfig,
        delay: Duration,
    ) -> Self {
        Self {
            images,
            detector,
            storage,
            delay,
        }
    }

    /// Process every id in the list.
    pub async fn run(
        &self,
        list_id: &str,
        event_tx: mpsc::Sender<BackfillEvent>,
    ) -> Result<BackfillSummary, BackfillError> {
        let ids = self
            .images
            .active_ids(list_id)
            .await
            .map_err(|source| BackfillError::ListUnavailable {
                list_id: list_id.to_string(),
                source,
            })?
            .unwrap_or_default();

        if ids.is_empty() {
            return Err(BackfillError::EmptyList(list_id.to_string()));
        }

        info!("Found {} active images in list {}", ids.len(), list_id);
        let _ = event_tx
            .send(BackfillEvent::Started {
                total_documents: ids.len(),
            })
            .await;

        let mut summary = BackfillSummary {
            total: ids.len(),
            ..BackfillSummary::default()
        };

        for id in &ids {
            let doc = match self.images.get(id).await {
                Ok(Some(doc)) => doc,
                Ok(None) => {
                    self.skip(id, SkipReason::NotFound, &mut summary, &event_tx)
                        .await;
                    continue;
                }
                Err(e) => {
                    warn!("Failed to read {}: {}", id, e);
                    summary.errors += 1;
                    let _ = event_tx
                        .send(BackfillEvent::DocumentFailed {
                            document_id: id.clone(),
                            error: format!("Read failed: {}", e),
                        })
                        .await;
                    continue;
                }
            };

            if doc.has_cached_entities() {
                self.skip(id, SkipReason::AlreadyCached, &mut summary, &event_tx)
                    .await;
                continue;
            }

            let Some(name) = doc.name.as_deref() else {
                self.skip(id, SkipReason::NoFileName, &mut summary, &event_tx)
                    .await;
                continue;
            };

            let image_url = self.storage.object_url(name);
            info!("Processing: {} -> {}", id, image_url);
            let _ = event_tx
                .send(BackfillEvent::DocumentStarted {
                    document_id: id.clone(),
                    image_url: image_url.clone(),
                })
                .await;

            let outcome = match self.detector.detect_web(&image_url).await {
                Ok(Some(raw)) => Outcome::Stored(normalize(raw, Utc::now())),
                Ok(None) => Outcome::Failed("No web detection results".to_string()),
                Err(e) => Outcome::Failed(e.to_string()),
            };

            let event = match outcome {
                Outcome::Stored(result) => {
                    match self.images.save_web_detection(id, &result).await {
                        Ok(()) => {
                            debug!(
                                "Found {} entities, {} similar images for {}",
                                result.web_entities.len(),
                                result.visually_similar_images.len(),
                                id
                            );
                            summary.processed += 1;
                            BackfillEvent::DocumentCompleted {
                                document_id: id.clone(),
                                entities: result.web_entities.len(),
                                similar_images: result.visually_similar_images.len(),
                            }
                        }
                        Err(e) => self.failed(id, format!("Save failed: {}", e), &mut summary),
                    }
                }
                Outcome::Failed(error) => {
                    let error = match self
                        .images
                        .save_web_detection(id, &AnnotationResult::empty(Utc::now()))
                        .await
                    {
                        Ok(()) => error,
                        Err(e) => format!("{} (saving empty result failed: {})", error, e),
                    };
                    self.failed(id, error, &mut summary)
                }
            };
            let _ = event_tx.send(event).await;

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        info!(
            "Backfill complete: {} processed, {} skipped, {} errors of {}",
            summary.processed, summary.skipped, summary.errors, summary.total
        );
        let _ = event_tx
            .send(BackfillEvent::Complete {
                processed: summary.processed,
                skipped: summary.skipped,
                errors: summary.errors,
            })
            .await;

        Ok(summary)
    }

    async fn skip(
        &self,
        id: &str,
        reason: SkipReason,
        summary: &mut BackfillSummary,
        event_tx: &mpsc::Sender<BackfillEvent>,
    ) {
        debug!("Skipping {} - {}", id, reason);
        summary.skipped += 1;
        let _ = event_tx
            .send(BackfillEvent::DocumentSkipped {
                document_id: id.to_string(),
                reason,
            })
            .await;
    }

    fn failed(&self, id: &str, error: String, summary: &mut BackfillSummary) -> BackfillEvent {
        warn!("Error processing {}: {}", id, error);
        summary.errors += 1;
        BackfillEvent::DocumentFailed {
            document_id: id.to_string(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{painting, raw, storage, FakeDetector, Fixture};
    use crate::vision::VisionError;
    use serde_json::json;
    use std::time::Instant;

    fn driver(fx: &Fixture, detector: Arc<FakeDetector>, delay: Duration) -> BackfillDriver {
        BackfillDriver::new(fx.images.clone(), detector, storage(), delay)
    }

    async fn drain(mut rx: mpsc::Receiver<BackfillEvent>) -> Vec<BackfillEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn test_skips_cached_and_processes_rest() {
        let fx = Fixture::new();
        fx.list("list", json!({"ids": ["a", "b"]})).await;
        fx.image(
            "a",
            json!({"name": "a.jpg", "webDetection": {"webEntities": [{"entityId": "1"}]}}),
        )
        .await;
        fx.image("b", json!({"name": "x.jpg"})).await;

        let detector = Arc::new(FakeDetector::returning(painting()));
        let (tx, rx) = mpsc::channel(64);
        let summary = driver(&fx, detector.clone(), Duration::ZERO)
            .run("list", tx)
            .await
            .unwrap();

        assert_eq!(
            summary,
            BackfillSummary {
                processed: 1,
                skipped: 1,
                errors: 0,
                total: 2
            }
        );
        assert_eq!(detector.calls(), vec!["https://storage.example/bucket/x.jpg"]);

        let events = drain(rx).await;
        assert_eq!(events[0], BackfillEvent::Started { total_documents: 2 });
        assert_eq!(
            events[1],
            BackfillEvent::DocumentSkipped {
                document_id: "a".into(),
                reason: SkipReason::AlreadyCached
            }
        );
        assert!(matches!(
            events.last(),
            Some(BackfillEvent::Complete { processed: 1, .. })
        ));

        let b = fx.raw_image("b").await;
        assert_eq!(b["webDetection"]["webEntities"][0]["description"], "Painting");
    }

    #[tokio::test]
    async fn test_skip_reasons() {
        let fx = Fixture::new();
        fx.list("list", json!({"docIds": ["missing", "unnamed", "empty-cache"]}))
            .await;
        fx.image("unnamed", json!({"liked": []})).await;
        fx.image(
            "empty-cache",
            json!({"name": "e.jpg", "webDetection": {"webEntities": []}}),
        )
        .await;

        let detector = Arc::new(FakeDetector::returning(painting()));
        let (tx, rx) = mpsc::channel(64);
        let summary = driver(&fx, detector.clone(), Duration::ZERO)
            .run("list", tx)
            .await
            .unwrap();

        // An empty earlier result does not count as cached.
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.processed, 1);
        assert_eq!(detector.calls(), vec!["https://storage.example/bucket/e.jpg"]);

        let reasons: Vec<_> = drain(rx)
            .await
            .into_iter()
            .filter_map(|e| match e {
                BackfillEvent::DocumentSkipped { reason, .. } => Some(reason),
                _ => None,
            })
            .collect();
        assert_eq!(reasons, vec![SkipReason::NotFound, SkipReason::NoFileName]);
    }

    #[tokio::test]
    async fn test_failure_stores_empty_result_and_continues() {
        let fx = Fixture::new();
        fx.list("list", json!({"ids": ["bad", "blank", "good"]})).await;
        fx.image("bad", json!({"name": "bad.jpg"})).await;
        fx.image("blank", json!({"name": "blank.jpg"})).await;
        fx.image("good", json!({"name": "good.jpg"})).await;

        let detector = Arc::new(FakeDetector::new(|url| {
            if url.ends_with("bad.jpg") {
                Err(VisionError::Connection("reset by peer".into()))
            } else if url.ends_with("blank.jpg") {
                Ok(None)
            } else {
                Ok(Some(raw(painting())))
            }
        }));
        let (tx, _rx) = mpsc::channel(64);
        let summary = driver(&fx, detector.clone(), Duration::ZERO)
            .run("list", tx)
            .await
            .unwrap();

        assert_eq!(summary.errors, 2);
        assert_eq!(summary.processed, 1);
        assert_eq!(detector.calls().len(), 3);
        assert_eq!(fx.store.update_count(), 3);

        for id in ["bad", "blank"] {
            let detection = &fx.raw_image(id).await["webDetection"];
            assert_eq!(detection["webEntities"], json!([]));
            assert_eq!(detection["bestGuessLabels"], json!([]));
            assert!(detection["cachedAt"].is_string());
        }
    }

    #[tokio::test]
    async fn test_empty_or_missing_list_aborts() {
        let fx = Fixture::new();
        fx.list("empty", json!({"ids": []})).await;
        let detector = Arc::new(FakeDetector::returning(painting()));
        let driver = driver(&fx, detector.clone(), Duration::ZERO);

        let (tx, _rx) = mpsc::channel(8);
        let err = driver.run("empty", tx).await.unwrap_err();
        assert!(matches!(err, BackfillError::EmptyList(_)));

        let (tx, _rx) = mpsc::channel(8);
        let err = driver.run("absent", tx).await.unwrap_err();
        assert!(matches!(err, BackfillError::EmptyList(_)));

        assert!(detector.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_list_aborts() {
        let fx = Fixture::new();
        fx.list("list", json!({"ids": ["a"]})).await;
        fx.image("a", json!({"name": "a.jpg"})).await;
        let detector = Arc::new(FakeDetector::returning(painting()));
        let driver = BackfillDriver::new(
            fx.faulty(&["list"], &[]),
            detector.clone(),
            storage(),
            Duration::ZERO,
        );

        let (tx, rx) = mpsc::channel(8);
        let err = driver.run("list", tx).await.unwrap_err();
        match err {
            BackfillError::ListUnavailable { list_id, source } => {
                assert_eq!(list_id, "list");
                assert!(matches!(source, StoreError::Connection(_)));
            }
            other => panic!("expected ListUnavailable, got {:?}", other),
        }
        assert!(drain(rx).await.is_empty());
        assert!(detector.calls().is_empty());
        assert_eq!(fx.store.update_count(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_document_counts_as_error_and_continues() {
        let fx = Fixture::new();
        fx.list("list", json!({"ids": ["a", "b"]})).await;
        fx.image("a", json!({"name": "a.jpg"})).await;
        fx.image("b", json!({"name": "b.jpg"})).await;
        let detector = Arc::new(FakeDetector::returning(painting()));
        let driver = BackfillDriver::new(
            fx.faulty(&["a"], &[]),
            detector.clone(),
            storage(),
            Duration::ZERO,
        );

        let (tx, rx) = mpsc::channel(64);
        let summary = driver.run("list", tx).await.unwrap();

        assert_eq!(
            summary,
            BackfillSummary {
                processed: 1,
                skipped: 0,
                errors: 1,
                total: 2
            }
        );
        assert_eq!(detector.calls(), vec!["https://storage.example/bucket/b.jpg"]);
        assert!(fx.raw_image("a").await.get("webDetection").is_none());

        let failed: Vec<_> = drain(rx)
            .await
            .into_iter()
            .filter_map(|e| match e {
                BackfillEvent::DocumentFailed { document_id, error } => Some((document_id, error)),
                _ => None,
            })
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "a");
        assert!(failed[0].1.starts_with("Read failed"));
    }

    #[tokio::test]
    async fn test_failed_saves_count_as_errors() {
        let fx = Fixture::new();
        fx.list("list", json!({"ids": ["good", "bad", "after"]})).await;
        fx.image("good", json!({"name": "good.jpg"})).await;
        fx.image("bad", json!({"name": "bad.jpg"})).await;
        fx.image("after", json!({"name": "after.jpg"})).await;

        // "good" gets a result that cannot be saved, "bad" gets a failure
        // whose empty record cannot be saved either.
        let detector = Arc::new(FakeDetector::new(|url| {
            if url.ends_with("bad.jpg") {
                Err(VisionError::Connection("reset by peer".into()))
            } else {
                Ok(Some(raw(painting())))
            }
        }));
        let driver = BackfillDriver::new(
            fx.faulty(&[], &["good", "bad"]),
            detector.clone(),
            storage(),
            Duration::ZERO,
        );

        let (tx, rx) = mpsc::channel(64);
        let summary = driver.run("list", tx).await.unwrap();

        assert_eq!(summary.processed, 1);
        assert_eq!(summary.errors, 2);
        assert_eq!(detector.calls().len(), 3);
        assert_eq!(fx.store.update_count(), 1);
        assert!(fx.raw_image("good").await.get("webDetection").is_none());
        assert!(fx.raw_image("bad").await.get("webDetection").is_none());

        let errors: Vec<_> = drain(rx)
            .await
            .into_iter()
            .filter_map(|e| match e {
                BackfillEvent::DocumentFailed { document_id, error } => Some((document_id, error)),
                _ => None,
            })
            .collect();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].0, "good");
        assert!(errors[0].1.starts_with("Save failed"));
        assert_eq!(errors[1].0, "bad");
        assert!(errors[1].1.contains("reset by peer"));
        assert!(errors[1].1.contains("saving empty result failed"));
    }

    #[tokio::test]
    async fn test_pacing_follows_every_call() {
        let fx = Fixture::new();
        fx.list("list", json!({"ids": ["a", "b", "c"]})).await;
        fx.image("a", json!({"name": "a.jpg"})).await;
        fx.image("b", json!({"name": "b.jpg"})).await;

        let detector = Arc::new(FakeDetector::new(|url| {
            if url.ends_with("a.jpg") {
                Err(VisionError::Parse("bad json".into()))
            } else {
                Ok(Some(raw(painting())))
            }
        }));
        let (tx, _rx) = mpsc::channel(64);
        let started = Instant::now();
        let summary = driver(&fx, detector, Duration::from_millis(30))
            .run("list", tx)
            .await
            .unwrap();

        // Two annotation calls, one skipped id without a pause.
        assert_eq!(summary.skipped, 1);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
