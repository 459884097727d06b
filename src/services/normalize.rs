//! Raw web detection to canonical record.

use chrono::{DateTime, Utc};

use crate::models::{
    AnnotationResult, RawWebDetection, RawWebEntity, RawWebImage, RawWebLabel, RawWebPage,
    WebEntity, WebImage, WebLabel, WebPage,
};

/// Project a raw payload onto the canonical record.
///
/// Missing or null collections become empty; upstream fields outside the
/// canonical set are dropped. Order is preserved.
pub fn normalize(raw: RawWebDetection, cached_at: DateTime<Utc>) -> AnnotationResult {
    AnnotationResult {
        web_entities: project(raw.web_entities, entity),
        full_matching_images: project(raw.full_matching_images, image),
        partial_matching_images: project(raw.partial_matching_images, image),
        pages_with_matching_images: project(raw.pages_with_matching_images, page),
        visually_similar_images: project(raw.visually_similar_images, image),
        best_guess_labels: project(raw.best_guess_labels, label),
        cached_at,
    }
}

fn project<R, C>(items: Option<Vec<R>>, f: fn(R) -> C) -> Vec<C> {
    items.unwrap_or_default().into_iter().map(f).collect()
}

fn entity(e: RawWebEntity) -> WebEntity {
    WebEntity {
        entity_id: e.entity_id,
        description: e.description,
        score: e.score,
    }
}

fn image(i: RawWebImage) -> WebImage {
    WebImage { url: i.url }
}

fn page(p: RawWebPage) -> WebPage {
    WebPage {
        url: p.url,
        page_title: p.page_title,
    }
}

fn label(l: RawWebLabel) -> WebLabel {
    WebLabel {
        label: l.label,
        language_code: l.language_code,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_payload_yields_empty_record() {
        let now = Utc::now();
        let result = normalize(RawWebDetection::default(), now);
        assert_eq!(result, AnnotationResult::empty(now));
    }

    #[test]
    fn test_null_collections_become_empty() {
        let raw: RawWebDetection = serde_json::from_value(json!({
            "webEntities": null,
            "bestGuessLabels": [{"label": "sunflowers", "languageCode": "en"}]
        }))
        .unwrap();

        let result = normalize(raw, Utc::now());
        assert!(result.web_entities.is_empty());
        assert!(result.visually_similar_images.is_empty());
        assert_eq!(result.best_guess_labels[0].label.as_deref(), Some("sunflowers"));
    }

    #[test]
    fn test_extra_fields_are_dropped() {
        let raw: RawWebDetection = serde_json::from_value(json!({
            "webEntities": [{"entityId": "123", "description": "Test", "score": 0.9, "extraField": "ignored"}],
            "pagesWithMatchingImages": [{
                "url": "https://museum.example/p",
                "pageTitle": "Collection",
                "score": 0.4,
                "fullMatchingImages": [{"url": "https://museum.example/a.jpg"}]
            }],
            "visuallySimilarImages": [{"url": "https://a.example/1.jpg", "score": 0.1}]
        }))
        .unwrap();

        let result = normalize(raw, Utc::now());
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(
            json["webEntities"][0],
            json!({"entityId": "123", "description": "Test", "score": 0.9})
        );
        assert_eq!(
            json["pagesWithMatchingImages"][0],
            json!({"url": "https://museum.example/p", "pageTitle": "Collection"})
        );
        assert_eq!(
            json["visuallySimilarImages"][0],
            json!({"url": "https://a.example/1.jpg"})
        );
    }

    #[test]
    fn test_order_is_preserved() {
        let raw = RawWebDetection {
            full_matching_images: Some(vec![
                RawWebImage {
                    url: Some("first".into()),
                    score: None,
                },
                RawWebImage {
                    url: Some("second".into()),
                    score: None,
                },
            ]),
            ..RawWebDetection::default()
        };

        let urls: Vec<_> = normalize(raw, Utc::now())
            .full_matching_images
            .into_iter()
            .filter_map(|i| i.url)
            .collect();
        assert_eq!(urls, vec!["first", "second"]);
    }
}
