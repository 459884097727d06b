//! Data models for webdetect.

mod image_document;
mod web_detection;

pub use image_document::{active_ids, ImageDocument, NAME_FIELD, WEB_DETECTION_FIELD};
pub use web_detection::{
    AnnotationResult, RawWebDetection, RawWebEntity, RawWebImage, RawWebLabel, RawWebPage,
    WebEntity, WebImage, WebLabel, WebPage,
};
