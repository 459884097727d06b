//! Image annotation service client.
//!
//! Only web detection is used: given a publicly reachable image address,
//! the service returns entities, matching images and pages, and best-guess
//! labels. Any part of that payload may be missing.

mod client;
mod config;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::RawWebDetection;

pub use client::VisionClient;
pub use config::VisionConfig;

/// Something that can run web detection on an image address.
#[async_trait]
pub trait WebDetector: Send + Sync {
    /// Run web detection. `Ok(None)` means the service answered but
    /// returned no detection payload at all.
    async fn detect_web(&self, image_url: &str) -> Result<Option<RawWebDetection>, VisionError>;
}

/// Errors that can occur while calling the annotation service.
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Vision API error ({status}): {message}")]
    Api { status: i64, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}
