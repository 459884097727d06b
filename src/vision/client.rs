//! Cloud Vision REST client for web detection.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{VisionConfig, VisionError, WebDetector};
use crate::models::RawWebDetection;

/// `images:annotate` request body.
#[derive(Debug, Serialize)]
struct AnnotateRequest<'a> {
    requests: [ImageRequest<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    image: Image<'a>,
    features: [Feature; 1],
}

#[derive(Debug, Serialize)]
struct Image<'a> {
    source: ImageSource<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageSource<'a> {
    image_uri: &'a str,
}

#[derive(Debug, Serialize)]
struct Feature {
    #[serde(rename = "type")]
    kind: &'static str,
}

/// `images:annotate` response body.
#[derive(Debug, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    web_detection: Option<RawWebDetection>,
    error: Option<Status>,
}

#[derive(Debug, Deserialize)]
struct Status {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Status,
}

/// Client for the Cloud Vision `images:annotate` endpoint.
pub struct VisionClient {
    config: VisionConfig,
    client: Client,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self, VisionError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| VisionError::Connection(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    fn annotate_url(&self) -> String {
        format!(
            "{}/v1/images:annotate",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl WebDetector for VisionClient {
    async fn detect_web(&self, image_url: &str) -> Result<Option<RawWebDetection>, VisionError> {
        let request = AnnotateRequest {
            requests: [ImageRequest {
                image: Image {
                    source: ImageSource {
                        image_uri: image_url,
                    },
                },
                features: [Feature {
                    kind: "WEB_DETECTION",
                }],
            }],
        };

        debug!("Requesting web detection for {}", image_url);

        let mut builder = self.client.post(self.annotate_url()).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.query(&[("key", key)]);
        } else if let Some(ref token) = self.config.access_token {
            builder = builder.bearer_auth(token);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| VisionError::Connection(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(VisionError::Api {
                status: i64::from(status.as_u16()),
                message,
            });
        }

        let body: AnnotateResponse = resp
            .json()
            .await
            .map_err(|e| VisionError::Parse(e.to_string()))?;

        let Some(first) = body.responses.into_iter().next() else {
            return Ok(None);
        };

        if let Some(err) = first.error {
            return Err(VisionError::Api {
                status: err.code,
                message: err.message,
            });
        }

        Ok(first.web_detection)
    }
}
