//! Vision API client configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the Cloud Vision client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionConfig {
    /// API endpoint (without the `/v1/...` path)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// API key, sent as the `key` query parameter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// OAuth access token, used when no API key is set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://vision.googleapis.com".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            access_token: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl VisionConfig {
    /// Apply overrides from a variable lookup.
    ///
    /// Supported variables:
    /// - `VISION_ENDPOINT`: API endpoint
    /// - `VISION_API_KEY` or `GOOGLE_API_KEY`: API key (the former wins)
    /// - `GOOGLE_OAUTH_ACCESS_TOKEN`: bearer token
    /// - `VISION_TIMEOUT_SECS`: request timeout
    pub fn with_overrides(mut self, var: &dyn Fn(&str) -> Option<String>) -> Self {
        if let Some(val) = var("VISION_ENDPOINT") {
            self.endpoint = val;
        }
        if let Some(key) = var("VISION_API_KEY").or_else(|| var("GOOGLE_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(token) = var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            self.access_token = Some(token);
        }
        if let Some(n) = var("VISION_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.timeout_secs = n;
        }
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.to_string();
        self
    }
}
