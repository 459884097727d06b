//! Request handlers for the callable endpoint.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::AppState;
use crate::error::CallableError;
use crate::services::{CallerIdentity, DetectWebRequest};

/// Callable protocol envelope: `{"data": {...}}`.
#[derive(Debug, Default, Deserialize)]
struct CallableRequest {
    #[serde(default)]
    data: Value,
}

/// Health check endpoint for container orchestration.
pub async fn healthz() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// `POST /detectWeb`.
pub async fn detect_web(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let caller = caller_identity(&headers, &state.identity_header);
    let request = parse_request(&body);

    match state.detect.detect(caller.as_ref(), &request).await {
        Ok(response) => Json(json!({ "result": response })).into_response(),
        Err(e) => e.into_response(),
    }
}

fn caller_identity(headers: &HeaderMap, header: &str) -> Option<CallerIdentity> {
    headers
        .get(header)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|uid| !uid.is_empty())
        .map(CallerIdentity::new)
}

/// Unreadable bodies become an empty request so the identity check still
/// runs first.
fn parse_request(body: &[u8]) -> DetectWebRequest {
    serde_json::from_slice::<CallableRequest>(body)
        .ok()
        .and_then(|envelope| serde_json::from_value(envelope.data).ok())
        .unwrap_or_default()
}

impl IntoResponse for CallableError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let mut error = json!({
            "status": self.status(),
            "message": self.to_string(),
        });
        if let Some(details) = self.details() {
            error["details"] = details.clone();
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}
