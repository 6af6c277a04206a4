//! Response normalization.
//!
//! Every sub-request outcome ends up as a [`ResponseEnvelope`]. The
//! conversion never fails: unreadable bodies become a 500 envelope.

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderMap, StatusCode},
    response::Response,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::isolation::failure::GENERIC_SERVER_ERROR;

/// Uniform per-item response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub status_code: u16,
    pub reason_phrase: String,
    pub body: Value,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Path of the item this envelope answers.
    pub path: String,
}

/// Body of a successful batch call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub responses: Vec<ResponseEnvelope>,
}

pub fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("Unknown Status Code")
        .to_string()
}

impl ResponseEnvelope {
    /// No route matched the item's path.
    pub fn not_found(path: &str) -> Self {
        Self {
            status_code: StatusCode::NOT_FOUND.as_u16(),
            reason_phrase: reason_phrase(StatusCode::NOT_FOUND),
            body: Value::Null,
            headers: BTreeMap::new(),
            path: path.to_string(),
        }
    }

    /// The item failed server-side. Details are logged, never returned.
    pub fn server_error(path: &str) -> Self {
        let status = StatusCode::INTERNAL_SERVER_ERROR;
        Self {
            status_code: status.as_u16(),
            reason_phrase: reason_phrase(status),
            body: json!({ "detail": GENERIC_SERVER_ERROR }),
            headers: BTreeMap::from([(
                header::CONTENT_TYPE.to_string(),
                "application/json".to_string(),
            )]),
            path: path.to_string(),
        }
    }

    /// Collect a handler response into an envelope.
    pub async fn from_response(path: &str, response: Response, limit: usize) -> Self {
        let (parts, body) = response.into_parts();
        let bytes = match axum::body::to_bytes(body, limit).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(path = %path, error = %e, "Failed to read sub-request response body");
                return Self::server_error(path);
            }
        };

        Self {
            status_code: parts.status.as_u16(),
            reason_phrase: reason_phrase(parts.status),
            body: decode_body(path, &parts.headers, &bytes),
            headers: collect_headers(&parts.headers),
            path: path.to_string(),
        }
    }
}

/// Copy headers as strings; repeated names are joined with ", ".
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    out
}

fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
    else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

fn decode_body(path: &str, headers: &HeaderMap, bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    if is_json(headers) {
        match serde_json::from_slice(bytes) {
            Ok(value) => return value,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Sub-request declared JSON but body did not parse");
            }
        }
    }
    Value::String(String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::HeaderValue, response::IntoResponse, Json};

    const LIMIT: usize = 1024;

    #[tokio::test]
    async fn test_json_body_is_parsed() {
        let response = (StatusCode::CREATED, Json(json!({"id": 7}))).into_response();
        let envelope = ResponseEnvelope::from_response("/things", response, LIMIT).await;

        assert_eq!(envelope.status_code, 201);
        assert_eq!(envelope.reason_phrase, "Created");
        assert_eq!(envelope.body, json!({"id": 7}));
        assert_eq!(envelope.headers["content-type"], "application/json");
        assert_eq!(envelope.path, "/things");
    }

    #[tokio::test]
    async fn test_text_and_empty_bodies() {
        let envelope =
            ResponseEnvelope::from_response("/t", "plain words".into_response(), LIMIT).await;
        assert_eq!(envelope.body, json!("plain words"));

        let envelope =
            ResponseEnvelope::from_response("/e", StatusCode::NO_CONTENT.into_response(), LIMIT)
                .await;
        assert_eq!(envelope.status_code, 204);
        assert_eq!(envelope.body, Value::Null);

        let empty_json = Response::builder()
            .header("content-type", "application/json")
            .body(Body::empty())
            .unwrap();
        let envelope = ResponseEnvelope::from_response("/j", empty_json, LIMIT).await;
        assert_eq!(envelope.body, Value::Null);
    }

    #[tokio::test]
    async fn test_broken_json_falls_back_to_text() {
        let response = Response::builder()
            .header("content-type", "application/problem+json; charset=utf-8")
            .body(Body::from("{not json"))
            .unwrap();
        let envelope = ResponseEnvelope::from_response("/p", response, LIMIT).await;
        assert_eq!(envelope.body, json!("{not json"));
    }

    #[tokio::test]
    async fn test_headers_are_copied_unfiltered() {
        let mut response = "x".into_response();
        let headers = response.headers_mut();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.insert("x-internal", HeaderValue::from_static("yes"));

        let envelope = ResponseEnvelope::from_response("/h", response, LIMIT).await;
        assert_eq!(envelope.headers["set-cookie"], "a=1, b=2");
        assert_eq!(envelope.headers["x-internal"], "yes");
    }

    #[tokio::test]
    async fn test_oversized_body_is_a_server_error() {
        let response = "y".repeat(LIMIT + 1).into_response();
        let envelope = ResponseEnvelope::from_response("/big", response, LIMIT).await;
        assert_eq!(envelope, ResponseEnvelope::server_error("/big"));
    }

    #[test]
    fn test_fixed_envelopes() {
        let not_found = ResponseEnvelope::not_found("/missing");
        assert_eq!(not_found.status_code, 404);
        assert_eq!(not_found.reason_phrase, "Not Found");
        assert_eq!(not_found.body, Value::Null);

        let error = ResponseEnvelope::server_error("/boom");
        assert_eq!(error.status_code, 500);
        assert_eq!(error.body, json!({"detail": "A server error occurred."}));
        assert_eq!(reason_phrase(StatusCode::from_u16(599).unwrap()), "Unknown Status Code");
    }
}
