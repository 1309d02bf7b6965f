//! `$batch` payloads and URL normalization.
//!
//! v11 servers expect every inner URL to carry the `/api/v1` prefix; v12
//! servers resolve inner URLs against the database root and only need a
//! leading `/`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tm1_core::{V12, is_version_at_least};

/// Endpoint of the batch action.
pub const BATCH_ENDPOINT: &str = "/$batch";

const API_PREFIX: &str = "/api/v1";

/// One request inside a `$batch` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    /// Caller-chosen ID, echoed in the response.
    pub id: String,
    /// HTTP method.
    pub method: String,
    /// Request URL, relative to the server.
    pub url: String,
    /// Request headers.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// JSON body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl BatchRequest {
    /// Creates a request without body or headers.
    pub fn new(id: impl Into<String>, method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Sets a JSON body and the matching content type.
    pub fn with_body(mut self, body: Value) -> Self {
        self.headers
            .insert("Content-Type".to_string(), "application/json".to_string());
        self.body = Some(body);
        self
    }
}

/// One response inside a `$batch` answer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BatchResponse {
    /// ID of the matching request.
    pub id: String,
    /// HTTP status.
    pub status: u16,
    /// Response headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Response body.
    #[serde(default)]
    pub body: Option<Value>,
}

impl BatchResponse {
    /// True for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct BatchEnvelope {
    #[serde(default)]
    pub responses: Vec<BatchResponse>,
}

/// Normalizes an inner batch URL for a server version.
///
/// Query strings are preserved, and applying the function twice yields the
/// same result as applying it once.
pub fn normalize_batch_url(url: &str, version: &str) -> String {
    let trimmed = url.trim_start_matches('/');

    if is_version_at_least(version, V12) {
        return format!("/{trimmed}");
    }

    if url.starts_with(API_PREFIX) {
        url.to_string()
    } else if trimmed.starts_with(&API_PREFIX[1..]) {
        format!("/{trimmed}")
    } else {
        format!("{API_PREFIX}/{trimmed}")
    }
}

/// Normalizes the URL of every request in a `{"requests": [...]}` payload.
pub fn normalize_batch_payload(payload: &mut Value, version: &str) {
    let Some(requests) = payload.get_mut("requests").and_then(Value::as_array_mut) else {
        return;
    };
    for request in requests {
        if let Some(Value::String(url)) = request.get_mut("url") {
            *url = normalize_batch_url(url, version);
        }
    }
}

/// True if an endpoint addresses the batch action.
pub fn is_batch_endpoint(endpoint: &str) -> bool {
    let path = endpoint.split('?').next().unwrap_or_default();
    path.trim_end_matches('/').ends_with("$batch")
}
