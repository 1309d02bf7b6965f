//! Delta-tracked log pages.
//!
//! Log collections answer `!delta` requests with the new entries plus an
//! `@odata.deltaLink` pointing at the next page. The link is stored as an
//! endpoint relative to the API root so it can be replayed through the
//! transport.

use serde::Deserialize;
use serde_json::Value;

/// One page of a delta-tracked log.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeltaPage {
    /// Entries added since the previous page.
    #[serde(default)]
    pub value: Vec<Value>,
    /// Link to the next page.
    #[serde(rename = "@odata.deltaLink", default)]
    pub delta_link: Option<String>,
}

/// Converts a delta link into an endpoint relative to the API root.
///
/// Everything up to and including `/api/v1/` is dropped.
pub fn delta_link_endpoint(link: &str) -> String {
    match link.find("/api/v1/") {
        Some(pos) => link[pos + "/api/v1/".len()..].to_string(),
        None => link.trim_start_matches('/').to_string(),
    }
}

/// Cursor over a delta-tracked log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogTail {
    next: String,
}

impl LogTail {
    /// Starts a tail from an initial endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            next: endpoint.into(),
        }
    }

    /// Endpoint to request next.
    pub fn next_endpoint(&self) -> &str {
        &self.next
    }

    /// Consumes a page, advancing the cursor when the page carries a delta link.
    pub fn advance(&mut self, page: DeltaPage) -> Vec<Value> {
        if let Some(link) = page.delta_link.as_deref() {
            self.next = delta_link_endpoint(link);
        }
        page.value
    }
}
