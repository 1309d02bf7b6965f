//! Per-request options.

use std::time::Duration;

use reqwest::header::HeaderMap;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::insert_header;
use crate::error::Result;
use crate::odata::{append_query, encode_query};

#[derive(Debug, Clone, PartialEq, Eq)]
enum RequestOp {
    Header(String, String),
    Query(String, String),
}

/// Options for a single request.
///
/// Header and query operations are applied in the order they were added,
/// after the default headers and the auth provider.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    ops: Vec<RequestOp>,
    /// Overrides the client-wide async mode for this request.
    pub async_mode: Option<bool>,
    /// Cancels the request (and any async work on the server) when triggered.
    pub cancel: Option<CancellationToken>,
    /// Overrides the client-wide timeout.
    pub timeout: Option<Duration>,
}

impl RequestOptions {
    /// Creates empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a header, replacing an earlier value with the same name.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(RequestOp::Header(name.into(), value.into()));
        self
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.ops.push(RequestOp::Query(key.into(), value.into()));
        self
    }

    /// Forces async mode on or off.
    pub fn async_mode(mut self, enabled: bool) -> Self {
        self.async_mode = Some(enabled);
        self
    }

    /// Attaches a cancellation token.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Applies the header and query operations.
    pub fn apply(&self, headers: &mut HeaderMap, url: &mut Url) -> Result<()> {
        for op in &self.ops {
            match op {
                RequestOp::Header(name, value) => insert_header(headers, name, value)?,
                RequestOp::Query(key, value) => append_query(url, &encode_query(&[(key, value)])),
            }
        }
        Ok(())
    }

    /// True if the cancellation token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled)
    }
}
