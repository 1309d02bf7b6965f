//! Response wrapper.
//!
//! Successful synchronous responses stay live so callers can stream the body.
//! Async results and mock responses are already buffered.

use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::error::Result;

#[derive(Debug)]
enum Body {
    Live(reqwest::Response),
    Buffered(Option<Vec<u8>>),
}

/// A successful response from the server.
#[derive(Debug)]
pub struct RestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl RestResponse {
    /// Wraps a live response.
    pub fn live(response: reqwest::Response) -> Self {
        Self {
            status: response.status(),
            headers: response.headers().clone(),
            body: Body::Live(response),
        }
    }

    /// Builds a response from an in-memory body.
    pub fn buffered(status: StatusCode, headers: HeaderMap, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers,
            body: Body::Buffered(Some(body.into())),
        }
    }

    /// Shorthand for a buffered JSON response.
    pub fn json_value(status: StatusCode, value: &serde_json::Value) -> Self {
        Self::buffered(status, HeaderMap::new(), value.to_string())
    }

    /// Response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Overrides the status.
    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Reads the next chunk of the body, `None` at the end.
    pub async fn chunk(&mut self) -> Result<Option<Vec<u8>>> {
        match &mut self.body {
            Body::Live(response) => Ok(response.chunk().await?.map(|b| b.to_vec())),
            Body::Buffered(data) => Ok(data.take()),
        }
    }

    /// Reads the whole body.
    pub async fn bytes(self) -> Result<Vec<u8>> {
        match self.body {
            Body::Live(response) => Ok(response.bytes().await?.to_vec()),
            Body::Buffered(data) => Ok(data.unwrap_or_default()),
        }
    }

    /// Reads the body as text.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Decodes the body as JSON.
    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Reads and drops the body.
    pub async fn discard(mut self) -> Result<()> {
        while self.chunk().await?.is_some() {}
        Ok(())
    }
}
