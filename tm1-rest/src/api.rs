//! The seam between services and the transport.
//!
//! Services depend on [`RestApi`] rather than on [`crate::RestService`], so
//! they can be driven by an in-memory implementation in tests. The typed
//! helpers in [`RestApiExt`] are available on every implementation.

use async_trait::async_trait;
use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::batch::{BATCH_ENDPOINT, BatchEnvelope, BatchRequest, BatchResponse, normalize_batch_url};
use crate::error::Result;
use crate::options::RequestOptions;
use crate::response::RestResponse;

// ============================================================================
// Request
// ============================================================================

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// JSON document.
    Json(Value),
    /// Raw bytes sent as `application/octet-stream`.
    Raw(Vec<u8>),
}

/// A request relative to the server's base URL.
#[derive(Debug, Clone)]
pub struct RestRequest {
    /// HTTP method.
    pub method: Method,
    /// Endpoint, usually relative to the base URL.
    pub endpoint: String,
    /// Optional body.
    pub body: Option<RequestBody>,
    /// Per-request options.
    pub options: RequestOptions,
}

impl RestRequest {
    /// Creates a request without body.
    pub fn new(method: Method, endpoint: impl Into<String>) -> Self {
        Self {
            method,
            endpoint: endpoint.into(),
            body: None,
            options: RequestOptions::default(),
        }
    }

    /// `GET` request.
    pub fn get(endpoint: impl Into<String>) -> Self {
        Self::new(Method::GET, endpoint)
    }

    /// `POST` request.
    pub fn post(endpoint: impl Into<String>) -> Self {
        Self::new(Method::POST, endpoint)
    }

    /// `PATCH` request.
    pub fn patch(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PATCH, endpoint)
    }

    /// `PUT` request.
    pub fn put(endpoint: impl Into<String>) -> Self {
        Self::new(Method::PUT, endpoint)
    }

    /// `DELETE` request.
    pub fn delete(endpoint: impl Into<String>) -> Self {
        Self::new(Method::DELETE, endpoint)
    }

    /// Sets a JSON body.
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    /// Serializes a value as the JSON body.
    pub fn json_from<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        Ok(self.json(serde_json::to_value(body)?))
    }

    /// Sets a raw body.
    pub fn raw(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(RequestBody::Raw(body.into()));
        self
    }

    /// Replaces the per-request options.
    pub fn options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// JSON body, if any.
    pub fn json_body(&self) -> Option<&Value> {
        match &self.body {
            Some(RequestBody::Json(v)) => Some(v),
            _ => None,
        }
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Sends requests to a TM1 server.
#[async_trait]
pub trait RestApi: Send + Sync {
    /// Sends a request and returns the successful response.
    ///
    /// Statuses of 400 and above come back as [`crate::Tm1Error::Http`].
    async fn send(&self, request: RestRequest) -> Result<RestResponse>;

    /// Server product version, e.g. `11.8.02500.3`.
    fn version(&self) -> &str;
}

/// Typed JSON helpers over [`RestApi`].
#[async_trait]
pub trait RestApiExt: RestApi {
    /// Sends a request and decodes the JSON response.
    async fn request_json<T>(&self, request: RestRequest) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        self.send(request).await?.json().await
    }

    /// Sends a request and drains the response.
    async fn request_discard(&self, request: RestRequest) -> Result<()> {
        self.send(request).await?.discard().await
    }

    /// `GET` and decode.
    async fn get_json<T>(&self, endpoint: &str) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        self.request_json(RestRequest::get(endpoint)).await
    }

    /// `GET` and read the body as text.
    async fn get_text(&self, endpoint: &str) -> Result<String> {
        self.send(RestRequest::get(endpoint)).await?.text().await
    }

    /// `POST` a JSON body and decode the response.
    async fn post_json<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned + Send,
    {
        let request = RestRequest::post(endpoint).json_from(body)?;
        self.request_json(request).await
    }

    /// `POST` a JSON body and discard the response.
    async fn post_discard<B>(&self, endpoint: &str, body: &B) -> Result<()>
    where
        B: Serialize + Sync + ?Sized,
    {
        let request = RestRequest::post(endpoint).json_from(body)?;
        self.request_discard(request).await
    }

    /// `PATCH` a JSON body and discard the response.
    async fn patch_json<B>(&self, endpoint: &str, body: &B) -> Result<()>
    where
        B: Serialize + Sync + ?Sized,
    {
        let request = RestRequest::patch(endpoint).json_from(body)?;
        self.request_discard(request).await
    }

    /// `DELETE` and discard the response.
    async fn delete(&self, endpoint: &str) -> Result<()> {
        self.request_discard(RestRequest::delete(endpoint)).await
    }

    /// Posts a `$batch` payload and returns the inner responses.
    ///
    /// Inner URLs are normalized for the server version.
    async fn batch(&self, requests: Vec<BatchRequest>) -> Result<Vec<BatchResponse>> {
        let version = self.version().to_string();
        let requests: Vec<BatchRequest> = requests
            .into_iter()
            .map(|mut r| {
                r.url = normalize_batch_url(&r.url, &version);
                r
            })
            .collect();

        let request = RestRequest::post(BATCH_ENDPOINT).json(json!({ "requests": requests }));
        let envelope: BatchEnvelope = self.request_json(request).await?;
        Ok(envelope.responses)
    }
}

impl<T: RestApi + ?Sized> RestApiExt for T {}
