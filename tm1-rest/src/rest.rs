//! The REST transport.
//!
//! [`RestService`] owns the HTTP client, cookie jar, default headers, auth
//! provider and server version. Every request goes through the same
//! pipeline: resolve the endpoint, clone the default headers, apply the auth
//! provider, apply per-request options, then either send it directly or run
//! the async protocol.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::cookie::Jar;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, debug_span, instrument, warn};
use url::Url;

use tm1_core::ServerVersion;

use crate::api::{RequestBody, RestApi, RestRequest};
use crate::async_op::{
    ASYNC_RESULT_HEADER, AsyncStart, PREFER_ASYNC, PollSchedule, PollState, async_endpoint,
    async_result_status, extract_async_id, is_embedded_http,
};
use crate::auth::{
    AuthProvider, PA_SESSION_COOKIE, TM1_SESSION_COOKIE, find_cookie, resolve_provider,
};
use crate::batch::{is_batch_endpoint, normalize_batch_payload};
use crate::config::{Tm1Config, insert_header};
use crate::error::{HttpError, Result, Tm1Error};
use crate::odata::resolve_url;
use crate::options::RequestOptions;
use crate::response::RestResponse;

/// Error bodies are read up to this many bytes.
const MAX_ERROR_BODY: usize = 64 * 1024;

const PREFER: HeaderName = HeaderName::from_static("prefer");

const LOGOUT_ENDPOINT: &str = "/ActiveSession/tm1.Close";
const VERSION_ENDPOINT: &str = "/Configuration/ProductVersion/$value";
const VERSION_JSON_ENDPOINT: &str = "/Configuration/ProductVersion";

// ============================================================================
// Builder
// ============================================================================

/// Builds a [`RestService`] with client-level options.
#[derive(Debug)]
pub struct RestServiceBuilder {
    config: Tm1Config,
    auth: Option<AuthProvider>,
    headers: Vec<(String, String)>,
    span: Option<Span>,
    version: Option<String>,
    poll_schedule: PollSchedule,
}

impl RestServiceBuilder {
    /// Starts a builder from a configuration.
    pub fn new(config: Tm1Config) -> Self {
        Self {
            config,
            auth: None,
            headers: Vec::new(),
            span: None,
            version: None,
            poll_schedule: PollSchedule::default(),
        }
    }

    /// Uses this auth provider instead of deriving one from the credentials.
    pub fn auth_provider(mut self, provider: AuthProvider) -> Self {
        self.auth = Some(provider);
        self
    }

    /// Adds a default header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Parents every request span to `span`.
    pub fn span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Uses a known server version and skips the version probe.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Replaces the async poll schedule.
    pub fn poll_schedule(mut self, schedule: PollSchedule) -> Self {
        self.poll_schedule = schedule;
        self
    }

    /// Builds the HTTP client, acquires credentials and reads the server version.
    #[instrument(skip(self))]
    pub async fn build(self) -> Result<RestService> {
        let config = self.config;
        let base_url = config.base_url()?;

        let mut default_headers = config.default_headers()?;
        for (name, value) in &self.headers {
            insert_header(&mut default_headers, name, value)?;
        }

        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .timeout(config.timeout())
            .pool_max_idle_per_host(config.connection_pool_size)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()?;

        if config.reconnect_on_session_timeout || config.reconnect_on_remote_disconnect {
            debug!("Reconnect flags are set; session errors are still surfaced to the caller");
        }

        let auth = match self.auth {
            Some(provider) => Some(provider),
            None => resolve_provider(&config, &client, &jar).await?,
        };

        let mut service = RestService {
            client,
            jar,
            config: Arc::new(config),
            base_url,
            default_headers,
            auth,
            version: ServerVersion::default(),
            span: self.span,
            poll_schedule: self.poll_schedule,
        };

        service.version = match self.version {
            Some(version) => ServerVersion::new(version),
            None => service.fetch_product_version().await?,
        };
        debug!(version = %service.version, base_url = %service.base_url, "Connected");

        Ok(service)
    }
}

// ============================================================================
// Service
// ============================================================================

/// HTTP transport to one TM1 server.
///
/// Cheap to clone; clones share the connection pool and cookie jar.
#[derive(Debug, Clone)]
pub struct RestService {
    client: Client,
    jar: Arc<Jar>,
    config: Arc<Tm1Config>,
    base_url: Url,
    default_headers: HeaderMap,
    auth: Option<AuthProvider>,
    version: ServerVersion,
    span: Option<Span>,
    poll_schedule: PollSchedule,
}

struct Prepared {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<RequestBody>,
    cancel: Option<CancellationToken>,
    timeout: Duration,
}

impl RestService {
    /// Connects with the credentials declared in `config`.
    pub async fn connect(config: Tm1Config) -> Result<Self> {
        RestServiceBuilder::new(config).build().await
    }

    /// Starts a builder.
    pub fn builder(config: Tm1Config) -> RestServiceBuilder {
        RestServiceBuilder::new(config)
    }

    /// Base URL, always ending with `/`.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Configuration the service was built from.
    pub fn config(&self) -> &Tm1Config {
        &self.config
    }

    /// Server version.
    pub fn server_version(&self) -> &ServerVersion {
        &self.version
    }

    /// Current session ID, or an empty string when there is none.
    pub fn session_id(&self) -> String {
        [TM1_SESSION_COOKIE, PA_SESSION_COOKIE]
            .iter()
            .find_map(|name| find_cookie(&self.jar, &self.base_url, name))
            .unwrap_or_default()
    }

    fn request_span(&self, request: &RestRequest) -> Span {
        match &self.span {
            Some(parent) => debug_span!(
                parent: parent,
                "tm1_request",
                method = %request.method,
                endpoint = %request.endpoint
            ),
            None => debug_span!(
                "tm1_request",
                method = %request.method,
                endpoint = %request.endpoint
            ),
        }
    }

    // ------------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------------

    fn prepare(&self, request: RestRequest, async_mode: bool) -> Result<Prepared> {
        let RestRequest {
            method,
            endpoint,
            mut body,
            options,
        } = request;

        let mut url = resolve_url(&self.base_url, &endpoint)?;
        let mut headers = self.default_headers.clone();

        if let Some(auth) = &self.auth {
            auth.apply(&mut headers).map_err(|e| match e {
                e @ Tm1Error::Auth(_) => e,
                other => Tm1Error::Auth(other.to_string()),
            })?;
        }

        options.apply(&mut headers, &mut url)?;

        if async_mode {
            headers.insert(PREFER, HeaderValue::from_static(PREFER_ASYNC));
        }

        if method == Method::POST && is_batch_endpoint(&endpoint) {
            if let Some(RequestBody::Json(payload)) = &mut body {
                normalize_batch_payload(payload, self.version.as_str());
            }
        }

        Ok(Prepared {
            method,
            url,
            headers,
            body,
            cancel: options.cancel,
            timeout: options.timeout.unwrap_or_else(|| self.config.timeout()),
        })
    }

    /// Sends a prepared request and checks the status.
    async fn execute(&self, prepared: Prepared) -> Result<RestResponse> {
        let Prepared {
            method,
            url,
            mut headers,
            body,
            cancel,
            timeout,
        } = prepared;

        let mut builder = self.client.request(method.clone(), url.clone()).timeout(timeout);
        match body {
            Some(RequestBody::Json(value)) => {
                builder = builder.body(serde_json::to_vec(&value)?);
            }
            Some(RequestBody::Raw(bytes)) => {
                headers.insert(
                    header::CONTENT_TYPE,
                    HeaderValue::from_static("application/octet-stream"),
                );
                builder = builder.body(bytes);
            }
            None => {}
        }
        builder = builder.headers(headers);

        debug!(method = %method, url = %url, "Sending request");
        let sent = builder.send();
        let result = match &cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => return Err(Tm1Error::Cancelled),
                result = sent => result,
            },
            None => sent.await,
        };

        let response = result.map_err(|e| {
            if e.is_timeout() {
                Tm1Error::Timeout(timeout)
            } else {
                Tm1Error::Transport(e)
            }
        })?;
        debug!(status = %response.status(), "Response received");

        check_status(&method, &url, response).await
    }

    async fn send_sync(&self, request: RestRequest) -> Result<RestResponse> {
        let prepared = self.prepare(request, false)?;
        self.execute(prepared).await
    }

    // ------------------------------------------------------------------------
    // Async Protocol
    // ------------------------------------------------------------------------

    async fn start_async(&self, request: RestRequest) -> Result<AsyncStart> {
        let prepared = self.prepare(request, true)?;
        let response = self.execute(prepared).await?;

        let id = response
            .headers()
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(extract_async_id);

        match id {
            Some(id) => {
                debug!(async_id = %id, "Async request accepted");
                Ok(AsyncStart::Accepted(id))
            }
            None => Ok(AsyncStart::Completed(response)),
        }
    }

    /// Sends a request in async mode and returns the async ID without waiting.
    pub async fn request_async_id(&self, request: RestRequest) -> Result<String> {
        match self.start_async(request).await? {
            AsyncStart::Accepted(id) => Ok(id),
            AsyncStart::Completed(response) => Err(Tm1Error::InvalidResponse(format!(
                "no async ID in response with status {}",
                response.status()
            ))),
        }
    }

    /// Polls an async operation once.
    ///
    /// Returns `None` while the server still reports `202`.
    #[instrument(skip(self))]
    pub async fn poll_async(&self, id: &str) -> Result<Option<RestResponse>> {
        self.poll_with(id, RequestOptions::new()).await
    }

    async fn poll_with(&self, id: &str, options: RequestOptions) -> Result<Option<RestResponse>> {
        let endpoint = async_endpoint(id);
        let prepared = self.prepare(RestRequest::get(&endpoint).options(options), false)?;
        let url = prepared.url.clone();
        let response = self.execute(prepared).await?;

        match PollState::from_status(response.status()) {
            PollState::Running => Ok(None),
            PollState::Complete => self.finish_async(&url, response).await.map(Some),
            PollState::Failed => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                Err(HttpError {
                    method: Method::GET,
                    url: url.to_string(),
                    status,
                    body,
                }
                .into())
            }
        }
    }

    async fn finish_async(&self, url: &Url, response: RestResponse) -> Result<RestResponse> {
        let mut status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        if is_embedded_http(&body) {
            debug!("Async result wraps a complete HTTP response");
            return Ok(RestResponse::buffered(status, headers, body));
        }

        if let Some(result) = async_result_status(&headers) {
            debug!(status = %result, header = ASYNC_RESULT_HEADER, "Async result status");
            status = result;
        }

        if status.as_u16() >= 400 {
            return Err(HttpError {
                method: Method::GET,
                url: url.to_string(),
                status,
                body: truncate_body(&body),
            }
            .into());
        }

        Ok(RestResponse::buffered(status, headers, body))
    }

    /// Cancels an async operation on the server.
    #[instrument(skip(self))]
    pub async fn cancel_async(&self, id: &str) -> Result<()> {
        self.send_sync(RestRequest::delete(async_endpoint(id)))
            .await?
            .discard()
            .await
    }

    async fn cancel_quietly(&self, id: &str) {
        if let Err(e) = self.cancel_async(id).await {
            warn!(async_id = %id, error = %e, "Failed to cancel async operation");
        }
    }

    async fn timed_out(&self, id: &str, timeout: Duration) -> Result<RestResponse> {
        if self.config.cancel_at_timeout {
            self.cancel_quietly(id).await;
        }
        Err(Tm1Error::Timeout(timeout))
    }

    /// Polls until the operation completes, fails, is cancelled or times out.
    ///
    /// The cancel token and the deadline also bound each poll request.
    pub async fn wait_async(
        &self,
        id: &str,
        cancel: Option<CancellationToken>,
        timeout: Duration,
    ) -> Result<RestResponse> {
        let deadline = Instant::now() + timeout;
        let cancel = cancel.unwrap_or_default();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.timed_out(id, timeout).await;
            }
            let delay = self.poll_schedule.delay_for_attempt(attempt).min(remaining);

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    self.cancel_quietly(id).await;
                    return Err(Tm1Error::Cancelled);
                }
                () = tokio::time::sleep(delay) => {}
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return self.timed_out(id, timeout).await;
            }
            let options = RequestOptions::new()
                .cancel_token(cancel.clone())
                .timeout(remaining);

            match self.poll_with(id, options).await {
                Ok(Some(response)) => return Ok(response),
                Ok(None) => {}
                Err(Tm1Error::Cancelled) => {
                    self.cancel_quietly(id).await;
                    return Err(Tm1Error::Cancelled);
                }
                Err(Tm1Error::Timeout(_)) => return self.timed_out(id, timeout).await,
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_async(&self, request: RestRequest) -> Result<RestResponse> {
        let cancel = request.options.cancel.clone();
        let timeout = request
            .options
            .timeout
            .unwrap_or_else(|| self.config.timeout());

        match self.start_async(request).await? {
            AsyncStart::Accepted(id) => self.wait_async(&id, cancel, timeout).await,
            AsyncStart::Completed(response) => Ok(response),
        }
    }

    // ------------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------------

    async fn fetch_product_version(&self) -> Result<ServerVersion> {
        match self.send_sync(RestRequest::get(VERSION_ENDPOINT)).await {
            Ok(response) => Ok(ServerVersion::new(response.text().await?.trim())),
            Err(e) if e.is_not_found() => {
                #[derive(serde::Deserialize)]
                struct Wrapped {
                    value: String,
                }
                let wrapped: Wrapped = self
                    .send_sync(RestRequest::get(VERSION_JSON_ENDPOINT))
                    .await?
                    .json()
                    .await?;
                Ok(ServerVersion::new(wrapped.value))
            }
            Err(e) => Err(e),
        }
    }

    /// Closes the server session.
    ///
    /// Skipped when `keep_alive` is set. Always synchronous; a `404` means
    /// the session is already gone.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<()> {
        if self.config.keep_alive {
            debug!("Keep-alive set, leaving session open");
            return Ok(());
        }

        match self.send_sync(RestRequest::post(LOGOUT_ENDPOINT)).await {
            Ok(response) => response.discard().await,
            Err(e) if e.is_not_found() => {
                debug!("Session already closed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Logs out and drops this handle.
    ///
    /// The connection pool is released once every clone is dropped; clones
    /// still send requests, now outside the closed session.
    pub async fn close(self) -> Result<()> {
        self.logout().await
    }
}

#[async_trait]
impl RestApi for RestService {
    async fn send(&self, request: RestRequest) -> Result<RestResponse> {
        let span = self.request_span(&request);
        let async_mode = request
            .options
            .async_mode
            .unwrap_or(self.config.async_requests_mode);

        if request.options.is_cancelled() {
            return Err(Tm1Error::Cancelled);
        }

        if async_mode {
            self.send_async(request).instrument(span).await
        } else {
            self.send_sync(request).instrument(span).await
        }
    }

    fn version(&self) -> &str {
        self.version.as_str()
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn truncate_body(body: &[u8]) -> String {
    let end = body.len().min(MAX_ERROR_BODY);
    String::from_utf8_lossy(&body[..end]).into_owned()
}

/// Turns a status of 400 or above into an [`HttpError`], reading at most
/// [`MAX_ERROR_BODY`] bytes of the body.
async fn check_status(
    method: &Method,
    url: &Url,
    response: reqwest::Response,
) -> Result<RestResponse> {
    let status = response.status();
    if status.as_u16() < 400 {
        return Ok(RestResponse::live(response));
    }

    let mut response = RestResponse::live(response);
    let mut body = Vec::new();
    while body.len() < MAX_ERROR_BODY {
        match response.chunk().await {
            Ok(Some(chunk)) => body.extend_from_slice(&chunk),
            Ok(None) | Err(_) => break,
        }
    }

    warn!(method = %method, url = %url, status = %status, "Request failed");
    Err(HttpError {
        method: method.clone(),
        url: url.to_string(),
        status,
        body: truncate_body(&body),
    }
    .into())
}
