// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # TM1 REST
//!
//! HTTP transport for the TM1 / Planning Analytics REST API.
//!
//! ## Connecting
//!
//! - [`Tm1Config`] - Where the server lives and how to authenticate
//! - [`Topology`] - The five deployment shapes and their base URLs
//! - [`AuthMode`] / [`AuthProvider`] - Credential selection and request signing
//! - [`RestService`] - The transport: cookie jar, default headers, async protocol
//!
//! ## Requests
//!
//! Services talk to the server through the [`RestApi`] trait, which
//! [`RestService`] implements. [`RestApiExt`] adds typed JSON helpers.
//!
//! ## Example
//!
//! ```ignore
//! use tm1_rest::{RestApiExt, RestService, Tm1Config};
//!
//! let config = Tm1Config {
//!     address: Some("localhost".into()),
//!     port: Some(8010),
//!     user: Some("admin".into()),
//!     password: Some("apple".into()),
//!     ..Default::default()
//! };
//! let tm1 = RestService::connect(config).await?;
//! let names: serde_json::Value = tm1.get_json("/Cubes?$select=Name").await?;
//! tm1.close().await?;
//! ```

pub mod api;
pub mod async_op;
pub mod auth;
pub mod batch;
pub mod config;
pub mod error;
pub mod odata;
pub mod options;
pub mod response;
pub mod rest;

// Transport
pub use api::{RequestBody, RestApi, RestApiExt, RestRequest};
pub use async_op::PollSchedule;
pub use options::RequestOptions;
pub use response::RestResponse;
pub use rest::{RestService, RestServiceBuilder};

// Configuration & auth
pub use auth::AuthProvider;
pub use config::{AuthMode, Tm1Config, Topology, TopologyKind};

// Batch
pub use batch::{BatchRequest, BatchResponse, normalize_batch_url};

// Errors
pub use error::{HttpError, Result, Tm1Error};

// URL helpers
pub use odata::{add_sandbox, encode_query, quote};

// Third-party types in the public API
pub use reqwest::header::HeaderMap;
pub use reqwest::{Method, StatusCode};
pub use tokio_util::sync::CancellationToken;
