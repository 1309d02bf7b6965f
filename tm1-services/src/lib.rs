// Lint configuration for this crate
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

//! # TM1 Services
//!
//! Services on top of the TM1 REST transport.
//!
//! ## Services
//!
//! - [`CellService`] - MDX and view queries through server-side cellsets, cell writes
//! - [`ChoreService`] - Chore CRUD and the deactivate / mutate / reactivate envelope
//! - [`CubeService`] - Dimension lookup and version-gated cube actions
//! - [`ServerService`] - Product version, SaveData, log tailing
//! - [`JobService`] / [`ThreadService`] - Running work, v12 and pre-v12 respectively
//! - [`FileService`] - Files or Blobs, depending on the server version
//! - [`UserService`] - The active user and privilege checks
//!
//! Every service holds an `Arc<dyn RestApi>`; [`Tm1Service`] hands them out
//! over one shared connection.
//!
//! ## Example
//!
//! ```ignore
//! use tm1_rest::Tm1Config;
//! use tm1_services::Tm1Service;
//!
//! let tm1 = Tm1Service::connect(config).await?;
//! let cells = tm1.cells().execute_mdx("SELECT ...", &[], None).await?;
//! tm1.close().await?;
//! ```

pub mod cell;
pub mod chore;
pub mod cube;
pub mod file;
pub mod job;
pub mod server;
pub mod thread;
pub mod user;

mod common;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use tm1_rest::{RestApi, RestService, Result, Tm1Config};

pub use cell::CellService;
pub use chore::ChoreService;
pub use cube::CubeService;
pub use file::{ContentEntry, FileService};
pub use job::{Job, JobService};
pub use server::{LogKind, ServerService};
pub use thread::{ServerThread, ThreadService};
pub use user::UserService;

/// One connection and the services that share it.
#[derive(Debug, Clone)]
pub struct Tm1Service {
    rest: Arc<RestService>,
}

impl Tm1Service {
    /// Connects with the given configuration.
    pub async fn connect(config: Tm1Config) -> Result<Self> {
        Ok(Self::from_rest(RestService::connect(config).await?))
    }

    /// Wraps an existing transport.
    pub fn from_rest(rest: RestService) -> Self {
        Self {
            rest: Arc::new(rest),
        }
    }

    /// The underlying transport.
    pub fn rest(&self) -> &RestService {
        &self.rest
    }

    /// Server product version.
    pub fn version(&self) -> &str {
        self.rest.version()
    }

    fn api(&self) -> Arc<dyn RestApi> {
        self.rest.clone()
    }

    /// Cellset queries and cell writes.
    pub fn cells(&self) -> CellService {
        CellService::new(self.api())
    }

    /// Chores.
    pub fn chores(&self) -> ChoreService {
        ChoreService::new(self.api())
    }

    /// Cubes.
    pub fn cubes(&self) -> CubeService {
        CubeService::new(self.api())
    }

    /// Server-wide operations.
    pub fn server(&self) -> ServerService {
        ServerService::new(self.api())
    }

    /// Jobs. v12 only.
    pub fn jobs(&self) -> JobService {
        JobService::new(self.api())
    }

    /// Threads. Before v12 only.
    pub fn threads(&self) -> ThreadService {
        ThreadService::new(self.api())
    }

    /// Server-side files.
    pub fn files(&self) -> FileService {
        FileService::new(self.api())
    }

    /// The active user.
    pub fn users(&self) -> UserService {
        UserService::new(self.api())
    }

    /// Ends the server session unless `keep_alive` is set.
    pub async fn logout(&self) -> Result<()> {
        self.rest.logout().await
    }

    /// Logs out and drops this handle.
    ///
    /// Clones share the session and keep the connection pool until they are
    /// dropped too.
    pub async fn close(self) -> Result<()> {
        self.rest.logout().await
    }
}
