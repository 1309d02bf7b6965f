//! Server threads. Removed in v12.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tm1_core::Capability;
use tm1_rest::{RestApi, RestApiExt, Result};
use tracing::instrument;

use crate::common::{ValueList, require};
use crate::user::UserService;

/// A server thread.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerThread {
    /// Thread ID.
    #[serde(rename = "ID")]
    pub id: i64,
    /// Thread type, e.g. `User`.
    #[serde(rename = "Type", default)]
    pub thread_type: String,
    /// User that owns the thread.
    #[serde(default)]
    pub name: String,
    /// `Idle`, `Run`, `Wait`, ...
    #[serde(default)]
    pub state: String,
    /// Function being executed.
    #[serde(default)]
    pub function: String,
    /// Remaining fields as sent by the server.
    #[serde(flatten)]
    pub details: serde_json::Map<String, Value>,
}

/// Lists and cancels server threads.
#[derive(Clone)]
pub struct ThreadService {
    rest: Arc<dyn RestApi>,
    users: UserService,
}

impl ThreadService {
    /// Creates the service.
    pub fn new(rest: Arc<dyn RestApi>) -> Self {
        Self {
            users: UserService::new(Arc::clone(&rest)),
            rest,
        }
    }

    /// Threads currently on the server.
    pub async fn list(&self) -> Result<Vec<ServerThread>> {
        require(self.rest.as_ref(), Capability::Threads)?;
        let threads: ValueList<ServerThread> = self.rest.get_json("/Threads").await?;
        Ok(threads.value)
    }

    /// Cancels the operation running on a thread. Admin required.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: i64) -> Result<()> {
        require(self.rest.as_ref(), Capability::Threads)?;
        self.users.require_admin().await?;
        let endpoint = format!("/Threads('{id}')/tm1.CancelOperation");
        self.rest.post_discard(&endpoint, &json!({})).await
    }
}
