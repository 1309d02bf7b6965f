//! Jobs. v12 only.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Value, json};
use tm1_core::Capability;
use tm1_rest::{RestApi, RestApiExt, Result, quote};

use crate::common::{ValueList, require};

/// A running job.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Job {
    /// Job ID.
    #[serde(rename = "ID")]
    pub id: Value,
    /// Remaining fields as sent by the server.
    #[serde(flatten)]
    pub details: serde_json::Map<String, Value>,
}

/// Lists and cancels jobs.
#[derive(Clone)]
pub struct JobService {
    rest: Arc<dyn RestApi>,
}

impl JobService {
    /// Creates the service.
    pub fn new(rest: Arc<dyn RestApi>) -> Self {
        Self { rest }
    }

    /// Jobs currently on the server.
    pub async fn list(&self) -> Result<Vec<Job>> {
        require(self.rest.as_ref(), Capability::Jobs)?;
        let jobs: ValueList<Job> = self.rest.get_json("/Jobs").await?;
        Ok(jobs.value)
    }

    /// Cancels a job.
    pub async fn cancel(&self, id: &str) -> Result<()> {
        require(self.rest.as_ref(), Capability::Jobs)?;
        let endpoint = format!("/Jobs('{}')/tm1.Cancel", quote(id));
        self.rest.post_discard(&endpoint, &json!({})).await
    }
}
