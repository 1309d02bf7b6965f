//! Chore orchestration.
//!
//! Most chore mutations are refused while the chore is active, so they run
//! inside [`ChoreService::with_deactivated`]: the chore is deactivated, the
//! mutation runs, and the active flag is restored whatever the outcome.

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde_json::{Value, json};
use tm1_core::{Chore, ChoreTask, local_start_time_body};
use tm1_rest::{RestApi, RestApiExt, Result, Tm1Error, quote};
use tracing::{debug, info, instrument, warn};

use crate::common::NameList;

const CHORE_EXPAND: &str = "$expand=Tasks($expand=*,Process($select=Name),Chore($select=Name))";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ActiveFlag {
    #[serde(default)]
    active: bool,
}

/// Chore operations.
#[derive(Clone)]
pub struct ChoreService {
    rest: Arc<dyn RestApi>,
}

impl ChoreService {
    /// Creates the service.
    pub fn new(rest: Arc<dyn RestApi>) -> Self {
        Self { rest }
    }

    fn endpoint(name: &str) -> String {
        format!("/Chores('{}')", quote(name))
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Fetches a chore with its tasks.
    pub async fn get(&self, name: &str) -> Result<Chore> {
        let mut chore: Chore = self
            .rest
            .get_json(&format!("{}?{CHORE_EXPAND}", Self::endpoint(name)))
            .await?;
        chore.reindex_tasks();
        Ok(chore)
    }

    /// Names of all chores.
    pub async fn get_all_names(&self) -> Result<Vec<String>> {
        let list: NameList = self.rest.get_json("/Chores?$select=Name").await?;
        Ok(list.into_names())
    }

    /// Returns false when the chore does not exist.
    pub async fn exists(&self, name: &str) -> Result<bool> {
        match self
            .rest
            .get_text(&format!("{}?$select=Name", Self::endpoint(name)))
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn is_active(&self, name: &str) -> Result<bool> {
        let flag: ActiveFlag = self
            .rest
            .get_json(&format!("{}?$select=Active", Self::endpoint(name)))
            .await?;
        Ok(flag.active)
    }

    // ------------------------------------------------------------------------
    // Simple Actions
    // ------------------------------------------------------------------------

    async fn action(&self, name: &str, action: &str) -> Result<()> {
        let endpoint = format!("{}/{action}", Self::endpoint(name));
        self.rest.post_discard(&endpoint, &json!({})).await
    }

    /// Activates the chore.
    pub async fn activate(&self, name: &str) -> Result<()> {
        self.action(name, "tm1.Activate").await
    }

    /// Deactivates the chore.
    pub async fn deactivate(&self, name: &str) -> Result<()> {
        self.action(name, "tm1.Deactivate").await
    }

    /// Runs the chore now.
    #[instrument(skip(self))]
    pub async fn execute(&self, name: &str) -> Result<()> {
        self.action(name, "tm1.Execute").await
    }

    /// Deletes the chore.
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.rest.delete(&Self::endpoint(name)).await
    }

    // ------------------------------------------------------------------------
    // Envelope
    // ------------------------------------------------------------------------

    /// Runs `f` with the chore deactivated.
    ///
    /// Afterwards the chore is activated when it was active before or when
    /// `activate` is set, even if `f` failed. If both `f` and the
    /// activation fail the result is [`Tm1Error::Reactivation`]; if only the
    /// activation fails its error is returned alone.
    #[instrument(skip(self, f))]
    pub async fn with_deactivated<F, Fut, T>(&self, name: &str, activate: bool, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let was_active = self.is_active(name).await?;
        let target_active = was_active || activate;

        if was_active {
            self.deactivate(name).await?;
            info!(chore = %name, "Chore deactivated");
        }

        let outcome = f().await;

        if !target_active {
            return outcome;
        }

        match (outcome, self.activate(name).await) {
            (outcome, Ok(())) => {
                info!(chore = %name, "Chore activated");
                outcome
            }
            (Ok(_), Err(reactivation)) => {
                warn!(chore = %name, error = %reactivation, "Chore reactivation failed");
                Err(reactivation)
            }
            (Err(inner), Err(reactivation)) => {
                warn!(chore = %name, error = %reactivation, "Chore reactivation failed");
                Err(Tm1Error::Reactivation {
                    inner: Box::new(inner),
                    reactivation: Box::new(reactivation),
                })
            }
        }
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    /// Creates a chore with its tasks.
    ///
    /// For DST-sensitive chores the local start time is set afterwards.
    #[instrument(skip(self, chore), fields(chore = %chore.name))]
    pub async fn create(&self, chore: &Chore) -> Result<()> {
        self.rest
            .post_discard("/Chores", &chore.create_body())
            .await?;

        if chore.dst_sensitive {
            if let Some(start) = chore.parsed_start_time()? {
                self.set_local_start_time(&chore.name, &start).await?;
            }
        }
        Ok(())
    }

    /// Updates the chore's settings and reconciles its task list.
    #[instrument(skip(self, chore), fields(chore = %chore.name, tasks = chore.tasks.len()))]
    pub async fn update(&self, chore: &Chore) -> Result<()> {
        self.with_deactivated(&chore.name, chore.active, || self.apply_update(chore))
            .await
    }

    /// Updates the chore when it exists and creates it otherwise.
    pub async fn update_or_create(&self, chore: &Chore) -> Result<()> {
        if self.exists(&chore.name).await? {
            self.update(chore).await
        } else {
            self.create(chore).await
        }
    }

    /// Sets the start time in server-local wall-clock time.
    #[instrument(skip(self))]
    pub async fn set_local_start_time(&self, name: &str, start: &NaiveDateTime) -> Result<()> {
        self.with_deactivated(name, false, || self.post_local_start_time(name, start))
            .await
    }

    async fn post_local_start_time(&self, name: &str, start: &NaiveDateTime) -> Result<()> {
        let endpoint = format!("{}/tm1.SetServerLocalStartTime", Self::endpoint(name));
        self.rest
            .post_discard(&endpoint, &local_start_time_body(start))
            .await
    }

    async fn apply_update(&self, chore: &Chore) -> Result<()> {
        let base = Self::endpoint(&chore.name);

        // Stays inactive until the envelope closes.
        let mut settings = chore.update_body();
        settings["Active"] = Value::Bool(false);
        self.rest.patch_json(&base, &settings).await?;

        let old_count: usize = self
            .rest
            .get_text(&format!("{base}/Tasks/$count"))
            .await?
            .trim()
            .parse()
            .map_err(|_| Tm1Error::InvalidResponse("task count is not a number".into()))?;

        for (i, desired) in chore.tasks.iter().enumerate() {
            if i >= old_count {
                debug!(step = i, process = %desired.process_name, "Adding task");
                self.rest
                    .post_discard(&format!("{base}/Tasks"), &desired.body())
                    .await?;
                continue;
            }

            let current: ChoreTask = self
                .rest
                .get_json(&format!("{base}/Tasks({i})?$expand=*,Process($select=Name)"))
                .await?;
            if !current.same_work_as(desired) {
                debug!(step = i, process = %desired.process_name, "Replacing task");
                self.rest
                    .patch_json(&format!("{base}/Tasks({i})"), &desired.body())
                    .await?;
            }
        }

        // The server reindexes after each delete, so the tail index is stable.
        let tail = chore.tasks.len();
        for _ in tail..old_count {
            self.rest.delete(&format!("{base}/Tasks({tail})")).await?;
        }

        if chore.dst_sensitive {
            if let Some(start) = chore.parsed_start_time()? {
                self.post_local_start_time(&chore.name, &start).await?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
