//! Tracking backends
//!
//! A [`TrackingClient`] is the only way the recorder talks to a backend.
//! Three implementations ship:
//! - [`RestClient`] - MLflow REST API 2.0 over HTTP
//! - [`FileStore`] - local directory store (the default, `./run-records`)
//! - [`MemoryTracker`] - process-local store for tests and dry runs
//!
//! # Example
//!
//! ```rust
//! use run_recorder::experiment::{MetricRecord, RunStatus};
//! use run_recorder::tracking::{MemoryTracker, NewRun, TrackingClient};
//!
//! # async fn example() -> run_recorder::Result<()> {
//! let tracker = MemoryTracker::new();
//! let run = tracker.create_run(NewRun::new("0", "demo")).await?;
//! tracker.log_metric(run.run_id(), &MetricRecord::new("auroch", 0.123)).await?;
//! tracker.update_run(run.run_id(), RunStatus::Finished, chrono::Utc::now()).await?;
//! # Ok(())
//! # }
//! ```

mod artifact;
mod file;
mod memory;
mod rest;

pub use artifact::ArtifactLocation;
pub use file::FileStore;
pub use memory::MemoryTracker;
pub use rest::RestClient;

use std::future::Future;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::config::{ExperimentSelector, TrackingConfig, TrackingUri};
use crate::experiment::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord, RunStatus, TagRecord,
};
use crate::Result;

/// Request to create a run.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRun {
    /// Parent experiment
    pub experiment_id: String,
    /// Human-readable run name
    pub run_name: String,
    /// Tags attached at creation time
    pub tags: Vec<TagRecord>,
    /// Wall-clock start time
    pub start_time: DateTime<Utc>,
}

impl NewRun {
    /// Create a run request starting now, without tags.
    #[must_use]
    pub fn new(experiment_id: impl Into<String>, run_name: impl Into<String>) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            run_name: run_name.into(),
            tags: Vec::new(),
            start_time: Utc::now(),
        }
    }

    /// Attach creation-time tags.
    #[must_use]
    pub fn with_tags(mut self, tags: Vec<TagRecord>) -> Self {
        self.tags = tags;
        self
    }
}

/// Client for an experiment-tracking backend.
///
/// Every call is a single request against the backend; nothing is
/// buffered or retried.
pub trait TrackingClient: Send + Sync {
    /// Look up an experiment by name, creating it if it does not exist.
    fn resolve_experiment(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<ExperimentRecord>> + Send;

    /// Create a run in `Running` status.
    fn create_run(&self, run: NewRun) -> impl Future<Output = Result<RunRecord>> + Send;

    /// Record a param. Params are write-once per run.
    fn log_param(
        &self,
        run_id: &str,
        param: &ParamRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Record a metric point.
    fn log_metric(
        &self,
        run_id: &str,
        metric: &MetricRecord,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Set a tag, overwriting any previous value.
    fn set_tag(&self, run_id: &str, tag: &TagRecord) -> impl Future<Output = Result<()>> + Send;

    /// Upload a local file under the run's artifact root.
    ///
    /// The file keeps its name; `artifact_dir` optionally nests it in a
    /// subdirectory of the artifact root.
    fn log_artifact(
        &self,
        run: &RunRecord,
        local_path: &Path,
        artifact_dir: Option<&str>,
    ) -> impl Future<Output = Result<ArtifactRecord>> + Send;

    /// Move a run to a final status.
    fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        end_time: DateTime<Utc>,
    ) -> impl Future<Output = Result<()>> + Send;
}

impl ExperimentSelector {
    /// Resolve to a concrete experiment ID against `client`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors from the name lookup.
    pub async fn resolve<C: TrackingClient>(&self, client: &C) -> Result<String> {
        match self {
            Self::Id(id) => Ok(id.clone()),
            Self::Name(name) => Ok(client
                .resolve_experiment(name)
                .await?
                .experiment_id()
                .to_string()),
        }
    }
}

/// Backend selected from a [`TrackingConfig`].
#[derive(Debug)]
pub enum Backend {
    /// MLflow tracking server
    Rest(RestClient),
    /// Local directory store
    File(FileStore),
    /// Process-local store
    Memory(MemoryTracker),
}

impl Backend {
    /// Build the backend named by `config.tracking_uri`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the local
    /// store root cannot be resolved.
    pub fn from_config(config: &TrackingConfig) -> Result<Self> {
        match &config.tracking_uri {
            TrackingUri::Rest(_) => Ok(Self::Rest(RestClient::new(config)?)),
            TrackingUri::File(root) => Ok(Self::File(FileStore::new(root)?)),
            TrackingUri::Memory => Ok(Self::Memory(MemoryTracker::new())),
        }
    }
}

impl TrackingClient for Backend {
    async fn resolve_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        match self {
            Self::Rest(c) => c.resolve_experiment(name).await,
            Self::File(c) => c.resolve_experiment(name).await,
            Self::Memory(c) => c.resolve_experiment(name).await,
        }
    }

    async fn create_run(&self, run: NewRun) -> Result<RunRecord> {
        match self {
            Self::Rest(c) => c.create_run(run).await,
            Self::File(c) => c.create_run(run).await,
            Self::Memory(c) => c.create_run(run).await,
        }
    }

    async fn log_param(&self, run_id: &str, param: &ParamRecord) -> Result<()> {
        match self {
            Self::Rest(c) => c.log_param(run_id, param).await,
            Self::File(c) => c.log_param(run_id, param).await,
            Self::Memory(c) => c.log_param(run_id, param).await,
        }
    }

    async fn log_metric(&self, run_id: &str, metric: &MetricRecord) -> Result<()> {
        match self {
            Self::Rest(c) => c.log_metric(run_id, metric).await,
            Self::File(c) => c.log_metric(run_id, metric).await,
            Self::Memory(c) => c.log_metric(run_id, metric).await,
        }
    }

    async fn set_tag(&self, run_id: &str, tag: &TagRecord) -> Result<()> {
        match self {
            Self::Rest(c) => c.set_tag(run_id, tag).await,
            Self::File(c) => c.set_tag(run_id, tag).await,
            Self::Memory(c) => c.set_tag(run_id, tag).await,
        }
    }

    async fn log_artifact(
        &self,
        run: &RunRecord,
        local_path: &Path,
        artifact_dir: Option<&str>,
    ) -> Result<ArtifactRecord> {
        match self {
            Self::Rest(c) => c.log_artifact(run, local_path, artifact_dir).await,
            Self::File(c) => c.log_artifact(run, local_path, artifact_dir).await,
            Self::Memory(c) => c.log_artifact(run, local_path, artifact_dir).await,
        }
    }

    async fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        end_time: DateTime<Utc>,
    ) -> Result<()> {
        match self {
            Self::Rest(c) => c.update_run(run_id, status, end_time).await,
            Self::File(c) => c.update_run(run_id, status, end_time).await,
            Self::Memory(c) => c.update_run(run_id, status, end_time).await,
        }
    }
}
