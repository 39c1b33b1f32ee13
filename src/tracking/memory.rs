//! In-memory tracking backend using `DashMap`.
//!
//! Data is lost when the process exits. Used for `memory://` tracking URIs
//! and as the observable backend in tests.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::artifact::relative_artifact_path;
use super::{NewRun, TrackingClient};
use crate::experiment::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunData, RunRecord, RunStatus,
    TagRecord, DEFAULT_EXPERIMENT_ID, DEFAULT_EXPERIMENT_NAME,
};
use crate::{Error, Result};

/// In-memory tracking backend.
///
/// Thread-safe; experiments, runs and uploaded artifact bytes live in
/// concurrent hashmaps.
///
/// # Example
///
/// ```rust
/// use run_recorder::experiment::ParamRecord;
/// use run_recorder::tracking::{MemoryTracker, NewRun, TrackingClient};
///
/// # async fn example() -> run_recorder::Result<()> {
/// let tracker = MemoryTracker::new();
/// let run = tracker.create_run(NewRun::new("0", "demo")).await?;
/// tracker.log_param(run.run_id(), &ParamRecord::new("alpha", "0.1")).await?;
///
/// let data = tracker.run_data(run.run_id()).unwrap();
/// assert_eq!(data.param("alpha"), Some("0.1"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct MemoryTracker {
    experiments: DashMap<String, ExperimentRecord>,
    runs: DashMap<String, RunData>,
    artifact_bytes: DashMap<(String, String), Vec<u8>>,
    next_experiment_id: AtomicU64,
}

impl MemoryTracker {
    /// Create a tracker holding only the default experiment.
    #[must_use]
    pub fn new() -> Self {
        let experiments = DashMap::new();
        experiments.insert(
            DEFAULT_EXPERIMENT_ID.to_string(),
            ExperimentRecord::new(
                DEFAULT_EXPERIMENT_ID,
                DEFAULT_EXPERIMENT_NAME,
                format!("memory://{DEFAULT_EXPERIMENT_ID}"),
            ),
        );
        Self {
            experiments,
            runs: DashMap::new(),
            artifact_bytes: DashMap::new(),
            next_experiment_id: AtomicU64::new(1),
        }
    }

    /// Number of experiments, including the default one.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Number of runs ever created.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Snapshot of everything recorded for a run.
    #[must_use]
    pub fn run_data(&self, run_id: &str) -> Option<RunData> {
        self.runs.get(run_id).map(|entry| entry.value().clone())
    }

    /// IDs of all runs.
    #[must_use]
    pub fn run_ids(&self) -> Vec<String> {
        self.runs.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Bytes uploaded for an artifact path of a run.
    #[must_use]
    pub fn artifact_bytes(&self, run_id: &str, path: &str) -> Option<Vec<u8>> {
        self.artifact_bytes
            .get(&(run_id.to_string(), path.to_string()))
            .map(|entry| entry.value().clone())
    }

    fn with_run<T>(&self, run_id: &str, f: impl FnOnce(&mut RunData) -> Result<T>) -> Result<T> {
        let mut entry = self
            .runs
            .get_mut(run_id)
            .ok_or_else(|| Error::RunNotFound(run_id.to_string()))?;
        f(entry.value_mut())
    }
}

impl Default for MemoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackingClient for MemoryTracker {
    async fn resolve_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        if let Some(existing) = self
            .experiments
            .iter()
            .find(|entry| entry.value().name() == name)
        {
            return Ok(existing.value().clone());
        }

        let id = self
            .next_experiment_id
            .fetch_add(1, Ordering::Relaxed)
            .to_string();
        let experiment = ExperimentRecord::new(id.clone(), name, format!("memory://{id}"));
        self.experiments.insert(id, experiment.clone());
        debug!(experiment_id = experiment.experiment_id(), name, "created experiment");
        Ok(experiment)
    }

    async fn create_run(&self, run: NewRun) -> Result<RunRecord> {
        let experiment = self
            .experiments
            .get(&run.experiment_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::ExperimentNotFound(run.experiment_id.clone()))?;

        let run_id = Uuid::new_v4().simple().to_string();
        let record = RunRecord::builder(
            run_id.clone(),
            experiment.experiment_id(),
            experiment.run_artifact_uri(&run_id),
        )
        .run_name(run.run_name)
        .started_at(run.start_time)
        .build();

        let mut data = RunData::new(record.clone());
        for tag in run.tags {
            data.set_tag(tag);
        }
        self.runs.insert(run_id, data);
        Ok(record)
    }

    async fn log_param(&self, run_id: &str, param: &ParamRecord) -> Result<()> {
        self.with_run(run_id, |data| match data.param(param.key()) {
            Some(existing) if existing == param.value() => Ok(()),
            Some(existing) => Err(Error::InvalidInput(format!(
                "param '{}' already logged with value '{existing}', refusing '{}'",
                param.key(),
                param.value()
            ))),
            None => {
                data.add_param(param.clone());
                Ok(())
            }
        })
    }

    async fn log_metric(&self, run_id: &str, metric: &MetricRecord) -> Result<()> {
        self.with_run(run_id, |data| {
            data.add_metric(metric.clone());
            Ok(())
        })
    }

    async fn set_tag(&self, run_id: &str, tag: &TagRecord) -> Result<()> {
        self.with_run(run_id, |data| {
            data.set_tag(tag.clone());
            Ok(())
        })
    }

    async fn log_artifact(
        &self,
        run: &RunRecord,
        local_path: &Path,
        artifact_dir: Option<&str>,
    ) -> Result<ArtifactRecord> {
        let relative = relative_artifact_path(local_path, artifact_dir)?;
        let bytes = tokio::fs::read(local_path).await?;
        let artifact = ArtifactRecord::new(run.run_id(), relative.clone(), bytes.len() as u64);

        self.with_run(run.run_id(), |data| {
            data.add_artifact(artifact.clone());
            Ok(())
        })?;
        self.artifact_bytes
            .insert((run.run_id().to_string(), relative), bytes);
        Ok(artifact)
    }

    async fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        end_time: DateTime<Utc>,
    ) -> Result<()> {
        self.with_run(run_id, |data| {
            data.info_mut().complete(status, end_time);
            Ok(())
        })
    }
}
