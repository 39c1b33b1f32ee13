//! Local directory tracking backend
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<experiment_id>/meta.json             ExperimentRecord
//! <root>/<experiment_id>/<run_id>/meta.json    RunRecord
//! <root>/<experiment_id>/<run_id>/params/<key> value
//! <root>/<experiment_id>/<run_id>/tags/<key>   value
//! <root>/<experiment_id>/<run_id>/metrics/<key> "<timestamp_ms> <value> <step>" per line
//! <root>/<experiment_id>/<run_id>/artifacts/   uploaded files
//! ```
//!
//! This is not MLflow's own file-store format (`meta.yaml`). Experiment
//! directories that hold a `meta.yaml` are left untouched.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::artifact::{copy_to_local_root, relative_artifact_path, ArtifactLocation};
use super::{NewRun, TrackingClient};
use crate::experiment::{
    ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunData, RunRecord, RunStatus,
    TagRecord, DEFAULT_EXPERIMENT_ID, DEFAULT_EXPERIMENT_NAME,
};
use crate::{Error, Result};

const META_FILE: &str = "meta.json";
const MLFLOW_META_FILE: &str = "meta.yaml";
const PARAMS_DIR: &str = "params";
const TAGS_DIR: &str = "tags";
const METRICS_DIR: &str = "metrics";
const ARTIFACTS_DIR: &str = "artifacts";

/// Tracking backend writing plain files under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `root` (made absolute against the working
    /// directory). Nothing is written until the first run.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the working directory cannot be determined.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let root = if root.is_absolute() {
            root.to_path_buf()
        } else {
            std::env::current_dir()?.join(root)
        };
        Ok(Self { root })
    }

    /// Store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read back everything recorded for a run.
    ///
    /// # Errors
    ///
    /// Returns `Error::RunNotFound` if no experiment holds the run, or
    /// `Error::Io` / `Error::Json` for unreadable files.
    pub async fn run_data(&self, run_id: &str) -> Result<RunData> {
        let run_dir = self.find_run_dir(run_id).await?;
        let info: RunRecord = read_json(&run_dir.join(META_FILE)).await?;
        let mut data = RunData::new(info);

        for (key, value) in read_key_files(&run_dir.join(PARAMS_DIR)).await? {
            data.add_param(ParamRecord::new(key, value));
        }
        for (key, value) in read_key_files(&run_dir.join(TAGS_DIR)).await? {
            data.set_tag(TagRecord::new(key, value));
        }
        for (key, lines) in read_key_files(&run_dir.join(METRICS_DIR)).await? {
            for line in lines.lines().filter(|l| !l.trim().is_empty()) {
                data.add_metric(parse_metric_line(&key, line)?);
            }
        }
        let artifacts_root = run_dir.join(ARTIFACTS_DIR);
        for (path, size) in list_files(&artifacts_root).await? {
            data.add_artifact(ArtifactRecord::new(run_id, path, size));
        }

        Ok(data)
    }

    fn experiment_dir(&self, experiment_id: &str) -> PathBuf {
        self.root.join(experiment_id)
    }

    async fn load_experiment(&self, experiment_id: &str) -> Result<ExperimentRecord> {
        let meta = self.experiment_dir(experiment_id).join(META_FILE);
        if tokio::fs::try_exists(&meta).await? {
            return read_json(&meta).await;
        }
        if experiment_id == DEFAULT_EXPERIMENT_ID {
            return self
                .write_experiment(DEFAULT_EXPERIMENT_ID, DEFAULT_EXPERIMENT_NAME)
                .await;
        }
        Err(Error::ExperimentNotFound(experiment_id.to_string()))
    }

    async fn write_experiment(&self, experiment_id: &str, name: &str) -> Result<ExperimentRecord> {
        let dir = self.experiment_dir(experiment_id);
        if tokio::fs::try_exists(dir.join(MLFLOW_META_FILE)).await? {
            return Err(Error::Config(format!(
                "{} belongs to an MLflow file store; point the tracking URI elsewhere",
                dir.display()
            )));
        }
        tokio::fs::create_dir_all(&dir).await?;
        let location = Url::from_directory_path(&dir)
            .map_err(|()| Error::Config(format!("store root is not absolute: {}", dir.display())))?;
        let experiment = ExperimentRecord::new(experiment_id, name, location.as_str());
        write_json(&dir.join(META_FILE), &experiment).await?;
        debug!(experiment_id, name, "created experiment");
        Ok(experiment)
    }

    async fn experiments(&self) -> Result<Vec<ExperimentRecord>> {
        let mut experiments = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(experiments),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let meta = entry.path().join(META_FILE);
            if tokio::fs::try_exists(&meta).await? {
                experiments.push(read_json(&meta).await?);
            }
        }
        Ok(experiments)
    }

    async fn find_run_dir(&self, run_id: &str) -> Result<PathBuf> {
        check_key(run_id)?;
        for experiment in self.experiments().await? {
            let dir = self.experiment_dir(experiment.experiment_id()).join(run_id);
            if tokio::fs::try_exists(dir.join(META_FILE)).await? {
                return Ok(dir);
            }
        }
        Err(Error::RunNotFound(run_id.to_string()))
    }
}

impl TrackingClient for FileStore {
    async fn resolve_experiment(&self, name: &str) -> Result<ExperimentRecord> {
        if name == DEFAULT_EXPERIMENT_NAME {
            return self.load_experiment(DEFAULT_EXPERIMENT_ID).await;
        }

        let experiments = self.experiments().await?;
        if let Some(found) = experiments.iter().find(|e| e.name() == name) {
            return Ok(found.clone());
        }

        let next_id = experiments
            .iter()
            .filter_map(|e| e.experiment_id().parse::<u64>().ok())
            .max()
            .map_or(1, |max| max + 1);
        self.write_experiment(&next_id.to_string(), name).await
    }

    async fn create_run(&self, run: NewRun) -> Result<RunRecord> {
        let experiment = self.load_experiment(&run.experiment_id).await?;
        let run_id = Uuid::new_v4().simple().to_string();
        let run_dir = self.experiment_dir(experiment.experiment_id()).join(&run_id);

        for sub in [PARAMS_DIR, TAGS_DIR, METRICS_DIR, ARTIFACTS_DIR] {
            tokio::fs::create_dir_all(run_dir.join(sub)).await?;
        }

        let record = RunRecord::builder(
            run_id.as_str(),
            experiment.experiment_id(),
            experiment.run_artifact_uri(&run_id),
        )
        .run_name(run.run_name)
        .started_at(run.start_time)
        .build();
        write_json(&run_dir.join(META_FILE), &record).await?;

        for tag in &run.tags {
            write_key_file(&run_dir.join(TAGS_DIR), tag.key(), tag.value()).await?;
        }
        debug!(run_id = %run_id, path = %run_dir.display(), "created run");
        Ok(record)
    }

    async fn log_param(&self, run_id: &str, param: &ParamRecord) -> Result<()> {
        check_key(param.key())?;
        let path = self.find_run_dir(run_id).await?.join(PARAMS_DIR).join(param.key());
        match tokio::fs::read_to_string(&path).await {
            Ok(existing) if existing == param.value() => Ok(()),
            Ok(existing) => Err(Error::InvalidInput(format!(
                "param '{}' already logged with value '{existing}', refusing '{}'",
                param.key(),
                param.value()
            ))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                write_file(&path, param.value()).await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn log_metric(&self, run_id: &str, metric: &MetricRecord) -> Result<()> {
        check_key(metric.key())?;
        let path = self.find_run_dir(run_id).await?.join(METRICS_DIR).join(metric.key());
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let line = format!(
            "{} {} {}\n",
            metric.timestamp().timestamp_millis(),
            metric.value(),
            metric.step()
        );
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn set_tag(&self, run_id: &str, tag: &TagRecord) -> Result<()> {
        let dir = self.find_run_dir(run_id).await?.join(TAGS_DIR);
        write_key_file(&dir, tag.key(), tag.value()).await
    }

    async fn log_artifact(
        &self,
        run: &RunRecord,
        local_path: &Path,
        artifact_dir: Option<&str>,
    ) -> Result<ArtifactRecord> {
        let relative = relative_artifact_path(local_path, artifact_dir)?;
        let root = match ArtifactLocation::parse(run.artifact_uri())? {
            ArtifactLocation::Local(root) => root,
            _ => return Err(Error::UnsupportedArtifactUri(run.artifact_uri().to_string())),
        };
        let size = copy_to_local_root(&root, local_path, &relative).await?;
        Ok(ArtifactRecord::new(run.run_id(), relative, size))
    }

    async fn update_run(
        &self,
        run_id: &str,
        status: RunStatus,
        end_time: DateTime<Utc>,
    ) -> Result<()> {
        let meta = self.find_run_dir(run_id).await?.join(META_FILE);
        let mut record: RunRecord = read_json(&meta).await?;
        record.complete(status, end_time);
        write_json(&meta, &record).await
    }
}

/// Keys become relative file paths; reject anything that could escape.
fn check_key(key: &str) -> Result<()> {
    let path = Path::new(key);
    let valid = !key.is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
    if valid {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("invalid key: '{key}'")))
    }
}

fn parse_metric_line(key: &str, line: &str) -> Result<MetricRecord> {
    let bad = || Error::InvalidInput(format!("malformed metric line for '{key}': {line}"));
    let mut parts = line.split_whitespace();
    let timestamp: i64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let value: f64 = parts.next().and_then(|p| p.parse().ok()).ok_or_else(bad)?;
    let step: i64 = parts.next().map_or(Some(0), |p| p.parse().ok()).ok_or_else(bad)?;
    let timestamp = DateTime::from_timestamp_millis(timestamp).ok_or_else(bad)?;
    Ok(MetricRecord::builder(key, value)
        .step(step)
        .timestamp(timestamp)
        .build())
}

async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, contents).await?;
    Ok(())
}

async fn write_key_file(dir: &Path, key: &str, value: &str) -> Result<()> {
    check_key(key)?;
    write_file(&dir.join(key), value).await
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&raw)?)
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    write_file(path, &raw).await
}

/// Read every file below `dir`; keys are `/`-joined relative paths.
async fn read_key_files(dir: &Path) -> Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    for (key, _) in list_files(dir).await? {
        let value = tokio::fs::read_to_string(dir.join(&key)).await?;
        out.push((key, value));
    }
    Ok(out)
}

/// Relative paths and sizes of all files below `root`, sorted.
async fn list_files(root: &Path) -> Result<Vec<(String, u64)>> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                pending.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push((key, metadata.len()));
            }
        }
    }

    files.sort();
    Ok(files)
}
