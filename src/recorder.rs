//! Run recorder - the demonstration workflow
//!
//! Opens one run, prints its identity, records `alpha`, `auroch`, two
//! tags and optionally an `info.txt` artifact, then closes the run.

use std::io::Write;
use std::path::Path;

use tracing::debug;

use crate::experiment::{ArtifactRecord, TagRecord};
use crate::run::ActiveRun;
use crate::tracking::{NewRun, TrackingClient};
use crate::Result;

/// `alpha` when no first argument is given.
pub const DEFAULT_ALPHA: &str = "0.1";
/// `run_origin` when no second argument is given.
pub const DEFAULT_RUN_ORIGIN: &str = "None";

/// Param key for `alpha`.
pub const PARAM_ALPHA: &str = "alpha";
/// Metric recorded on every run.
pub const METRIC_KEY: &str = "auroch";
/// Value of [`METRIC_KEY`].
pub const METRIC_VALUE: f64 = 0.123;
/// Tag key holding the run origin.
pub const TAG_RUN_ORIGIN: &str = "run_origin";
/// Tag key holding the artifact flag.
pub const TAG_LOG_ARTIFACT: &str = "log_artifact";

/// Local file written when artifact logging is requested.
pub const ARTIFACT_FILE_NAME: &str = "info.txt";
/// Contents of [`ARTIFACT_FILE_NAME`].
pub const ARTIFACT_CONTENTS: &str = "Hi artifact";

/// Inputs of one recording.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunArgs {
    /// Recorded as the `alpha` param
    pub alpha: String,
    /// Run name and `run_origin` tag
    pub run_origin: String,
    /// Whether to write and upload `info.txt`
    pub log_artifact: bool,
}

impl RunArgs {
    /// Create run arguments.
    #[must_use]
    pub fn new(alpha: impl Into<String>, run_origin: impl Into<String>, log_artifact: bool) -> Self {
        Self {
            alpha: alpha.into(),
            run_origin: run_origin.into(),
            log_artifact,
        }
    }
}

impl Default for RunArgs {
    fn default() -> Self {
        Self::new(DEFAULT_ALPHA, DEFAULT_RUN_ORIGIN, false)
    }
}

/// Truthiness of a flag argument: any non-empty string is true.
///
/// `"false"` and `"0"` are therefore true as well.
#[must_use]
pub fn is_truthy(raw: &str) -> bool {
    !raw.is_empty()
}

/// Render a flag the way it appears in output and tags (`True`/`False`).
#[must_use]
pub const fn display_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

/// Who and what created the run, attached as `mlflow.*` system tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunMetadata {
    /// Local user name
    pub user: Option<String>,
    /// Program that recorded the run
    pub source_name: String,
}

impl RunMetadata {
    /// Read the user from `USER`/`USERNAME` and the source from `argv[0]`.
    #[must_use]
    pub fn from_env() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|u| !u.is_empty());
        let source_name = std::env::args()
            .next()
            .as_deref()
            .and_then(|arg0| Path::new(arg0).file_name())
            .and_then(|name| name.to_str())
            .unwrap_or(env!("CARGO_PKG_NAME"))
            .to_string();
        Self { user, source_name }
    }

    /// Tags set at run creation.
    #[must_use]
    pub fn system_tags(&self, run_name: &str) -> Vec<TagRecord> {
        let mut tags = vec![
            TagRecord::new("mlflow.runName", run_name),
            TagRecord::new("mlflow.source.name", self.source_name.as_str()),
            TagRecord::new("mlflow.source.type", "LOCAL"),
        ];
        if let Some(user) = &self.user {
            tags.push(TagRecord::new("mlflow.user", user.as_str()));
        }
        tags
    }
}

/// What a recording produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Backend-assigned run ID
    pub run_id: String,
    /// Artifact root of the run
    pub artifact_uri: String,
    /// The uploaded `info.txt`, if artifact logging was requested
    pub artifact: Option<ArtifactRecord>,
}

/// Record one run.
///
/// Prints the run identity and inputs to `out`, records the param, metric
/// and tags, and when `args.log_artifact` is set writes `info.txt` into
/// `workdir` and uploads it. The run is ended `FINISHED` on success and
/// `FAILED` if any step errors.
///
/// # Errors
///
/// Propagates the first backend or IO error; nothing is retried.
pub async fn record_run<C, W>(
    client: &C,
    experiment_id: &str,
    args: &RunArgs,
    metadata: &RunMetadata,
    workdir: &Path,
    out: &mut W,
) -> Result<RunSummary>
where
    C: TrackingClient,
    W: Write,
{
    let new_run = NewRun::new(experiment_id, args.run_origin.as_str())
        .with_tags(metadata.system_tags(&args.run_origin));
    let run = ActiveRun::start(client, new_run).await?;
    let outcome = populate(&run, args, workdir, out).await;
    run.finish(outcome).await
}

async fn populate<C, W>(
    run: &ActiveRun<'_, C>,
    args: &RunArgs,
    workdir: &Path,
    out: &mut W,
) -> Result<RunSummary>
where
    C: TrackingClient,
    W: Write,
{
    let artifact_uri = run.artifact_uri(None);
    writeln!(out, "runId: {}", run.run_id())?;
    writeln!(out, "artifact_uri: {artifact_uri}")?;
    writeln!(out, "alpha: {}", args.alpha)?;
    writeln!(out, "log_artifact: {}", display_bool(args.log_artifact))?;
    writeln!(out, "run_origin: {}", args.run_origin)?;
    out.flush()?;

    run.log_param(PARAM_ALPHA, args.alpha.as_str()).await?;
    run.log_metric(METRIC_KEY, METRIC_VALUE).await?;
    run.set_tag(TAG_RUN_ORIGIN, args.run_origin.as_str()).await?;
    run.set_tag(TAG_LOG_ARTIFACT, display_bool(args.log_artifact))
        .await?;

    let artifact = if args.log_artifact {
        let path = workdir.join(ARTIFACT_FILE_NAME);
        tokio::fs::write(&path, ARTIFACT_CONTENTS).await?;
        debug!(path = %path.display(), "wrote artifact file");
        Some(run.log_artifact(&path).await?)
    } else {
        None
    };

    Ok(RunSummary {
        run_id: run.run_id().to_string(),
        artifact_uri,
        artifact,
    })
}
