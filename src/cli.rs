//! Command-line arguments

use clap::Parser;

use crate::recorder::{is_truthy, RunArgs, DEFAULT_ALPHA, DEFAULT_RUN_ORIGIN};

/// Record a demonstration run to an MLflow tracking server or a local run store.
///
/// The backend comes from MLFLOW_TRACKING_URI (default: ./run-records).
#[derive(Debug, Parser)]
#[command(name = "run-recorder", version, about, allow_negative_numbers = true)]
pub struct Cli {
    /// Value recorded as the `alpha` param
    #[arg(default_value = DEFAULT_ALPHA)]
    pub alpha: String,

    /// Run name, also recorded as the `run_origin` tag
    #[arg(default_value = DEFAULT_RUN_ORIGIN)]
    pub run_origin: String,

    /// Any non-empty value uploads an `info.txt` artifact
    pub log_artifact: Option<String>,

    /// Tracking backend URI (overrides MLFLOW_TRACKING_URI)
    #[arg(long)]
    pub tracking_uri: Option<String>,

    /// Experiment name, created if missing (overrides MLFLOW_EXPERIMENT_*)
    #[arg(long)]
    pub experiment_name: Option<String>,
}

impl Cli {
    /// Recorder inputs from the positional arguments.
    #[must_use]
    pub fn run_args(&self) -> RunArgs {
        RunArgs::new(
            self.alpha.as_str(),
            self.run_origin.as_str(),
            self.log_artifact.as_deref().is_some_and(is_truthy),
        )
    }
}
