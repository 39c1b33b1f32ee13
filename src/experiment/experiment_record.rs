//! Experiment Record - root entity for experiment tracking

use serde::{Deserialize, Serialize};

/// ID of the experiment every backend creates on demand.
pub const DEFAULT_EXPERIMENT_ID: &str = "0";

/// Name of the default experiment.
pub const DEFAULT_EXPERIMENT_NAME: &str = "Default";

/// Experiment Record represents a tracked experiment.
///
/// Each experiment groups many runs; new runs inherit an artifact root
/// under the experiment's `artifact_location`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentRecord {
    experiment_id: String,
    name: String,
    artifact_location: String,
}

impl ExperimentRecord {
    /// Create a new experiment record.
    ///
    /// # Arguments
    ///
    /// * `experiment_id` - Unique identifier for the experiment
    /// * `name` - Human-readable name for the experiment
    /// * `artifact_location` - Root URI for artifacts of the experiment's runs
    #[must_use]
    pub fn new(
        experiment_id: impl Into<String>,
        name: impl Into<String>,
        artifact_location: impl Into<String>,
    ) -> Self {
        Self {
            experiment_id: experiment_id.into(),
            name: name.into(),
            artifact_location: artifact_location.into(),
        }
    }

    /// Get the experiment ID.
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the artifact root for this experiment's runs.
    #[must_use]
    pub fn artifact_location(&self) -> &str {
        &self.artifact_location
    }

    /// Artifact URI for a run of this experiment.
    #[must_use]
    pub fn run_artifact_uri(&self, run_id: &str) -> String {
        format!(
            "{}/{}/artifacts",
            self.artifact_location.trim_end_matches('/'),
            run_id
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experiment_record_new() {
        let record = ExperimentRecord::new("0", "Default", "file:///tmp/mlruns/0");
        assert_eq!(record.experiment_id(), "0");
        assert_eq!(record.name(), "Default");
    }

    #[test]
    fn test_run_artifact_uri_trims_slash() {
        let record = ExperimentRecord::new("7", "e", "memory://7/");
        assert_eq!(record.run_artifact_uri("abc"), "memory://7/abc/artifacts");
    }
}
