//! Artifact Record - files uploaded under a run's artifact root

use serde::{Deserialize, Serialize};

/// Artifact Record represents a file stored under a run's artifact URI.
///
/// `path` is relative to the run's artifact root (e.g. `info.txt`,
/// `model/weights.bin`) and always uses `/` separators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    path: String,
    size_bytes: u64,
}

impl ArtifactRecord {
    /// Create a new artifact record.
    ///
    /// # Arguments
    ///
    /// * `run_id` - ID of the parent run
    /// * `path` - Artifact path relative to the run's artifact root
    /// * `size_bytes` - Size of the artifact in bytes
    ///
    /// # Returns
    ///
    /// A new `ArtifactRecord`.
    #[must_use]
    pub fn new(run_id: impl Into<String>, path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            run_id: run_id.into(),
            path: path.into(),
            size_bytes,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact path relative to the run's artifact root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}
