//! Run Data - everything a backend holds for one run
//!
//! This is the read model the local backends keep per run and hand out
//! through `MemoryTracker::run_data` and `FileStore::run_data`, so callers
//! can inspect what was recorded.

use std::collections::BTreeMap;

use super::{ArtifactRecord, MetricRecord, ParamRecord, RunRecord, TagRecord};

/// All records attached to a single run.
///
/// ## Design
///
/// Params and tags are keyed maps (last write wins for tags). Metrics are
/// kept as an append-only history so a key logged at several steps can be
/// replayed as a time series.
#[derive(Debug, Clone, PartialEq)]
pub struct RunData {
    info: RunRecord,
    params: BTreeMap<String, ParamRecord>,
    tags: BTreeMap<String, TagRecord>,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
}

impl RunData {
    /// Create run data with no records attached.
    #[must_use]
    pub const fn new(info: RunRecord) -> Self {
        Self {
            info,
            params: BTreeMap::new(),
            tags: BTreeMap::new(),
            metrics: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Get the run info.
    #[must_use]
    pub const fn info(&self) -> &RunRecord {
        &self.info
    }

    /// Mutable access to the run info (status updates).
    pub fn info_mut(&mut self) -> &mut RunRecord {
        &mut self.info
    }

    /// Record a param. Returns `false` if the key was already logged.
    pub fn add_param(&mut self, param: ParamRecord) -> bool {
        if self.params.contains_key(param.key()) {
            return false;
        }
        self.params.insert(param.key().to_string(), param);
        true
    }

    /// Set a tag, overwriting any previous value.
    pub fn set_tag(&mut self, tag: TagRecord) {
        self.tags.insert(tag.key().to_string(), tag);
    }

    /// Append a metric point.
    pub fn add_metric(&mut self, metric: MetricRecord) {
        self.metrics.push(metric);
    }

    /// Append an artifact record.
    pub fn add_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifacts.push(artifact);
    }

    /// Get a param value by key.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(ParamRecord::value)
    }

    /// Get a tag value by key.
    #[must_use]
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(TagRecord::value)
    }

    /// All artifacts in upload order.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactRecord] {
        &self.artifacts
    }

    /// Get the history of one metric key, ordered by step.
    ///
    /// Points logged at the same step keep their logging order.
    #[must_use]
    pub fn metric_history(&self, key: &str) -> Vec<MetricRecord> {
        let mut metrics: Vec<MetricRecord> = self
            .metrics
            .iter()
            .filter(|m| m.key() == key)
            .cloned()
            .collect();

        metrics.sort_by_key(MetricRecord::step);

        metrics
    }

    /// Latest value of a metric key (highest step, last logged wins ties).
    #[must_use]
    pub fn latest_metric(&self, key: &str) -> Option<f64> {
        self.metric_history(key).last().map(MetricRecord::value)
    }
}
