//! Metric Record - time-series metrics for runs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metric Record represents a single metric data point.
///
/// A metric key may be logged repeatedly; points are ordered by `step`,
/// with `timestamp` for wall-clock correlation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    key: String,
    value: f64,
    step: i64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Create a new metric record at step 0 with the current timestamp.
    ///
    /// # Arguments
    ///
    /// * `key` - Metric name/key (e.g., "loss", "auroch")
    /// * `value` - Metric value
    #[must_use]
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self::builder(key, value).build()
    }

    /// Create a builder for constructing a metric record with optional fields.
    #[must_use]
    pub fn builder(key: impl Into<String>, value: f64) -> MetricRecordBuilder {
        MetricRecordBuilder::new(key, value)
    }

    /// Get the metric key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the metric value.
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// Get the step number.
    #[must_use]
    pub const fn step(&self) -> i64 {
        self.step
    }

    /// Get the timestamp when the metric was recorded.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Builder for `MetricRecord`.
#[derive(Debug)]
pub struct MetricRecordBuilder {
    key: String,
    value: f64,
    step: i64,
    timestamp: DateTime<Utc>,
}

impl MetricRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(key: impl Into<String>, value: f64) -> Self {
        Self {
            key: key.into(),
            value,
            step: 0,
            timestamp: Utc::now(),
        }
    }

    /// Set the step number.
    #[must_use]
    pub const fn step(mut self, step: i64) -> Self {
        self.step = step;
        self
    }

    /// Set a custom timestamp.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Build the `MetricRecord`.
    #[must_use]
    pub fn build(self) -> MetricRecord {
        MetricRecord {
            key: self.key,
            value: self.value,
            step: self.step,
            timestamp: self.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_record_new() {
        let metric = MetricRecord::new("auroch", 0.123);
        assert_eq!(metric.key(), "auroch");
        assert_eq!(metric.step(), 0);
        assert!((metric.value() - 0.123).abs() < f64::EPSILON);
    }

    #[test]
    fn test_metric_record_builder_step() {
        let m1 = MetricRecord::new("loss", 1.0);
        let m2 = MetricRecord::builder("loss", 0.9).step(1).build();
        assert!(m1.step() < m2.step());
    }
}
