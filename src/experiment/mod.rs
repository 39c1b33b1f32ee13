//! Experiment Tracking Schema
//!
//! Client-side records mirroring what a tracking backend stores.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< ParamRecord (N) [write-once]
//!                              ├──< TagRecord (N) [last write wins]
//!                              ├──< MetricRecord (N) [time-series]
//!                              └──< ArtifactRecord (N)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use run_recorder::experiment::{MetricRecord, RunData, RunRecord, RunStatus};
//!
//! let mut data = RunData::new(RunRecord::new("run-001", "0", "file:///tmp/artifacts"));
//! data.add_metric(MetricRecord::new("auroch", 0.123));
//!
//! data.info_mut().complete(RunStatus::Finished, chrono::Utc::now());
//! assert_eq!(data.info().status(), RunStatus::Finished);
//! ```

mod artifact_record;
mod experiment_record;
mod metric_record;
mod param_record;
mod run_data;
mod run_record;

pub use artifact_record::ArtifactRecord;
pub use experiment_record::{ExperimentRecord, DEFAULT_EXPERIMENT_ID, DEFAULT_EXPERIMENT_NAME};
pub use metric_record::{MetricRecord, MetricRecordBuilder};
pub use param_record::{ParamRecord, TagRecord};
pub use run_data::RunData;
pub use run_record::{RunRecord, RunRecordBuilder, RunStatus};
