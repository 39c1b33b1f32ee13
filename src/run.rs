//! Scoped tracking context
//!
//! An [`ActiveRun`] is opened with [`ActiveRun::start`] and must be closed
//! with [`ActiveRun::end`] or [`ActiveRun::finish`]. `finish` ends the run
//! `FINISHED` or `FAILED` depending on the body's outcome, so both paths
//! close the run before the outcome is returned.

use std::path::Path;

use chrono::Utc;
use tracing::{info, warn};

use crate::experiment::{ArtifactRecord, MetricRecord, ParamRecord, RunRecord, RunStatus, TagRecord};
use crate::tracking::{NewRun, TrackingClient};
use crate::{Error, Result};

/// A run that has been created and not yet ended.
#[derive(Debug)]
pub struct ActiveRun<'a, C: TrackingClient> {
    client: &'a C,
    record: RunRecord,
    ended: bool,
}

impl<'a, C: TrackingClient> ActiveRun<'a, C> {
    /// Create a run and open a context around it.
    ///
    /// # Errors
    ///
    /// Propagates the backend's `create_run` error.
    pub async fn start(client: &'a C, new_run: NewRun) -> Result<Self> {
        let record = client.create_run(new_run).await?;
        info!(
            run_id = record.run_id(),
            experiment_id = record.experiment_id(),
            run_name = record.run_name(),
            "started run"
        );
        Ok(Self {
            client,
            record,
            ended: false,
        })
    }

    /// Backend-assigned run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        self.record.run_id()
    }

    /// Artifact URI of the run root, or of `artifact_path` below it.
    #[must_use]
    pub fn artifact_uri(&self, artifact_path: Option<&str>) -> String {
        let root = self.record.artifact_uri();
        match artifact_path.map(|p| p.trim_matches('/')) {
            None | Some("") => root.to_string(),
            Some(path) => format!("{}/{path}", root.trim_end_matches('/')),
        }
    }

    /// Record a string param.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn log_param(&self, key: &str, value: impl Into<String>) -> Result<()> {
        self.client
            .log_param(self.run_id(), &ParamRecord::new(key, value))
            .await
    }

    /// Record a metric at step 0, timestamped now.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn log_metric(&self, key: &str, value: f64) -> Result<()> {
        self.client
            .log_metric(self.run_id(), &MetricRecord::new(key, value))
            .await
    }

    /// Set a tag.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    pub async fn set_tag(&self, key: &str, value: impl Into<String>) -> Result<()> {
        self.client
            .set_tag(self.run_id(), &TagRecord::new(key, value))
            .await
    }

    /// Upload a local file to the artifact root.
    ///
    /// # Errors
    ///
    /// Propagates backend and IO errors.
    pub async fn log_artifact(&self, local_path: &Path) -> Result<ArtifactRecord> {
        self.client.log_artifact(&self.record, local_path, None).await
    }

    /// End the run with `status`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if `status` is not a final state, or
    /// propagates the backend's `update_run` error.
    pub async fn end(mut self, status: RunStatus) -> Result<()> {
        // Mark first: a failed update must not also trigger the drop warning
        self.ended = true;
        if !status.is_terminal() {
            return Err(Error::InvalidInput(format!(
                "cannot end run {} with non-final status {status}",
                self.record.run_id()
            )));
        }
        self.client
            .update_run(self.record.run_id(), status, Utc::now())
            .await?;
        info!(run_id = self.record.run_id(), status = %status, "ended run");
        Ok(())
    }

    /// End the run according to `outcome` and hand the outcome back.
    ///
    /// `Ok` ends the run `FINISHED`, `Err` ends it `FAILED`. When the body
    /// failed, its error wins over any error from ending the run.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or the `update_run` error after a
    /// successful body.
    pub async fn finish<T>(self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.end(RunStatus::Finished).await?;
                Ok(value)
            }
            Err(body_error) => {
                let run_id = self.run_id().to_string();
                if let Err(end_error) = self.end(RunStatus::Failed).await {
                    warn!(run_id = %run_id, error = %end_error, "failed to mark run as FAILED");
                }
                Err(body_error)
            }
        }
    }
}

impl<C: TrackingClient> Drop for ActiveRun<'_, C> {
    fn drop(&mut self) {
        if !self.ended {
            warn!(run_id = self.record.run_id(), "run dropped without being ended");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    use crate::tracking::MemoryTracker;

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn capture_warnings(logs: &CapturedLogs) -> tracing::subscriber::DefaultGuard {
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    #[tokio::test]
    async fn test_dropping_unended_run_warns() {
        let tracker = MemoryTracker::new();
        let logs = CapturedLogs::default();
        let _guard = capture_warnings(&logs);

        let run = ActiveRun::start(&tracker, NewRun::new("0", "demo"))
            .await
            .unwrap();
        let run_id = run.run_id().to_string();
        drop(run);

        let output = logs.contents();
        assert!(output.contains("run dropped without being ended"));
        assert!(output.contains(&run_id));
        assert_eq!(
            tracker.run_data(&run_id).unwrap().info().status(),
            RunStatus::Running
        );
    }

    #[tokio::test]
    async fn test_ended_run_drops_silently() {
        let tracker = MemoryTracker::new();
        let logs = CapturedLogs::default();
        let _guard = capture_warnings(&logs);

        let run = ActiveRun::start(&tracker, NewRun::new("0", "demo"))
            .await
            .unwrap();
        run.end(RunStatus::Killed).await.unwrap();

        assert!(!logs.contents().contains("dropped"));
    }

    #[tokio::test]
    async fn test_end_rejects_non_final_status() {
        let tracker = MemoryTracker::new();
        let run = ActiveRun::start(&tracker, NewRun::new("0", "demo"))
            .await
            .unwrap();
        let run_id = run.run_id().to_string();

        let err = run.end(RunStatus::Scheduled).await.unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        assert_eq!(
            tracker.run_data(&run_id).unwrap().info().status(),
            RunStatus::Running
        );
    }

    #[tokio::test]
    async fn test_finish_ok_marks_finished() {
        let tracker = MemoryTracker::new();
        let run = ActiveRun::start(&tracker, NewRun::new("0", "demo"))
            .await
            .unwrap();
        let run_id = run.run_id().to_string();

        let value = run.finish(Ok(7)).await.unwrap();

        assert_eq!(value, 7);
        let info = tracker.run_data(&run_id).unwrap().info().clone();
        assert_eq!(info.status(), RunStatus::Finished);
    }

    #[tokio::test]
    async fn test_finish_err_marks_failed_and_returns_body_error() {
        let tracker = MemoryTracker::new();
        let run = ActiveRun::start(&tracker, NewRun::new("0", "demo"))
            .await
            .unwrap();
        let run_id = run.run_id().to_string();

        let err = run
            .finish::<()>(Err(Error::InvalidInput("boom".to_string())))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidInput(_)));
        let info = tracker.run_data(&run_id).unwrap().info().clone();
        assert_eq!(info.status(), RunStatus::Failed);
    }

    #[tokio::test]
    async fn test_artifact_uri_with_path() {
        let tracker = MemoryTracker::new();
        let run = ActiveRun::start(&tracker, NewRun::new("0", "demo"))
            .await
            .unwrap();
        let root = run.artifact_uri(None);

        assert_eq!(run.artifact_uri(Some("info.txt")), format!("{root}/info.txt"));
        assert_eq!(run.artifact_uri(Some("/")), root);
        run.end(RunStatus::Finished).await.unwrap();
    }

    #[tokio::test]
    async fn test_writes_go_to_the_run() {
        let tracker = MemoryTracker::new();
        let run = ActiveRun::start(&tracker, NewRun::new("0", "demo"))
            .await
            .unwrap();
        run.log_param("alpha", "0.1").await.unwrap();
        run.log_metric("auroch", 0.123).await.unwrap();
        run.set_tag("run_origin", "demo").await.unwrap();
        let run_id = run.run_id().to_string();
        run.end(RunStatus::Finished).await.unwrap();

        let data = tracker.run_data(&run_id).unwrap();
        assert_eq!(data.param("alpha"), Some("0.1"));
        assert_eq!(data.latest_metric("auroch"), Some(0.123));
        assert_eq!(data.tag("run_origin"), Some("demo"));
    }
}
