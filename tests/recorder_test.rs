//! End-to-end recorder tests against the local backends.

use std::io::{self, Write};

use run_recorder::experiment::RunStatus;
use run_recorder::recorder::{record_run, RunArgs, RunMetadata};
use run_recorder::tracking::{FileStore, MemoryTracker};
use run_recorder::Error;

fn metadata() -> RunMetadata {
    RunMetadata {
        user: Some("tester".to_string()),
        source_name: "run-recorder".to_string(),
    }
}

// =============================================================================
// MemoryTracker
// =============================================================================

#[tokio::test]
async fn test_records_param_metric_and_tags() {
    let tracker = MemoryTracker::new();
    let workdir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();

    let summary = record_run(
        &tracker,
        "0",
        &RunArgs::new("0.5", "notebook", false),
        &metadata(),
        workdir.path(),
        &mut out,
    )
    .await
    .unwrap();

    assert_eq!(tracker.run_count(), 1);
    let data = tracker.run_data(&summary.run_id).unwrap();
    assert_eq!(data.info().run_name(), "notebook");
    assert_eq!(data.info().status(), RunStatus::Finished);
    assert!(data.info().ended_at().is_some());
    assert_eq!(data.param("alpha"), Some("0.5"));
    assert_eq!(data.metric_history("auroch").len(), 1);
    assert_eq!(data.latest_metric("auroch"), Some(0.123));
    assert_eq!(data.tag("run_origin"), Some("notebook"));
    assert_eq!(data.tag("log_artifact"), Some("False"));
    assert_eq!(data.tag("mlflow.runName"), Some("notebook"));
    assert_eq!(data.tag("mlflow.user"), Some("tester"));
}

#[tokio::test]
async fn test_stdout_lines() {
    let tracker = MemoryTracker::new();
    let workdir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();

    let summary = record_run(
        &tracker,
        "0",
        &RunArgs::default(),
        &metadata(),
        workdir.path(),
        &mut out,
    )
    .await
    .unwrap();

    let expected = format!(
        "runId: {}\nartifact_uri: {}\nalpha: 0.1\nlog_artifact: False\nrun_origin: None\n",
        summary.run_id, summary.artifact_uri
    );
    assert_eq!(String::from_utf8(out).unwrap(), expected);
}

#[tokio::test]
async fn test_artifact_written_and_uploaded_once() {
    let tracker = MemoryTracker::new();
    let workdir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();

    let summary = record_run(
        &tracker,
        "0",
        &RunArgs::new("0.1", "None", true),
        &metadata(),
        workdir.path(),
        &mut out,
    )
    .await
    .unwrap();

    let local = workdir.path().join("info.txt");
    assert_eq!(std::fs::read_to_string(local).unwrap(), "Hi artifact");

    let data = tracker.run_data(&summary.run_id).unwrap();
    assert_eq!(data.artifacts().len(), 1);
    assert_eq!(data.artifacts()[0].path(), "info.txt");
    assert_eq!(data.tag("log_artifact"), Some("True"));
    assert_eq!(
        tracker.artifact_bytes(&summary.run_id, "info.txt").unwrap(),
        b"Hi artifact"
    );
    assert_eq!(summary.artifact.unwrap().size_bytes(), 11);
}

#[tokio::test]
async fn test_no_artifact_when_flag_false() {
    let tracker = MemoryTracker::new();
    let workdir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();

    let summary = record_run(
        &tracker,
        "0",
        &RunArgs::default(),
        &metadata(),
        workdir.path(),
        &mut out,
    )
    .await
    .unwrap();

    assert!(!workdir.path().join("info.txt").exists());
    assert!(summary.artifact.is_none());
    assert!(tracker
        .run_data(&summary.run_id)
        .unwrap()
        .artifacts()
        .is_empty());
}

#[tokio::test]
async fn test_one_run_per_invocation() {
    let tracker = MemoryTracker::new();
    let workdir = tempfile::tempdir().unwrap();

    for origin in ["first", "second"] {
        let mut out = Vec::new();
        record_run(
            &tracker,
            "0",
            &RunArgs::new("0.1", origin, false),
            &metadata(),
            workdir.path(),
            &mut out,
        )
        .await
        .unwrap();
    }

    assert_eq!(tracker.run_count(), 2);
    for run_id in tracker.run_ids() {
        let status = tracker.run_data(&run_id).unwrap().info().status();
        assert_eq!(status, RunStatus::Finished);
    }
}

/// Writer that refuses every write.
struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdout closed"))
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_failure_still_ends_run() {
    let tracker = MemoryTracker::new();
    let workdir = tempfile::tempdir().unwrap();

    let err = record_run(
        &tracker,
        "0",
        &RunArgs::default(),
        &metadata(),
        workdir.path(),
        &mut BrokenPipe,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::Io(_)));
    let run_id = tracker.run_ids().pop().unwrap();
    let data = tracker.run_data(&run_id).unwrap();
    assert_eq!(data.info().status(), RunStatus::Failed);
    assert!(data.param("alpha").is_none());
}

#[tokio::test]
async fn test_unknown_experiment_opens_no_run() {
    let tracker = MemoryTracker::new();
    let workdir = tempfile::tempdir().unwrap();
    let mut out = Vec::new();

    let err = record_run(
        &tracker,
        "404",
        &RunArgs::default(),
        &metadata(),
        workdir.path(),
        &mut out,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::ExperimentNotFound(_)));
    assert_eq!(tracker.run_count(), 0);
    assert!(out.is_empty());
}

// =============================================================================
// FileStore
// =============================================================================

#[tokio::test]
async fn test_file_store_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("mlruns")).unwrap();
    let workdir = dir.path().join("work");
    std::fs::create_dir_all(&workdir).unwrap();
    let mut out = Vec::new();

    let summary = record_run(
        &store,
        "0",
        &RunArgs::new("0.3", "cli", true),
        &metadata(),
        &workdir,
        &mut out,
    )
    .await
    .unwrap();

    assert!(summary.artifact_uri.starts_with("file://"));

    let uploaded = dir
        .path()
        .join("mlruns/0")
        .join(&summary.run_id)
        .join("artifacts/info.txt");
    assert_eq!(std::fs::read_to_string(uploaded).unwrap(), "Hi artifact");

    let data = store.run_data(&summary.run_id).await.unwrap();
    assert_eq!(data.info().status(), RunStatus::Finished);
    assert_eq!(data.param("alpha"), Some("0.3"));
    assert_eq!(data.latest_metric("auroch"), Some(0.123));
    assert_eq!(data.tag("run_origin"), Some("cli"));
    assert_eq!(data.tag("log_artifact"), Some("True"));
    assert_eq!(data.artifacts().len(), 1);
}
