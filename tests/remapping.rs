//! Shared remap pass scheduling tests.
//!
//! These exercise [`RemapQueue`] the way a build would: several consumers schedule
//! overlapping jobs against one queue, then a single shared pass runs them in
//! dependency order through a recording remapper backed by real files.

use std::{
    path::{Path, PathBuf},
    sync::Mutex,
};

use remapkit::{prelude::*, Result};

fn table() -> MappingTree {
    remapkit::codec::parse(
        "tiny\t2\t0\tofficial\tnamed\n\
         c\ta/A\tcom/example/Foo\n"
            .as_bytes(),
    )
    .unwrap()
}

/// Copies input to output and records the order inputs were processed in.
struct RecordingRemapper {
    processed: Mutex<Vec<PathBuf>>,
    fail_on: Option<PathBuf>,
}

impl RecordingRemapper {
    fn new() -> RecordingRemapper {
        RecordingRemapper {
            processed: Mutex::new(Vec::new()),
            fail_on: None,
        }
    }

    fn failing_on(input: &Path) -> RecordingRemapper {
        RecordingRemapper {
            processed: Mutex::new(Vec::new()),
            fail_on: Some(input.to_path_buf()),
        }
    }

    fn processed(&self) -> Vec<PathBuf> {
        self.processed.lock().unwrap().clone()
    }
}

impl ArtifactRemapper for RecordingRemapper {
    fn remap(&self, job: &RemapJob, _table: &MappingTree) -> Result<()> {
        if self.fail_on.as_deref() == Some(job.input.as_path()) {
            return Err(Error::RemapJob {
                path: job.input.clone(),
                message: "simulated failure".to_string(),
            });
        }
        std::fs::copy(&job.input, &job.output)?;
        self.processed.lock().unwrap().push(job.input.clone());
        Ok(())
    }
}

/// A throwaway input artifact with recognizable content.
fn artifact(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, name.as_bytes()).unwrap();
    path
}

#[test]
fn duplicate_scheduling_coalesces_into_one_job() {
    let dir = tempfile::tempdir().unwrap();
    let input = artifact(dir.path(), "lib.jar");
    let output = dir.path().join("lib-remapped.jar");
    let queue = RemapQueue::new();

    // Two consumers of the same artifact schedule it independently
    queue
        .schedule(RemapJob::new(&input, &output, "abc123"))
        .unwrap();
    queue
        .schedule(RemapJob::new(&input, &output, "abc123").with_metadata_bundle())
        .unwrap();
    assert_eq!(queue.pending().unwrap(), 1);

    let remapper = RecordingRemapper::new();
    let report = queue.run(&remapper, &table()).unwrap();

    assert_eq!(report.executed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(remapper.processed().len(), 1);
    assert_eq!(std::fs::read(&output).unwrap(), b"lib.jar");
}

#[test]
fn same_artifact_under_different_tables_stays_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let input = artifact(dir.path(), "lib.jar");
    let queue = RemapQueue::new();

    queue
        .schedule(RemapJob::new(&input, &dir.path().join("lib-a.jar"), "aaa"))
        .unwrap();
    queue
        .schedule(RemapJob::new(&input, &dir.path().join("lib-b.jar"), "bbb"))
        .unwrap();

    assert_eq!(queue.pending().unwrap(), 2);
}

#[test]
fn dependencies_run_before_their_dependents() {
    let dir = tempfile::tempdir().unwrap();
    let lib_in = artifact(dir.path(), "lib.jar");
    let lib_out = dir.path().join("lib-remapped.jar");
    let nested_in = artifact(dir.path(), "nested.jar");
    let nested_out = dir.path().join("nested-remapped.jar");
    let app_in = artifact(dir.path(), "app.jar");
    let app_out = dir.path().join("app-remapped.jar");

    let queue = RemapQueue::new();
    // Scheduled out of order on purpose
    queue
        .schedule(RemapJob::new(&app_in, &app_out, "t").after(&lib_out).after(&nested_out))
        .unwrap();
    queue
        .schedule(RemapJob::new(&nested_in, &nested_out, "t").after(&lib_out))
        .unwrap();
    queue.schedule(RemapJob::new(&lib_in, &lib_out, "t")).unwrap();

    let remapper = RecordingRemapper::new();
    let report = queue.run(&remapper, &table()).unwrap();
    assert_eq!(report.executed, 3);

    let order = remapper.processed();
    let position = |p: &Path| order.iter().position(|x| x == p).unwrap();
    assert!(position(&lib_in) < position(&nested_in));
    assert!(position(&nested_in) < position(&app_in));
}

#[test]
fn failure_aborts_the_pass_but_keeps_finished_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let good_in = artifact(dir.path(), "good.jar");
    let good_out = dir.path().join("good-remapped.jar");
    let bad_in = artifact(dir.path(), "bad.jar");
    let bad_out = dir.path().join("bad-remapped.jar");
    let child_in = artifact(dir.path(), "child.jar");
    let child_out = dir.path().join("child-remapped.jar");

    let queue = RemapQueue::new();
    queue.schedule(RemapJob::new(&good_in, &good_out, "t")).unwrap();
    queue.schedule(RemapJob::new(&bad_in, &bad_out, "t")).unwrap();
    queue
        .schedule(RemapJob::new(&child_in, &child_out, "t").after(&bad_out))
        .unwrap();

    let remapper = RecordingRemapper::failing_on(&bad_in);
    let result = queue.run(&remapper, &table());

    assert!(matches!(result, Err(Error::RemapJob { path, .. }) if path == bad_in));
    // The dependent of the failed job never ran
    assert!(!remapper.processed().contains(&child_in));
    // The independent job finished and its output is on disk
    assert!(good_out.exists());
    assert!(queue.was_completed(&good_in, &good_out).unwrap());
}

#[test]
fn rerun_after_failure_skips_completed_jobs() {
    let dir = tempfile::tempdir().unwrap();
    let good_in = artifact(dir.path(), "good.jar");
    let good_out = dir.path().join("good-remapped.jar");
    let bad_in = artifact(dir.path(), "bad.jar");
    let bad_out = dir.path().join("bad-remapped.jar");

    let queue = RemapQueue::new();
    queue.schedule(RemapJob::new(&good_in, &good_out, "t")).unwrap();
    queue.schedule(RemapJob::new(&bad_in, &bad_out, "t")).unwrap();
    queue
        .run(&RecordingRemapper::failing_on(&bad_in), &table())
        .unwrap_err();

    // Retry both; only the one that never finished is executed again
    queue.schedule(RemapJob::new(&good_in, &good_out, "t")).unwrap();
    queue.schedule(RemapJob::new(&bad_in, &bad_out, "t")).unwrap();

    let remapper = RecordingRemapper::new();
    let report = queue.run(&remapper, &table()).unwrap();
    assert_eq!(report.executed, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(remapper.processed(), vec![bad_in]);
}

#[test]
fn session_queue_is_shared_across_consumers() {
    let dir = tempfile::tempdir().unwrap();
    let input = artifact(dir.path(), "shared.jar");
    let output = dir.path().join("shared-remapped.jar");

    let session = Session::new(dir.path());
    // Both "projects" reach the same queue through the session
    session
        .remap_queue()
        .schedule(RemapJob::new(&input, &output, "t"))
        .unwrap();
    session
        .remap_queue()
        .schedule(RemapJob::new(&input, &output, "t"))
        .unwrap();

    let remapper = RecordingRemapper::new();
    let report = session.remap_queue().run(&remapper, &table()).unwrap();
    assert_eq!(report.executed, 1);

    // A drained queue is a no-op on the next pass
    let report = session.remap_queue().run(&remapper, &table()).unwrap();
    assert_eq!(report.executed, 0);
}
