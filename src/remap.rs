//! Remap orchestration - coalescing and ordering artifact remap jobs.
//!
//! Modules of a multi-module build all schedule "remap artifact P into Q using table T"
//! requests against one shared [`RemapQueue`]; the host build then drains the queue in
//! a single pass once every module has finished scheduling. The queue
//!
//! - coalesces duplicate requests for the same `(input, output, table)` triple,
//! - orders jobs so that an artifact produced by one job is fully remapped before any
//!   job that consumes it as input (nested-artifact dependency),
//! - executes independent jobs of one dependency level in parallel,
//! - on failure aborts the pass with the offending artifact path while retaining the
//!   outputs of jobs that already completed; only the failed job and anything
//!   depending on it needs to rerun.
//!
//! The symbol rewriting itself is a black box behind [`ArtifactRemapper`]. When
//! cache-sharing is disabled, each module owns its own `RemapQueue` instead of sharing
//! the session's; the semantics per queue are identical.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Mutex,
};

use indexmap::IndexMap;
use log::info;
use rayon::prelude::*;

use crate::{tree::MappingTree, Error, Result};

/// Black-box "apply mapping table to artifact" operation.
///
/// Implementations rewrite the symbols of `job.input` according to `table` and write
/// the result to `job.output`. They are invoked from multiple threads.
pub trait ArtifactRemapper: Sync {
    /// Remap one artifact.
    ///
    /// # Errors
    /// Any error aborts the shared pass; it is reported with the job's input path.
    fn remap(&self, job: &RemapJob, table: &MappingTree) -> Result<()>;
}

/// One scheduled remap operation.
#[derive(Debug, Clone)]
pub struct RemapJob {
    /// The artifact to remap
    pub input: PathBuf,
    /// Where to write the remapped artifact
    pub output: PathBuf,
    /// Fingerprint of the mapping table the job was scheduled against
    /// (see [`MappingTree::fingerprint`])
    pub table_fingerprint: String,
    /// Whether the companion metadata bundle is merged into the artifact before naming
    pub merge_metadata_bundle: bool,
    /// Outputs of other jobs this job needs present before it can run
    pub depends_on: Vec<PathBuf>,
}

impl RemapJob {
    /// Create a job remapping `input` into `output` with the given table fingerprint.
    #[must_use]
    pub fn new(input: &Path, output: &Path, table_fingerprint: &str) -> RemapJob {
        RemapJob {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            table_fingerprint: table_fingerprint.to_string(),
            merge_metadata_bundle: false,
            depends_on: Vec::new(),
        }
    }

    /// Merge the companion metadata bundle before naming.
    #[must_use]
    pub fn with_metadata_bundle(mut self) -> RemapJob {
        self.merge_metadata_bundle = true;
        self
    }

    /// Require another job's output to exist before this job runs.
    #[must_use]
    pub fn after(mut self, output: &Path) -> RemapJob {
        self.depends_on.push(output.to_path_buf());
        self
    }

    fn key(&self) -> JobKey {
        JobKey {
            input: self.input.clone(),
            output: self.output.clone(),
            table: self.table_fingerprint.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct JobKey {
    input: PathBuf,
    output: PathBuf,
    table: String,
}

/// Counts of one queue drain.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Jobs executed in this pass
    pub executed: usize,
    /// Jobs skipped because they completed in an earlier pass
    pub skipped: usize,
}

/// Shared, dedup'ing queue of remap jobs.
///
/// Scheduling is cheap and can happen from any module at any time; [`RemapQueue::run`]
/// drains whatever has accumulated in one dependency-ordered pass. Jobs that completed
/// in an earlier pass are remembered and skipped when rescheduled, so a retry after a
/// failure only reruns the failed job and its dependents.
#[derive(Default)]
pub struct RemapQueue {
    jobs: Mutex<IndexMap<JobKey, RemapJob>>,
    completed: Mutex<HashSet<JobKey>>,
}

impl RemapQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> RemapQueue {
        RemapQueue::default()
    }

    /// Schedule a job, coalescing it with an already queued duplicate.
    ///
    /// Duplicate requests for the same `(input, output, table)` triple merge their
    /// dependency lists and metadata-bundle flags into a single job.
    ///
    /// # Errors
    /// Returns an error only if the queue lock is poisoned.
    pub fn schedule(&self, job: RemapJob) -> Result<()> {
        let mut jobs = lock!(self.jobs);

        match jobs.entry(job.key()) {
            indexmap::map::Entry::Occupied(mut entry) => {
                let queued = entry.get_mut();
                queued.merge_metadata_bundle |= job.merge_metadata_bundle;
                for dependency in job.depends_on {
                    if !queued.depends_on.contains(&dependency) {
                        queued.depends_on.push(dependency);
                    }
                }
            }
            indexmap::map::Entry::Vacant(entry) => {
                entry.insert(job);
            }
        }

        Ok(())
    }

    /// Number of jobs waiting in the queue.
    ///
    /// # Errors
    /// Returns an error only if the queue lock is poisoned.
    pub fn pending(&self) -> Result<usize> {
        Ok(lock!(self.jobs).len())
    }

    /// Whether a job over this `(input, output)` pair completed in an earlier pass.
    ///
    /// # Errors
    /// Returns an error only if the queue lock is poisoned.
    pub fn was_completed(&self, input: &Path, output: &Path) -> Result<bool> {
        Ok(lock!(self.completed)
            .iter()
            .any(|key| key.input == input && key.output == output))
    }

    /// Drain the accumulated jobs in one dependency-ordered pass.
    ///
    /// Children are remapped before the parents that embed their outputs; within a
    /// dependency level jobs run in parallel. A second call without new scheduling is
    /// a no-op.
    ///
    /// # Errors
    /// Returns [`Error::GraphError`] if the queued jobs form a dependency cycle, or
    /// [`Error::RemapJob`] for the first job that failed; outputs of jobs completed
    /// before the failure are retained.
    pub fn run(&self, remapper: &dyn ArtifactRemapper, table: &MappingTree) -> Result<RunReport> {
        let jobs: Vec<(JobKey, RemapJob)> = {
            let mut queued = lock!(self.jobs);
            queued.drain(..).collect()
        };

        let mut report = RunReport::default();
        let mut runnable = Vec::new();
        {
            let completed = lock!(self.completed);
            for (key, job) in jobs {
                if completed.contains(&key) {
                    report.skipped += 1;
                } else {
                    runnable.push((key, job));
                }
            }
        }

        if runnable.is_empty() {
            return Ok(report);
        }

        info!(":remapping {} artifacts", runnable.len());

        for level in order_into_levels(&runnable)? {
            let results: Vec<(usize, Result<()>)> = level
                .par_iter()
                .map(|&index| (index, remapper.remap(&runnable[index].1, table)))
                .collect();

            let mut first_failure = None;
            {
                let mut completed = lock!(self.completed);
                for (index, result) in results {
                    match result {
                        Ok(()) => {
                            completed.insert(runnable[index].0.clone());
                            report.executed += 1;
                        }
                        Err(error) => {
                            if first_failure.is_none() {
                                first_failure = Some((index, error));
                            }
                        }
                    }
                }
            }

            if let Some((index, error)) = first_failure {
                return Err(Error::RemapJob {
                    path: runnable[index].1.input.clone(),
                    message: error.to_string(),
                });
            }
        }

        Ok(report)
    }
}

/// Partition jobs into dependency levels: a job lands one level below every job that
/// produces one of its inputs.
fn order_into_levels(jobs: &[(JobKey, RemapJob)]) -> Result<Vec<Vec<usize>>> {
    let producers: HashMap<&Path, usize> = jobs
        .iter()
        .enumerate()
        .map(|(index, (_, job))| (job.output.as_path(), index))
        .collect();

    // dependents[p] = jobs that must wait for job p
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); jobs.len()];
    let mut indegree: Vec<usize> = vec![0; jobs.len()];

    for (index, (_, job)) in jobs.iter().enumerate() {
        let mut inputs: Vec<&Path> = vec![job.input.as_path()];
        inputs.extend(job.depends_on.iter().map(PathBuf::as_path));

        for input in inputs {
            if let Some(&producer) = producers.get(input) {
                if producer != index {
                    dependents[producer].push(index);
                    indegree[index] += 1;
                }
            }
        }
    }

    let mut current: Vec<usize> = (0..jobs.len()).filter(|&i| indegree[i] == 0).collect();
    let mut levels = Vec::new();
    let mut seen = 0;

    while !current.is_empty() {
        seen += current.len();
        let mut next = Vec::new();

        for &index in &current {
            for &dependent in &dependents[index] {
                indegree[dependent] -= 1;
                if indegree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }

        levels.push(current);
        current = next;
    }

    if seen != jobs.len() {
        let stuck = indegree
            .iter()
            .position(|&degree| degree > 0)
            .map(|index| jobs[index].1.input.display().to_string())
            .unwrap_or_default();
        return Err(Error::GraphError(format!(
            "remap jobs form a dependency cycle involving {stuck}"
        )));
    }

    Ok(levels)
}
