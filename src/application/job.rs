//! A single flow invocation and its on-disk hand-off files.
//!
//! The control process writes `fmax_job.json` into the run directory; the
//! worker process loads it, runs the flow and stores the result next to it
//! as `fmax_result.json`, keyed by the job's fingerprint.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::domain::error::JobError;
use crate::domain::models::{Fingerprint, FlowResult, JobSpec, JobStatus};
use crate::domain::ports::Flow;

/// Job spec written by the control process.
pub const JOB_FILE: &str = "fmax_job.json";
/// Result stored by the worker.
pub const RESULT_FILE: &str = "fmax_result.json";
/// Settings snapshot dumped before the flow runs.
pub const SETTINGS_FILE: &str = "settings.json";
/// Worker stderr, captured by the pool.
pub const WORKER_LOG_FILE: &str = "worker.log";
/// Worker exit code for a job that failed on its own terms.
pub const EXIT_JOB_FAILED: i32 = 3;

#[derive(Debug, Serialize, Deserialize)]
struct StoredResult {
    fingerprint: Fingerprint,
    result: FlowResult,
}

/// A job bound to its run directory.
#[derive(Debug, Clone)]
pub struct Job {
    spec: JobSpec,
    status: JobStatus,
}

impl Job {
    pub const fn new(spec: JobSpec) -> Self {
        Self {
            spec,
            status: JobStatus::Pending,
        }
    }

    pub const fn spec(&self) -> &JobSpec {
        &self.spec
    }

    pub fn into_spec(self) -> JobSpec {
        self.spec
    }

    pub const fn status(&self) -> JobStatus {
        self.status
    }

    pub fn set_status(&mut self, status: JobStatus) {
        debug!(
            fingerprint = %self.spec.fingerprint.short(),
            from = %self.status,
            to = %status,
            "Job status changed"
        );
        self.status = status;
    }

    pub fn run_dir(&self) -> &Path {
        &self.spec.run_dir
    }

    pub fn job_file(&self) -> PathBuf {
        self.spec.run_dir.join(JOB_FILE)
    }

    pub fn result_file(&self) -> PathBuf {
        self.spec.run_dir.join(RESULT_FILE)
    }

    /// Persist the spec for a worker to pick up.
    pub fn write_spec(&self) -> Result<PathBuf, JobError> {
        let path = self.job_file();
        write_json(&path, &self.spec)?;
        Ok(path)
    }

    /// Load a job written by [`Job::write_spec`].
    pub fn load(path: &Path) -> Result<Self, JobError> {
        let bytes = fs::read(path).map_err(|source| JobError::Io {
            action: "read",
            path: path.to_path_buf(),
            source,
        })?;
        let spec = serde_json::from_slice(&bytes).map_err(|source| JobError::Serde {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(spec))
    }

    /// Run the flow and store its result. Blocking.
    pub fn execute(&self, flow: &dyn Flow) -> Result<FlowResult, JobError> {
        let result_file = self.result_file();
        match fs::remove_file(&result_file) {
            Ok(()) => debug!(path = %result_file.display(), "Removed stale result"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(JobError::Io {
                    action: "remove",
                    path: result_file,
                    source,
                })
            }
        }

        write_json(
            &self.spec.run_dir.join(SETTINGS_FILE),
            &self.spec.settings.to_tree(),
        )?;

        info!(
            flow = flow.name(),
            frequency = self.spec.frequency,
            run_dir = %self.spec.run_dir.display(),
            "Running flow"
        );
        flow.execute(&self.spec.settings, &self.spec.run_dir)?;
        let result = flow.collect_result(&self.spec.run_dir)?;

        let stored = StoredResult {
            fingerprint: self.spec.fingerprint.clone(),
            result,
        };
        write_json(&result_file, &stored)?;
        info!(
            success = stored.result.success,
            wns = stored.result.wns,
            "Flow finished"
        );
        Ok(stored.result)
    }

    /// Read the stored result.
    pub fn collect_result(&self) -> Result<FlowResult, JobError> {
        let path = self.result_file();
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JobError::NoResult {
                    run_dir: self.spec.run_dir.clone(),
                })
            }
            Err(source) => {
                return Err(JobError::Io {
                    action: "read",
                    path,
                    source,
                })
            }
        };
        let stored: StoredResult =
            serde_json::from_slice(&bytes).map_err(|source| JobError::Serde { path, source })?;
        if stored.fingerprint != self.spec.fingerprint {
            return Err(JobError::FingerprintMismatch {
                run_dir: self.spec.run_dir.clone(),
            });
        }
        Ok(stored.result)
    }

    /// Stored result from an earlier run of the same settings, if any.
    pub fn cached_result(&self) -> Option<FlowResult> {
        self.collect_result().ok()
    }
}

/// Write `value` as pretty JSON through a temporary file and rename, so a
/// reader never sees a partial file.
pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), JobError> {
    let bytes = serde_json::to_vec_pretty(value).map_err(|source| JobError::Serde {
        path: path.to_path_buf(),
        source,
    })?;
    let io_err = |source| JobError::Io {
        action: "write",
        path: path.to_path_buf(),
        source,
    };

    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{name}.tmp.{}", std::process::id()));
    let mut file = fs::File::create(&tmp).map_err(io_err)?;
    file.write_all(&bytes).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}
