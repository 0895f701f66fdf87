//! Process-isolated worker pool.
//!
//! Every job runs in its own worker process, started as the leader of a
//! fresh process group with the run directory as its working directory. The
//! pool bounds concurrency with a semaphore, enforces a per-job timeout from
//! worker start, and on timeout, cancellation or shutdown reaps the whole
//! worker tree: SIGTERM first, SIGKILL after the grace period.

use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::ffi::OsString;
use std::fs::File;
use std::os::unix::process::ExitStatusExt;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::job::{Job, EXIT_JOB_FAILED, WORKER_LOG_FILE};
use super::process_tree;
use crate::domain::error::ExecutorError;
use crate::domain::models::{Config, FlowResult, HarvestedJob, JobOutcome, JobSpec, JobStatus};
use crate::domain::ports::BatchExecutor;

/// Program and leading arguments used to start a worker. The job file path
/// is appended as the last argument.
#[derive(Debug, Clone)]
pub struct WorkerCommand {
    program: PathBuf,
    args: Vec<OsString>,
}

impl WorkerCommand {
    pub fn new<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// The running binary's hidden `worker` subcommand.
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?, ["worker"]))
    }
}

/// Pool sizing and behaviour.
#[derive(Debug, Clone)]
pub struct PoolOptions {
    pub max_workers: usize,
    pub grace_period: Duration,
    pub reuse_cached_results: bool,
}

impl PoolOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_workers: config.pool.max_workers(),
            grace_period: config.pool.grace_period(),
            reuse_cached_results: config.runs.reuse_cached_results,
        }
    }
}

type Registry = Arc<Mutex<HashSet<u32>>>;

/// Registration of a live worker process group. Dropping it kills the group,
/// so an abandoned batch never leaves workers behind.
struct ActiveWorker {
    registry: Registry,
    pgid: u32,
}

impl ActiveWorker {
    fn register(registry: &Registry, pgid: u32) -> Self {
        registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pgid);
        Self {
            registry: Arc::clone(registry),
            pgid,
        }
    }
}

impl Drop for ActiveWorker {
    fn drop(&mut self) {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.pgid);
        process_tree::kill_group_now(self.pgid);
    }
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

/// Bounded pool of worker processes.
pub struct WorkerPool {
    command: WorkerCommand,
    options: PoolOptions,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
    active: Registry,
    closed: AtomicBool,
}

impl WorkerPool {
    pub fn new(command: WorkerCommand, options: PoolOptions, cancel: CancellationToken) -> Self {
        let permits = options.max_workers.max(1);
        info!(
            max_workers = permits,
            grace_ms = options.grace_period.as_millis() as u64,
            reuse_cached_results = options.reuse_cached_results,
            "Worker pool ready"
        );
        Self {
            command,
            options,
            semaphore: Arc::new(Semaphore::new(permits)),
            cancel,
            active: Arc::new(Mutex::new(HashSet::new())),
            closed: AtomicBool::new(false),
        }
    }

    /// Process groups of workers currently running.
    pub fn active_workers(&self) -> Vec<u32> {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect()
    }

    #[instrument(skip_all, fields(index = index, frequency = spec.frequency))]
    async fn run_one(&self, index: usize, spec: JobSpec, timeout: Duration) -> HarvestedJob {
        let mut job = Job::new(spec);

        let outcome = if self.cancel.is_cancelled() {
            JobOutcome::Cancelled
        } else if let Some(result) = self.cached(&job) {
            JobOutcome::Succeeded(result)
        } else {
            let permit = tokio::select! {
                permit = Arc::clone(&self.semaphore).acquire_owned() => permit.ok(),
                () = self.cancel.cancelled() => None,
            };
            match permit {
                Some(_permit) => {
                    job.set_status(JobStatus::Running);
                    self.run_worker(&job, timeout).await
                }
                None if self.cancel.is_cancelled() => JobOutcome::Cancelled,
                None => JobOutcome::Failed {
                    result: None,
                    reason: ExecutorError::Closed.to_string(),
                },
            }
        };

        job.set_status(outcome.status());
        HarvestedJob {
            index,
            spec: job.into_spec(),
            outcome,
        }
    }

    fn cached(&self, job: &Job) -> Option<FlowResult> {
        if !self.options.reuse_cached_results {
            return None;
        }
        let result = job.cached_result()?;
        info!(
            fingerprint = %job.spec().fingerprint.short(),
            run_dir = %job.run_dir().display(),
            "Reusing stored result"
        );
        Some(result)
    }

    async fn run_worker(&self, job: &Job, timeout: Duration) -> JobOutcome {
        let mut child = match self.spawn(job) {
            Ok(child) => child,
            Err(reason) => {
                error!(run_dir = %job.run_dir().display(), %reason, "Failed to start worker");
                return JobOutcome::Failed {
                    result: None,
                    reason,
                };
            }
        };
        let Some(pid) = child.id() else {
            return JobOutcome::Failed {
                result: None,
                reason: "worker exited before it could be tracked".to_string(),
            };
        };
        let _registration = ActiveWorker::register(&self.active, pid);
        debug!(pid, "Worker started");

        let waited = tokio::select! {
            res = tokio::time::timeout(timeout, child.wait()) => match res {
                Ok(status) => Waited::Exited(status),
                Err(_) => Waited::TimedOut,
            },
            () = self.cancel.cancelled() => Waited::Cancelled,
        };

        match waited {
            Waited::Exited(Ok(status)) => classify_exit(job, pid, status),
            Waited::Exited(Err(e)) => JobOutcome::Failed {
                result: None,
                reason: format!("failed to wait for worker: {e}"),
            },
            Waited::TimedOut => {
                warn!(
                    pid,
                    timeout_secs = timeout.as_secs(),
                    "Job timed out, terminating worker tree"
                );
                self.terminate(pid, &mut child).await;
                JobOutcome::TimedOut
            }
            Waited::Cancelled => {
                info!(pid, "Cancelling worker");
                self.terminate(pid, &mut child).await;
                JobOutcome::Cancelled
            }
        }
    }

    fn spawn(&self, job: &Job) -> Result<Child, String> {
        let job_file = job.write_spec().map_err(|e| e.to_string())?;
        let log_path = job.run_dir().join(WORKER_LOG_FILE);
        let log = File::create(&log_path)
            .map_err(|e| format!("failed to create {}: {e}", log_path.display()))?;
        let log_err = log
            .try_clone()
            .map_err(|e| format!("failed to duplicate log handle: {e}"))?;

        Command::new(&self.command.program)
            .args(&self.command.args)
            .arg(&job_file)
            .current_dir(job.run_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to spawn {}: {e}", self.command.program.display()))
    }

    /// Reap the worker tree, then collect the worker itself. Both steps are
    /// bounded by the grace period.
    async fn terminate(&self, pid: u32, child: &mut Child) {
        let grace = self.options.grace_period;
        let summary = process_tree::reap_tree(pid, true, grace).await;
        debug!(pid, ?summary, "Worker tree reaped");

        if tokio::time::timeout(grace, child.wait()).await.is_err() {
            warn!(pid, "Worker still running after SIGKILL");
            let _ = child.start_kill();
        }
    }
}

fn classify_exit(job: &Job, pid: u32, status: ExitStatus) -> JobOutcome {
    match status.code() {
        Some(0) => match job.collect_result() {
            Ok(result) => JobOutcome::Succeeded(result),
            Err(e) => JobOutcome::Failed {
                result: None,
                reason: format!("worker exited cleanly without a result: {e}"),
            },
        },
        Some(EXIT_JOB_FAILED) => {
            let reason = format!(
                "flow failed, see {}",
                job.run_dir().join(WORKER_LOG_FILE).display()
            );
            warn!(pid, %reason, "Job failed");
            JobOutcome::Failed {
                result: job.collect_result().ok(),
                reason,
            }
        }
        code => {
            let signal = status.signal();
            error!(
                pid,
                exit_code = ?code,
                signal = ?signal,
                run_dir = %job.run_dir().display(),
                "Worker crashed"
            );
            JobOutcome::Crashed {
                exit_code: code,
                signal,
            }
        }
    }
}

#[async_trait]
impl BatchExecutor for WorkerPool {
    fn max_workers(&self) -> usize {
        self.options.max_workers
    }

    async fn submit_batch(
        &self,
        jobs: Vec<JobSpec>,
        per_job_timeout: Duration,
    ) -> Result<Vec<HarvestedJob>, ExecutorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ExecutorError::Closed);
        }

        let total = jobs.len();
        let mut pending: FuturesUnordered<_> = jobs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| self.run_one(index, spec, per_job_timeout))
            .collect();

        let mut harvested = Vec::with_capacity(total);
        while let Some(done) = pending.next().await {
            debug!(
                index = done.index,
                status = %done.outcome.status(),
                remaining = total - harvested.len() - 1,
                "Job resolved"
            );
            harvested.push(done);
        }
        Ok(harvested)
    }

    async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.semaphore.close();

        let pgids = self.active_workers();
        if pgids.is_empty() {
            debug!("Worker pool shut down");
            return;
        }
        info!(workers = pgids.len(), "Reaping remaining workers");
        let grace = self.options.grace_period;
        futures::future::join_all(
            pgids
                .into_iter()
                .map(|pgid| process_tree::reap_tree(pgid, true, grace)),
        )
        .await;
    }
}
