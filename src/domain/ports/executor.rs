//! Executor port - runs batches of jobs concurrently.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::error::ExecutorError;
use crate::domain::models::{HarvestedJob, JobSpec};

/// Runs batches of jobs and reports how each one ended.
#[async_trait]
pub trait BatchExecutor: Send + Sync {
    /// Upper bound on jobs running at the same time.
    fn max_workers(&self) -> usize;

    /// Run every job and wait until all of them are resolved.
    ///
    /// Entries come back in completion order, tagged with their index in
    /// `jobs`. A failure of a single job is reported in its outcome, never
    /// as an `Err`.
    async fn submit_batch(
        &self,
        jobs: Vec<JobSpec>,
        per_job_timeout: Duration,
    ) -> Result<Vec<HarvestedJob>, ExecutorError>;

    /// Refuse further batches and reap every worker still alive.
    async fn shutdown(&self);
}
