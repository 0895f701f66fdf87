//! Application layer: jobs, the worker pool that runs them and the worker
//! process entry point.

pub mod job;
pub mod process_tree;
pub mod worker;
pub mod worker_pool;

pub use job::{Job, EXIT_JOB_FAILED, JOB_FILE, RESULT_FILE};
pub use worker::run_job_file;
pub use worker_pool::{PoolOptions, WorkerCommand, WorkerPool};
