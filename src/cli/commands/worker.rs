//! Implementation of the hidden `fmax worker` command.
//!
//! Started by the worker pool, never by hand: runs one job file inside its
//! run directory and exits with the code the pool classifies.

use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

use crate::adapters::flows::FlowRegistry;
use crate::application::run_job_file;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};

#[derive(Args, Debug)]
pub struct WorkerArgs {
    /// Job file written by the pool
    pub job_file: PathBuf,
}

pub async fn execute(args: WorkerArgs) -> Result<()> {
    // the pool already validated its config; a worker only needs the log level
    let config = ConfigLoader::load().unwrap_or_default();
    let logger = LoggerImpl::init(&LogConfig::for_worker(&config))?;

    let registry = FlowRegistry::new();
    let code = tokio::task::spawn_blocking(move || {
        run_job_file(&args.job_file, |spec| {
            registry.create(&spec.flow, &spec.settings)
        })
    })
    .await?;

    drop(logger);
    std::process::exit(code);
}
