//! Implementation of the `fmax search` command.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::application::process_tree;
use crate::application::{PoolOptions, WorkerCommand, WorkerPool};
use crate::cli::design_file::DesignFile;
use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::EXIT_INTERRUPTED;
use crate::domain::models::{Config, FmaxReport};
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::services::{FmaxSearchEngine, SearchParameters, SemanticHasher};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Design settings file (JSON or YAML)
    pub design_file: PathBuf,

    /// Flow to run, a section under `flows` in the design file
    #[arg(short, long)]
    pub flow: String,

    /// Lower bound of the initial search interval, in MHz
    #[arg(long)]
    pub low_freq: Option<f64>,

    /// Upper bound of the initial search interval, in MHz
    #[arg(long)]
    pub high_freq: Option<f64>,

    /// Stop once the interval is narrower than this, in MHz
    #[arg(long)]
    pub resolution: Option<f64>,

    /// Threads given to each flow run
    #[arg(long)]
    pub nthreads: Option<usize>,

    /// Total CPU budget shared by all concurrent runs
    #[arg(long)]
    pub max_cpus: Option<usize>,

    /// Per-run timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Seed for interval jitter
    #[arg(long)]
    pub seed: Option<u64>,

    /// Root for run directories, reports and logs
    #[arg(long)]
    pub run_dir: Option<PathBuf>,

    /// Re-run jobs even when their run directory holds a stored result
    #[arg(long)]
    pub no_cache: bool,

    /// Config file used instead of fmax.yaml and .fmax/local.yaml
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override a design file setting, e.g. `--set flows.vivado.strategy=Fast`
    #[arg(long = "set", value_name = "KEY.PATH=VALUE")]
    pub overrides: Vec<String>,
}

impl SearchArgs {
    fn apply_to_config(&self, config: &mut Config) {
        if let Some(resolution) = self.resolution {
            config.search.resolution = resolution;
        }
        if let Some(max_cpus) = self.max_cpus {
            config.pool.max_cpus = max_cpus;
        }
        if let Some(seed) = self.seed {
            config.search.seed = Some(seed);
        }
        if let Some(root) = &self.run_dir {
            config.runs.root_dir.clone_from(root);
        }
        if self.no_cache {
            config.runs.reuse_cached_results = false;
        }
    }

    /// Interval, thread and timeout flags become flow settings, where they
    /// win over both the design file and the config.
    fn apply_to_flow(&self, design: &mut DesignFile) {
        let flow_settings = [
            ("fmax_low_freq", self.low_freq.map(Value::from)),
            ("fmax_high_freq", self.high_freq.map(Value::from)),
            ("nthreads", self.nthreads.map(Value::from)),
            ("timeout", self.timeout.map(Value::from)),
        ];
        for (key, value) in flow_settings {
            if let Some(value) = value {
                design.set_flow_setting(&self.flow, key, value);
            }
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct SearchOutput {
    #[serde(flatten)]
    pub report: FmaxReport,
    pub report_path: Option<PathBuf>,
}

impl CommandOutput for SearchOutput {
    fn to_human(&self) -> String {
        TableFormatter::new().format_report(&self.report)
    }
}

pub async fn execute(args: SearchArgs, json_mode: bool) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    args.apply_to_config(&mut config);
    ConfigLoader::validate(&config)?;

    let logger = LoggerImpl::init(&LogConfig::for_search(&config))?;

    let mut design = DesignFile::load(&args.design_file)?;
    for assignment in &args.overrides {
        design.apply_override(assignment)?;
    }
    args.apply_to_flow(&mut design);
    let request = design.request(&args.flow);

    let params = SearchParameters::resolve(&config, &request.flow);
    let cancel = CancellationToken::new();
    let pool = WorkerPool::new(
        WorkerCommand::current_exe().context("Failed to locate the fmax executable")?,
        PoolOptions {
            max_workers: params.max_workers,
            ..PoolOptions::from_config(&config)
        },
        cancel.clone(),
    );
    let engine = FmaxSearchEngine::new(
        Arc::new(pool),
        params,
        SemanticHasher::new(design.base_dir()),
        &config.runs.root_dir,
        cancel.clone(),
    );

    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Received interrupt, stopping search");
                cancel.cancel();
            }
        }
    });

    let result = engine.run(request).await;
    interrupt.abort();

    let leftovers = process_tree::reap_own_descendants(config.pool.grace_period()).await;
    if leftovers.terminated > 0 {
        info!(?leftovers, "Reaped leftover processes");
    }

    let report = result.context("Fmax search failed")?;
    let interrupted = cancel.is_cancelled();
    let report_path = report.path.clone();
    output(&SearchOutput { report, report_path }, json_mode);

    if interrupted {
        drop(logger);
        std::process::exit(EXIT_INTERRUPTED);
    }
    Ok(())
}
