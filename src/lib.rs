//! fmax - adaptive maximum clock frequency search
//!
//! fmax runs a hardware synthesis flow at many clock frequencies in parallel
//! and narrows in on the highest one that still meets timing.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and the ports the engine talks through
//! - **Service Layer** (`services`): Fingerprinting, run directories and the search loop
//! - **Application Layer** (`application`): Jobs, the worker pool and the worker entry point
//! - **Adapters** (`adapters`): Flow implementations
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use fmax::{Config, FmaxSearchEngine, PoolOptions, SearchParameters, SearchRequest};
//! use fmax::{SemanticHasher, WorkerCommand, WorkerPool};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run(request: SearchRequest) -> anyhow::Result<()> {
//! let config = Config::default();
//! let cancel = CancellationToken::new();
//! let pool = WorkerPool::new(WorkerCommand::current_exe()?, PoolOptions::from_config(&config), cancel.clone());
//! let params = SearchParameters::resolve(&config, &request.flow);
//! let engine = FmaxSearchEngine::new(Arc::new(pool), params, SemanticHasher::default(), "fmax_run", cancel);
//! let report = engine.run(request).await?;
//! println!("{:?}", report.best_frequency());
//! # Ok(())
//! # }
//! ```

pub mod adapters;
pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{Job, PoolOptions, WorkerCommand, WorkerPool};
pub use domain::error::{
    ExecutorError, FlowError, HashError, JobError, RunDirError, SearchError,
};
pub use domain::models::{
    BestResult, Config, Fingerprint, FlowResult, FmaxReport, JobOutcome, JobSettings, JobSpec,
    JobStatus, MetricValue, ReportOutcome, SearchPhase, SettingsTree,
};
pub use domain::ports::{BatchExecutor, Flow};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CachedRunDirectoryResolver, FmaxSearchEngine, SearchParameters, SearchRequest, SemanticHasher,
};
