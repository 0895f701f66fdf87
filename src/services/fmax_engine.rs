//! Fmax search control loop.
//!
//! One task drives the search: generate candidates, turn each into a job
//! with its own cached run directory, hand the batch to the executor, fold
//! the outcomes into the best result, then adapt the window or stop. The
//! executor is always shut down and a report is always written, whatever
//! ended the search.

use chrono::{Local, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::report::{report_timestamp, write_report};
use super::run_directory::CachedRunDirectoryResolver;
use super::search_policy::SearchPolicy;
use super::semantic_hasher::SemanticHasher;
use crate::domain::error::SearchError;
use crate::domain::models::{
    AdaptationPolicy, BestResult, CandidateBatch, Config, FmaxReport, HarvestedJob, JobOutcome,
    JobSettings, JobSpec, PoolConfig, ReportOutcome, SearchPhase, SearchState, SettingsTree,
};
use crate::domain::ports::BatchExecutor;

/// What to search: the design, and the flow with its settings.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub design: SettingsTree,
    pub flow_name: String,
    pub flow: SettingsTree,
}

impl SearchRequest {
    pub fn new(design: SettingsTree, flow_name: impl Into<String>, flow: SettingsTree) -> Self {
        Self {
            design,
            flow_name: flow_name.into(),
            flow,
        }
    }

    pub fn design_name(&self) -> Result<&str, SearchError> {
        self.design
            .get_str("name")
            .filter(|name| !name.trim().is_empty())
            .ok_or(SearchError::MissingDesignName)
    }
}

/// Search parameters after flow settings have overridden the config.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParameters {
    pub lo_freq: f64,
    pub hi_freq: f64,
    pub resolution: f64,
    pub max_non_improvements: u32,
    pub nthreads: usize,
    pub job_timeout: Duration,
    pub max_workers: usize,
    pub seed: Option<u64>,
    pub policy: AdaptationPolicy,
}

impl SearchParameters {
    /// Flow settings `fmax_low_freq`, `fmax_high_freq`, `nthreads` and
    /// `timeout` take precedence over the configured values.
    pub fn resolve(config: &Config, flow: &SettingsTree) -> Self {
        let nthreads = flow
            .get_u64("nthreads")
            .map_or(config.pool.nthreads, |n| n as usize)
            .max(1);
        let pool = PoolConfig {
            nthreads,
            ..config.pool.clone()
        };

        Self {
            lo_freq: flow.get_f64("fmax_low_freq").unwrap_or(config.search.low_freq),
            hi_freq: flow.get_f64("fmax_high_freq").unwrap_or(config.search.high_freq),
            resolution: config.search.resolution,
            max_non_improvements: config.search.max_non_improvements.max(1),
            nthreads,
            job_timeout: flow
                .get_u64("timeout")
                .map_or_else(|| pool.job_timeout(), Duration::from_secs),
            max_workers: pool.max_workers(),
            seed: config.search.seed,
            policy: config.search.policy.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if !(self.lo_freq > 0.0 && self.lo_freq < self.hi_freq && self.hi_freq.is_finite()) {
            return Err(SearchError::InvalidRange {
                lo: self.lo_freq,
                hi: self.hi_freq,
            });
        }
        if !(self.resolution > 0.0 && self.resolution.is_finite()) {
            return Err(SearchError::InvalidResolution(self.resolution));
        }
        Ok(())
    }
}

/// Drives one Fmax search over a batch executor.
pub struct FmaxSearchEngine {
    executor: Arc<dyn BatchExecutor>,
    params: SearchParameters,
    hasher: SemanticHasher,
    resolver: CachedRunDirectoryResolver,
    report_dir: PathBuf,
    cancel: CancellationToken,
}

impl FmaxSearchEngine {
    /// Run directories and the report go under `root_dir`.
    pub fn new(
        executor: Arc<dyn BatchExecutor>,
        params: SearchParameters,
        hasher: SemanticHasher,
        root_dir: impl Into<PathBuf>,
        cancel: CancellationToken,
    ) -> Self {
        let root_dir = root_dir.into();
        // workers run with the run directory as cwd, so job paths must not be relative
        let root_dir = std::path::absolute(&root_dir).unwrap_or(root_dir);
        Self {
            executor,
            params,
            hasher,
            resolver: CachedRunDirectoryResolver::new(&root_dir),
            report_dir: root_dir,
            cancel,
        }
    }

    pub const fn parameters(&self) -> &SearchParameters {
        &self.params
    }

    /// Run the search to completion.
    ///
    /// Fails only for invalid input, before anything is submitted. Everything
    /// that goes wrong later ends the search and is recorded in the report.
    pub async fn run(&self, request: SearchRequest) -> Result<FmaxReport, SearchError> {
        let design_name = request.design_name()?.to_string();
        if !request.flow.as_value().is_object() {
            return Err(SearchError::MissingFlowSettings(request.flow_name.clone()));
        }
        self.params.validate()?;

        let base = JobSettings::new(request.design, request.flow);
        // surfaces unreadable file references before any job is submitted
        self.hasher.fingerprint(&base.to_tree())?;

        let started = Instant::now();
        let timestamp = report_timestamp(&Local::now());
        let flow_name = request.flow_name;
        let max_workers = self.executor.max_workers();

        info!(
            design = %design_name,
            flow = %flow_name,
            lo_freq = self.params.lo_freq,
            hi_freq = self.params.hi_freq,
            resolution = self.params.resolution,
            nthreads = self.params.nthreads,
            max_workers,
            timeout_secs = self.params.job_timeout.as_secs(),
            "Starting Fmax search"
        );

        let mut state = SearchState::new(self.params.lo_freq, self.params.hi_freq, self.params.resolution);
        let mut policy = SearchPolicy::new(self.params.policy.clone(), max_workers, self.params.seed);
        let mut best: Option<BestResult> = None;
        let mut abort_reason = None;

        let phase = loop {
            if !state.has_room() {
                break SearchPhase::Converged;
            }
            if self.cancel.is_cancelled() {
                break SearchPhase::Aborted;
            }

            let batch = policy.generate(&mut state);
            if batch.is_empty() {
                info!(
                    lo_freq = state.lo_freq,
                    hi_freq = state.hi_freq,
                    "No untried clock periods left in the window"
                );
                break SearchPhase::Converged;
            }

            let jobs = match self.prepare_jobs(&design_name, &flow_name, &base, &batch) {
                Ok(jobs) => jobs,
                Err(e) => {
                    error!(error = %e, "Failed to prepare jobs");
                    abort_reason = Some(e.to_string());
                    break SearchPhase::Aborted;
                }
            };
            for candidate in &batch.candidates {
                state.record_tried(candidate);
            }
            state.iteration += 1;
            let frequencies: Vec<String> =
                batch.frequencies().iter().map(|f| format!("{f:.2}")).collect();
            info!(
                iteration = state.iteration,
                frequencies = ?frequencies,
                "Trying frequencies (MHz)"
            );

            let harvested = match self.executor.submit_batch(jobs, self.params.job_timeout).await {
                Ok(harvested) => harvested,
                Err(e) => {
                    error!(error = %e, "Executor failed, stopping search");
                    abort_reason = Some(e.to_string());
                    break SearchPhase::Aborted;
                }
            };

            let improved_idx = harvest(&harvested, &mut best);

            if self.cancel.is_cancelled() {
                break SearchPhase::Aborted;
            }
            if batch.freq_step < state.resolution * 0.5 {
                break SearchPhase::Converged;
            }
            if improved_idx.is_none() {
                state.consecutive_no_improvement += 1;
                if state.consecutive_no_improvement >= self.params.max_non_improvements {
                    info!(
                        iterations = state.consecutive_no_improvement,
                        "Stopping after consecutive iterations without improvement"
                    );
                    break SearchPhase::Stagnated;
                }
                info!("No improvement during this iteration");
            }

            policy.adapt(&mut state, &batch, best.as_ref(), improved_idx);

            info!(
                iteration = state.iteration,
                lo_freq = state.lo_freq,
                hi_freq = state.hi_freq,
                best = best.as_ref().map(|b| b.frequency),
                elapsed_minutes = started.elapsed().as_secs() / 60,
                "End of iteration"
            );
        };
        state.phase = phase;

        self.executor.shutdown().await;

        let elapsed = started.elapsed();
        let runtime_minutes = elapsed.as_secs() / 60;
        if let Some(best) = best.as_mut() {
            best.iterations = state.iteration;
            best.runtime_minutes = runtime_minutes;
        }
        let outcome = if best.is_some() {
            ReportOutcome::Found
        } else {
            warn!("No successful results");
            ReportOutcome::NoSuccessfulResult
        };

        let mut report = FmaxReport {
            design: design_name,
            flow: flow_name,
            timestamp,
            phase,
            outcome,
            best,
            iterations: state.iteration,
            runtime_minutes,
            elapsed_seconds: elapsed.as_secs_f64(),
            candidates_tried: state.tried_count(),
            finished_at: Utc::now(),
            abort_reason,
            path: None,
        };

        match write_report(&report, &self.report_dir) {
            Ok(path) => report.path = Some(path),
            Err(e) => error!(dir = %self.report_dir.display(), error = %e, "Failed to write report"),
        }

        info!(
            phase = %report.phase,
            best = report.best_frequency(),
            iterations = report.iterations,
            runtime_minutes,
            "Fmax search finished"
        );
        Ok(report)
    }

    fn prepare_jobs(
        &self,
        design_name: &str,
        flow_name: &str,
        base: &JobSettings,
        batch: &CandidateBatch,
    ) -> Result<Vec<JobSpec>, SearchError> {
        batch
            .candidates
            .iter()
            .map(|candidate| {
                let settings = base.for_clock_period(candidate.period.as_ns(), self.params.nthreads);
                let fingerprint = self.hasher.fingerprint(&settings.to_tree())?;
                let run_dir = self.resolver.resolve(design_name, flow_name, &fingerprint)?;
                Ok(JobSpec {
                    design: design_name.to_string(),
                    flow: flow_name.to_string(),
                    frequency: candidate.frequency,
                    settings,
                    fingerprint,
                    run_dir: run_dir.path,
                })
            })
            .collect()
    }
}

/// Fold a batch into `best`. Returns the batch index of the candidate that
/// became the new best, if any did.
fn harvest(harvested: &[HarvestedJob], best: &mut Option<BestResult>) -> Option<usize> {
    let mut improved_idx = None;
    for job in harvested {
        let frequency = job.spec.frequency;
        match &job.outcome {
            JobOutcome::Succeeded(result) => {
                info!(
                    frequency,
                    success = result.success,
                    wns = result.wns,
                    run_dir = %job.spec.run_dir.display(),
                    "Job finished"
                );
                let improves = best.as_ref().map_or(true, |b| frequency > b.frequency);
                if job.outcome.met_timing() && improves {
                    *best = Some(BestResult::from_job(&job.spec, result.clone()));
                    improved_idx = Some(job.index);
                }
            }
            JobOutcome::Failed { reason, .. } => {
                warn!(frequency, %reason, "Job failed");
            }
            JobOutcome::TimedOut => warn!(frequency, "Job timed out"),
            JobOutcome::Crashed { exit_code, signal } => {
                warn!(frequency, ?exit_code, ?signal, "Job crashed");
            }
            JobOutcome::Cancelled => info!(frequency, "Job cancelled"),
        }
    }
    improved_idx
}
