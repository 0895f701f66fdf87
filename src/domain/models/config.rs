use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for fmax
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Search interval and termination
    #[serde(default)]
    pub search: SearchConfig,

    /// Worker pool sizing and timeouts
    #[serde(default)]
    pub pool: PoolConfig,

    /// Run directory cache and report location
    #[serde(default)]
    pub runs: RunsConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Search interval and termination configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SearchConfig {
    /// Initial lower frequency bound in MHz
    #[serde(default = "default_low_freq")]
    pub low_freq: f64,

    /// Initial upper frequency bound in MHz
    #[serde(default = "default_high_freq")]
    pub high_freq: f64,

    /// Target resolution in MHz
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// Consecutive non-improving iterations before giving up
    #[serde(default = "default_max_non_improvements")]
    pub max_non_improvements: u32,

    /// Seed for bound jitter; random when unset
    #[serde(default)]
    pub seed: Option<u64>,

    /// Interval adaptation constants
    #[serde(default)]
    pub policy: AdaptationPolicy,
}

const fn default_low_freq() -> f64 {
    10.0
}

const fn default_high_freq() -> f64 {
    500.0
}

const fn default_resolution() -> f64 {
    0.09
}

const fn default_max_non_improvements() -> u32 {
    5
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            low_freq: default_low_freq(),
            high_freq: default_high_freq(),
            resolution: default_resolution(),
            max_non_improvements: default_max_non_improvements(),
            seed: None,
            policy: AdaptationPolicy::default(),
        }
    }
}

/// Empirically tuned constants for candidate generation and interval
/// adaptation. They are policy, not a correctness contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AdaptationPolicy {
    /// Lower bound on samples per batch; with fewer the interval ends are
    /// the only samples and the search cannot bisect
    #[serde(default = "default_min_samples_per_batch")]
    pub min_samples_per_batch: usize,

    /// Jitter applied to the lower bound while widening, relative to the
    /// upper bound's jitter
    #[serde(default = "default_lo_jitter_scale")]
    pub lo_jitter_scale: f64,

    /// Generation retries before the minimum candidate count is relaxed
    #[serde(default = "default_relax_after_retries")]
    pub relax_after_retries: u32,

    /// Generation retries before any non-empty candidate set is accepted
    #[serde(default = "default_max_generation_retries")]
    pub max_generation_retries: u32,

    /// Base of the divisor applied to the lower bound while nothing has
    /// succeeded yet; the consecutive stagnation count is added to it
    #[serde(default = "default_stagnation_shrink_base")]
    pub stagnation_shrink_base: f64,

    /// Subtracted from the slack-extrapolated period, in ns
    #[serde(default = "default_slack_epsilon_ns")]
    pub slack_epsilon_ns: f64,

    /// Cap on upward expansion per worker when the best sits at the edge of
    /// the sampled range, in MHz
    #[serde(default = "default_edge_expansion_per_worker")]
    pub edge_expansion_per_worker: f64,

    /// Added to the upper bound after every improvement, in MHz
    #[serde(default = "default_upper_margin")]
    pub upper_margin: f64,
}

const fn default_min_samples_per_batch() -> usize {
    3
}

const fn default_lo_jitter_scale() -> f64 {
    0.1
}

const fn default_relax_after_retries() -> u32 {
    10
}

const fn default_max_generation_retries() -> u32 {
    100
}

const fn default_stagnation_shrink_base() -> f64 {
    0.7
}

const fn default_slack_epsilon_ns() -> f64 {
    0.001
}

const fn default_edge_expansion_per_worker() -> f64 {
    1.0
}

const fn default_upper_margin() -> f64 {
    1.0
}

impl Default for AdaptationPolicy {
    fn default() -> Self {
        Self {
            min_samples_per_batch: default_min_samples_per_batch(),
            lo_jitter_scale: default_lo_jitter_scale(),
            relax_after_retries: default_relax_after_retries(),
            max_generation_retries: default_max_generation_retries(),
            stagnation_shrink_base: default_stagnation_shrink_base(),
            slack_epsilon_ns: default_slack_epsilon_ns(),
            edge_expansion_per_worker: default_edge_expansion_per_worker(),
            upper_margin: default_upper_margin(),
        }
    }
}

/// Worker pool configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PoolConfig {
    /// Total CPU budget shared by all concurrent jobs
    #[serde(default = "default_max_cpus")]
    pub max_cpus: usize,

    /// Threads given to each job
    #[serde(default = "default_nthreads")]
    pub nthreads: usize,

    /// Per-job timeout in seconds
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Time between SIGTERM and SIGKILL when reaping worker trees
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,
}

fn default_max_cpus() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

const fn default_nthreads() -> usize {
    4
}

const fn default_job_timeout_secs() -> u64 {
    3600
}

const fn default_grace_period_ms() -> u64 {
    3000
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_cpus: default_max_cpus(),
            nthreads: default_nthreads(),
            job_timeout_secs: default_job_timeout_secs(),
            grace_period_ms: default_grace_period_ms(),
        }
    }
}

impl PoolConfig {
    /// Concurrent worker processes: the CPU budget divided by the per-job
    /// thread count, never fewer than two.
    pub fn max_workers(&self) -> usize {
        (self.max_cpus / self.nthreads.max(1)).max(2)
    }

    pub const fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }
}

/// Run directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunsConfig {
    /// Root for run directories, reports and logs
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Return a stored result instead of re-running a job whose run
    /// directory already holds one for the same fingerprint
    #[serde(default = "default_reuse_cached_results")]
    pub reuse_cached_results: bool,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("fmax_run")
}

const fn default_reuse_cached_results() -> bool {
    true
}

impl Default for RunsConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            reuse_cached_results: default_reuse_cached_results(),
        }
    }
}

impl RunsConfig {
    pub fn logs_dir(&self) -> PathBuf {
        self.root_dir.join("Logs")
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Stdout format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Also write JSON logs under `<root_dir>/Logs`
    #[serde(default = "default_log_to_file")]
    pub log_to_file: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

const fn default_log_to_file() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_to_file: default_log_to_file(),
        }
    }
}
