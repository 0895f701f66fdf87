pub mod config;
pub mod fingerprint;
pub mod job;
pub mod metrics;
pub mod search;
pub mod settings;

pub use config::{AdaptationPolicy, Config, LoggingConfig, PoolConfig, RunsConfig, SearchConfig};
pub use fingerprint::Fingerprint;
pub use job::{HarvestedJob, JobOutcome, JobSpec, JobStatus};
pub use metrics::{FlowResult, MetricValue};
pub use search::{
    BestResult, Candidate, CandidateBatch, ClockPeriod, FmaxReport, ReportOutcome, SearchPhase,
    SearchState,
};
pub use settings::{JobSettings, SettingsTree};
