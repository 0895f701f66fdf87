//! Jobs as the pool sees them: the persisted spec, lifecycle status and the
//! outcome reported back to the search.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::fingerprint::Fingerprint;
use super::metrics::FlowResult;
use super::settings::JobSettings;

/// Everything a worker process needs to run one flow invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub design: String,
    pub flow: String,
    /// Candidate frequency in MHz
    pub frequency: f64,
    pub settings: JobSettings,
    pub fingerprint: Fingerprint,
    pub run_dir: PathBuf,
}

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Crashed,
    Cancelled,
}

impl JobStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Crashed => "crashed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a submitted job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The flow ran to completion. `result.success` may still be false when
    /// timing was not met.
    Succeeded(FlowResult),
    /// The job's own logic failed, or the pool could not start it.
    Failed {
        result: Option<FlowResult>,
        reason: String,
    },
    TimedOut,
    /// The worker died unexpectedly.
    Crashed {
        exit_code: Option<i32>,
        signal: Option<i32>,
    },
    Cancelled,
}

impl JobOutcome {
    pub const fn status(&self) -> JobStatus {
        match self {
            Self::Succeeded(_) => JobStatus::Succeeded,
            Self::Failed { .. } => JobStatus::Failed,
            Self::TimedOut => JobStatus::TimedOut,
            Self::Crashed { .. } => JobStatus::Crashed,
            Self::Cancelled => JobStatus::Cancelled,
        }
    }

    pub const fn result(&self) -> Option<&FlowResult> {
        match self {
            Self::Succeeded(result) => Some(result),
            Self::Failed { result, .. } => result.as_ref(),
            _ => None,
        }
    }

    /// Succeeded and met timing.
    pub fn met_timing(&self) -> bool {
        matches!(self, Self::Succeeded(result) if result.success)
    }
}

/// A resolved job, tagged with its position in the submitted batch.
#[derive(Debug, Clone)]
pub struct HarvestedJob {
    pub index: usize,
    pub spec: JobSpec,
    pub outcome: JobOutcome,
}
