//! Search state, candidates and the final report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use super::fingerprint::Fingerprint;
use super::job::JobSpec;
use super::metrics::FlowResult;
use super::settings::JobSettings;

/// Phase of the Fmax search state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    /// Iterating
    Searching,
    /// Interval narrowed below the resolution
    Converged,
    /// Too many consecutive iterations without improvement
    Stagnated,
    /// Cancelled by the operator or stopped by an executor failure
    Aborted,
}

impl SearchPhase {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Searching => "searching",
            Self::Converged => "converged",
            Self::Stagnated => "stagnated",
            Self::Aborted => "aborted",
        }
    }
}

impl fmt::Display for SearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clock period in whole picoseconds.
///
/// Candidate frequencies are canonicalized through this type, so two
/// frequencies that round to the same period are the same candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ClockPeriod(u64);

impl ClockPeriod {
    pub const fn from_ps(ps: u64) -> Self {
        Self(ps)
    }

    /// Period of `freq_mhz`, rounded to the picosecond.
    pub fn from_mhz(freq_mhz: f64) -> Self {
        Self((1_000_000.0 / freq_mhz).round().max(1.0) as u64)
    }

    pub const fn as_ps(self) -> u64 {
        self.0
    }

    pub fn as_ns(self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn to_mhz(self) -> f64 {
        1_000_000.0 / self.0 as f64
    }
}

impl fmt::Display for ClockPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}ns", self.as_ns())
    }
}

/// A frequency selected for one trial run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Frequency in MHz, recomputed from the rounded period.
    pub frequency: f64,
    pub period: ClockPeriod,
}

impl Candidate {
    pub fn from_mhz(freq_mhz: f64) -> Self {
        let period = ClockPeriod::from_mhz(freq_mhz);
        Self {
            frequency: period.to_mhz(),
            period,
        }
    }
}

/// Candidates generated for one iteration, ascending by frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateBatch {
    pub candidates: Vec<Candidate>,
    /// Spacing between the raw samples the candidates came from.
    pub freq_step: f64,
}

impl CandidateBatch {
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn frequencies(&self) -> Vec<f64> {
        self.candidates.iter().map(|c| c.frequency).collect()
    }
}

/// Mutable state of the bisection, owned by the control loop.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub lo_freq: f64,
    pub hi_freq: f64,
    pub resolution: f64,
    tried_frequencies: HashSet<u64>,
    tried_periods: HashSet<ClockPeriod>,
    pub consecutive_no_improvement: u32,
    pub iteration: u32,
    pub phase: SearchPhase,
}

impl SearchState {
    pub fn new(lo_freq: f64, hi_freq: f64, resolution: f64) -> Self {
        Self {
            lo_freq,
            hi_freq,
            resolution,
            tried_frequencies: HashSet::new(),
            tried_periods: HashSet::new(),
            consecutive_no_improvement: 0,
            iteration: 0,
            phase: SearchPhase::Searching,
        }
    }

    /// Whether the interval is still at least one resolution wide.
    pub fn has_room(&self) -> bool {
        self.hi_freq - self.lo_freq >= self.resolution
    }

    /// Half the resolution, the step used for nudging bounds.
    pub fn delta(&self) -> f64 {
        self.resolution / 2.0
    }

    pub fn was_frequency_tried(&self, freq_mhz: f64) -> bool {
        self.tried_frequencies.contains(&freq_mhz.to_bits())
    }

    pub fn was_period_tried(&self, period: ClockPeriod) -> bool {
        self.tried_periods.contains(&period)
    }

    /// Record a candidate as tried. Returns false if its period was already
    /// recorded.
    pub fn record_tried(&mut self, candidate: &Candidate) -> bool {
        self.tried_frequencies.insert(candidate.frequency.to_bits());
        self.tried_periods.insert(candidate.period)
    }

    pub fn tried_count(&self) -> usize {
        self.tried_periods.len()
    }
}

/// Highest frequency with a successful job so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestResult {
    /// Frequency in MHz
    pub frequency: f64,
    pub results: FlowResult,
    pub settings: JobSettings,
    /// Fingerprint of the winning job
    pub fingerprint: Fingerprint,
    /// Run directory holding the winning job's artifacts
    pub run_dir: PathBuf,
    /// Iterations run when the search ended
    pub iterations: u32,
    pub runtime_minutes: u64,
}

impl BestResult {
    pub const fn new(
        frequency: f64,
        results: FlowResult,
        settings: JobSettings,
        fingerprint: Fingerprint,
        run_dir: PathBuf,
    ) -> Self {
        Self {
            frequency,
            results,
            settings,
            fingerprint,
            run_dir,
            iterations: 0,
            runtime_minutes: 0,
        }
    }

    /// Best result from the job that produced it.
    pub fn from_job(spec: &JobSpec, results: FlowResult) -> Self {
        Self::new(
            spec.frequency,
            results,
            spec.settings.clone(),
            spec.fingerprint.clone(),
            spec.run_dir.clone(),
        )
    }
}

/// Whether the search found anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportOutcome {
    Found,
    NoSuccessfulResult,
}

/// Final report of a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FmaxReport {
    pub design: String,
    pub flow: String,
    pub timestamp: String,
    pub phase: SearchPhase,
    pub outcome: ReportOutcome,
    pub best: Option<BestResult>,
    pub iterations: u32,
    pub runtime_minutes: u64,
    pub elapsed_seconds: f64,
    pub candidates_tried: usize,
    pub finished_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<String>,
    /// Where the report was written, if it was.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl FmaxReport {
    pub fn best_frequency(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.frequency)
    }
}
