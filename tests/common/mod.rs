//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

#![allow(dead_code)]

use async_trait::async_trait;
use fmax::adapters::flows::SyntheticFlow;
use fmax::domain::models::{
    Fingerprint, HarvestedJob, JobOutcome, JobSettings, JobSpec, SettingsTree,
};
use fmax::services::SearchRequest;
use fmax::{BatchExecutor, ExecutorError};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Create a temporary directory for test isolation
///
/// Returns a TempDir that will be cleaned up when dropped.
pub fn temp_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Search request for a design named `name` and the synthetic flow.
pub fn synthetic_request(name: &str, flow: Value) -> SearchRequest {
    SearchRequest::new(
        SettingsTree::new(json!({ "name": name })),
        "synthetic",
        SettingsTree::new(flow),
    )
}

/// Job spec with a fixed fingerprint in `run_dir`.
pub fn job_spec(run_dir: &Path, frequency: f64, fingerprint: &str) -> JobSpec {
    std::fs::create_dir_all(run_dir).expect("Failed to create run dir");
    JobSpec {
        design: "aes".to_string(),
        flow: "synthetic".to_string(),
        frequency,
        settings: JobSettings::new(
            SettingsTree::new(json!({ "name": "aes" })),
            SettingsTree::new(json!({ "clock_period": 1000.0 / frequency })),
        ),
        fingerprint: Fingerprint::from_hex(fingerprint),
        run_dir: run_dir.to_path_buf(),
    }
}

/// In-process executor that evaluates jobs with a synthetic timing model.
///
/// Jobs come back in index order. Every submitted period is recorded so
/// tests can check what the search asked for.
pub struct SyntheticExecutor {
    flow: SyntheticFlow,
    max_workers: usize,
    submitted: Mutex<Vec<Vec<u64>>>,
    batches: AtomicUsize,
    fail_on_batch: Option<usize>,
    cancel_after: Option<(usize, CancellationToken)>,
    shut_down: AtomicBool,
}

impl SyntheticExecutor {
    pub fn new(true_fmax_mhz: f64, max_workers: usize) -> Self {
        Self {
            flow: SyntheticFlow::new("synthetic", true_fmax_mhz),
            max_workers,
            submitted: Mutex::new(Vec::new()),
            batches: AtomicUsize::new(0),
            fail_on_batch: None,
            cancel_after: None,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Return an executor error for the `n`th batch (1-based).
    pub fn failing_on_batch(mut self, n: usize) -> Self {
        self.fail_on_batch = Some(n);
        self
    }

    /// Cancel `token` while the `n`th batch (1-based) runs.
    pub fn cancelling_after(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    /// Periods per submitted batch, in picoseconds.
    pub fn submitted(&self) -> Vec<Vec<u64>> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn was_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchExecutor for SyntheticExecutor {
    fn max_workers(&self) -> usize {
        self.max_workers
    }

    async fn submit_batch(
        &self,
        jobs: Vec<JobSpec>,
        _per_job_timeout: Duration,
    ) -> Result<Vec<HarvestedJob>, ExecutorError> {
        let n = self.batches.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_batch == Some(n) {
            return Err(ExecutorError::Internal("worker pool lost".to_string()));
        }

        let periods = jobs
            .iter()
            .map(|job| {
                let ns = job.settings.clock_period().expect("clock_period is set");
                (ns * 1000.0).round() as u64
            })
            .collect();
        self.submitted.lock().unwrap().push(periods);

        let cancelled = match &self.cancel_after {
            Some((after, token)) if n >= *after => {
                token.cancel();
                true
            }
            _ => false,
        };

        Ok(jobs
            .into_iter()
            .enumerate()
            .map(|(index, spec)| {
                let outcome = if cancelled && index > 0 {
                    JobOutcome::Cancelled
                } else {
                    let period = spec.settings.clock_period().unwrap_or(0.0);
                    JobOutcome::Succeeded(self.flow.evaluate(period))
                };
                HarvestedJob {
                    index,
                    spec,
                    outcome,
                }
            })
            .collect())
    }

    async fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}

/// `sh` script that stores a successful result for `fingerprint`.
pub fn store_result_script(fingerprint: &str, wns: f64) -> String {
    format!(
        r#"printf '{{"fingerprint":"{fingerprint}","result":{{"success":true,"wns":{wns},"clock_period":4.0}}}}' > fmax_result.json"#
    )
}

pub fn fmax_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fmax"))
}
