//! Worker process entry point.
//!
//! Runs exactly one job and reports how it went through the exit code:
//! `0` once a result is stored, [`EXIT_JOB_FAILED`] when the job could not
//! produce one. Anything else the pool sees (another code, a signal) means
//! the worker itself died.

use std::path::Path;
use tracing::{error, info};

use super::job::{Job, EXIT_JOB_FAILED};
use crate::domain::error::FlowError;
use crate::domain::models::JobSpec;
use crate::domain::ports::Flow;

/// Load the job at `job_file`, build its flow with `make_flow` and run it.
/// Returns the process exit code.
pub fn run_job_file<F>(job_file: &Path, make_flow: F) -> i32
where
    F: FnOnce(&JobSpec) -> Result<Box<dyn Flow>, FlowError>,
{
    let job = match Job::load(job_file) {
        Ok(job) => job,
        Err(e) => {
            error!(job_file = %job_file.display(), error = %e, "Failed to load job");
            return EXIT_JOB_FAILED;
        }
    };

    let flow = match make_flow(job.spec()) {
        Ok(flow) => flow,
        Err(e) => {
            error!(flow = %job.spec().flow, error = %e, "Failed to set up flow");
            return EXIT_JOB_FAILED;
        }
    };

    match job.execute(flow.as_ref()) {
        Ok(result) => {
            info!(
                frequency = job.spec().frequency,
                success = result.success,
                wns = result.wns,
                "Job complete"
            );
            0
        }
        Err(e) => {
            error!(frequency = job.spec().frequency, error = %e, "Job failed");
            EXIT_JOB_FAILED
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::flows::FlowRegistry;
    use crate::application::job::RESULT_FILE;
    use crate::domain::models::{Fingerprint, JobSettings, SettingsTree};
    use serde_json::json;
    use tempfile::TempDir;

    fn write_job(dir: &Path, flow: serde_json::Value) -> std::path::PathBuf {
        let spec = JobSpec {
            design: "aes".to_string(),
            flow: "synthetic".to_string(),
            frequency: 200.0,
            settings: JobSettings::new(SettingsTree::new(json!({"name": "aes"})), SettingsTree::new(flow)),
            fingerprint: Fingerprint::from_hex("0123456789abcdef0123456789abcdef"),
            run_dir: dir.to_path_buf(),
        };
        Job::new(spec).write_spec().unwrap()
    }

    fn registry(spec: &JobSpec) -> Result<Box<dyn Flow>, FlowError> {
        FlowRegistry::new().create(&spec.flow, &spec.settings)
    }

    #[test]
    fn test_successful_job_exits_zero() {
        let dir = TempDir::new().unwrap();
        let job_file = write_job(dir.path(), json!({"true_fmax_mhz": 250, "clock_period": 5.0}));
        assert_eq!(run_job_file(&job_file, registry), 0);
        assert!(dir.path().join(RESULT_FILE).exists());
    }

    #[test]
    fn test_bad_settings_exit_with_job_failed() {
        let dir = TempDir::new().unwrap();
        let job_file = write_job(dir.path(), json!({"clock_period": 5.0}));
        assert_eq!(run_job_file(&job_file, registry), EXIT_JOB_FAILED);
    }

    #[test]
    fn test_missing_job_file_exits_with_job_failed() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            run_job_file(&dir.path().join("nope.json"), registry),
            EXIT_JOB_FAILED
        );
    }
}
