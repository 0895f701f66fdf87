//! Synthetic flow with a closed-form timing model.
//!
//! Meets timing exactly up to `true_fmax_mhz`; the reported slack is the
//! difference between the requested period and the design's true period, so
//! the search can extrapolate from it as it would from a real tool.

use std::path::Path;
use std::time::Duration;

use crate::domain::error::FlowError;
use crate::domain::models::{FlowResult, JobSettings};
use crate::domain::ports::Flow;

/// File the synthetic flow writes its result to.
pub const SYNTHETIC_RESULTS_FILE: &str = "synthetic_results.json";

#[derive(Debug, Clone)]
pub struct SyntheticFlow {
    name: String,
    true_fmax_mhz: f64,
    delay: Duration,
}

impl SyntheticFlow {
    pub fn new(name: impl Into<String>, true_fmax_mhz: f64) -> Self {
        Self {
            name: name.into(),
            true_fmax_mhz,
            delay: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Reads `true_fmax_mhz` and optional `delay_ms` from the flow settings.
    pub fn from_settings(name: &str, settings: &JobSettings) -> Result<Self, FlowError> {
        let true_fmax = settings.flow.get_f64("true_fmax_mhz").ok_or_else(|| {
            FlowError::InvalidSettings("synthetic flow requires 'true_fmax_mhz'".to_string())
        })?;
        if true_fmax <= 0.0 {
            return Err(FlowError::InvalidSettings(format!(
                "true_fmax_mhz must be positive, got {true_fmax}"
            )));
        }
        let delay = Duration::from_millis(settings.flow.get_u64("delay_ms").unwrap_or(0));
        Ok(Self::new(name, true_fmax).with_delay(delay))
    }

    /// Timing result for a clock period in ns.
    pub fn evaluate(&self, clock_period: f64) -> FlowResult {
        let true_period = 1000.0 / self.true_fmax_mhz;
        let wns = clock_period - true_period;
        let frequency = 1000.0 / clock_period;
        FlowResult::new(wns >= 0.0, wns, clock_period)
            .with_metric("clock_frequency", frequency)
            .with_metric("lut", 1000 + (frequency * 2.0).round() as i64)
            .with_metric("ff", 800_i64)
    }
}

impl Flow for SyntheticFlow {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, settings: &JobSettings, run_dir: &Path) -> Result<(), FlowError> {
        let clock_period = settings.clock_period().ok_or_else(|| {
            FlowError::InvalidSettings("missing flow.clock_period".to_string())
        })?;
        if clock_period <= 0.0 {
            return Err(FlowError::InvalidSettings(format!(
                "clock_period must be positive, got {clock_period}"
            )));
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }

        let result = self.evaluate(clock_period);
        let json = serde_json::to_vec_pretty(&result).map_err(|source| {
            FlowError::MalformedResults {
                path: run_dir.join(SYNTHETIC_RESULTS_FILE),
                source,
            }
        })?;
        std::fs::write(run_dir.join(SYNTHETIC_RESULTS_FILE), json)?;
        Ok(())
    }

    fn collect_result(&self, run_dir: &Path) -> Result<FlowResult, FlowError> {
        super::read_results(&run_dir.join(SYNTHETIC_RESULTS_FILE))
    }
}
