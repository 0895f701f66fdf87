//! Flow port - interface for synthesis tool adapters.

use std::path::Path;

use crate::domain::error::FlowError;
use crate::domain::models::{FlowResult, JobSettings};

/// A synthesis flow that can be run inside a run directory.
///
/// Implementations block; they run inside a dedicated worker process, so a
/// misbehaving tool cannot take the search down with it.
pub trait Flow: Send + Sync {
    /// Flow name as used in run directory and report names.
    fn name(&self) -> &str;

    /// Run the tool with `settings` in `run_dir`.
    fn execute(&self, settings: &JobSettings, run_dir: &Path) -> Result<(), FlowError>;

    /// Read back what the last `execute` in `run_dir` produced.
    fn collect_result(&self, run_dir: &Path) -> Result<FlowResult, FlowError>;
}
