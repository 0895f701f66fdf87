//! Flow adapter implementations.

pub mod command;
pub mod synthetic;

pub use command::CommandFlow;
pub use synthetic::SyntheticFlow;

use std::path::Path;

use crate::domain::error::FlowError;
use crate::domain::models::{FlowResult, JobSettings};
use crate::domain::ports::Flow;

/// Builds the flow adapter for a job.
///
/// The flow settings may name an adapter explicitly with `adapter`;
/// otherwise a flow called `synthetic` gets the synthetic adapter and any
/// flow with a `command` gets the command adapter.
#[derive(Debug, Default, Clone, Copy)]
pub struct FlowRegistry;

impl FlowRegistry {
    pub const fn new() -> Self {
        Self
    }

    pub fn create(&self, flow_name: &str, settings: &JobSettings) -> Result<Box<dyn Flow>, FlowError> {
        let adapter = settings.flow.get_str("adapter").map_or_else(
            || {
                if flow_name == "synthetic" {
                    "synthetic"
                } else if settings.flow.get_path("command").is_some() {
                    "command"
                } else {
                    ""
                }
            },
            |explicit| explicit,
        );

        match adapter {
            "synthetic" => Ok(Box::new(SyntheticFlow::from_settings(flow_name, settings)?)),
            "command" => Ok(Box::new(CommandFlow::from_settings(flow_name, settings)?)),
            _ => Err(FlowError::UnknownFlow(flow_name.to_string())),
        }
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        vec!["command", "synthetic"]
    }
}

/// Parse a results file written by a flow.
pub(crate) fn read_results(path: &Path) -> Result<FlowResult, FlowError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(FlowError::MissingResults {
                path: path.to_path_buf(),
            })
        }
        Err(e) => return Err(FlowError::Io(e)),
    };
    serde_json::from_slice(&bytes).map_err(|source| FlowError::MalformedResults {
        path: path.to_path_buf(),
        source,
    })
}
