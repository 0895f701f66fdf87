//! Generic flow that runs an external command in the run directory.
//!
//! The command is an argv template taken from the flow settings. The tool is
//! expected to leave a JSON results file behind with at least `success` and
//! `wns`; any other keys are kept as opaque metrics.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::application::job::SETTINGS_FILE;
use crate::domain::error::FlowError;
use crate::domain::models::{FlowResult, JobSettings};
use crate::domain::ports::Flow;

/// Results file read when the settings name none.
pub const DEFAULT_RESULTS_FILE: &str = "results.json";

#[derive(Debug, Clone)]
pub struct CommandFlow {
    name: String,
    argv: Vec<String>,
    results_file: PathBuf,
    clock_period: Option<f64>,
}

impl CommandFlow {
    /// Reads `command` (a list of arguments, or a string run through
    /// `sh -c`) and `results_file` from the flow settings.
    pub fn from_settings(name: &str, settings: &JobSettings) -> Result<Self, FlowError> {
        let argv = match settings.flow.get_path("command") {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(serde_json::Value::String(line)) => {
                vec!["sh".to_string(), "-c".to_string(), line.clone()]
            }
            _ => {
                return Err(FlowError::InvalidSettings(format!(
                    "flow '{name}' needs a 'command' list or string"
                )))
            }
        };
        if argv.is_empty() {
            return Err(FlowError::InvalidSettings(format!(
                "flow '{name}' has an empty command"
            )));
        }

        let results_file = settings
            .flow
            .get_str("results_file")
            .unwrap_or(DEFAULT_RESULTS_FILE)
            .into();

        Ok(Self {
            name: name.to_string(),
            argv,
            results_file,
            clock_period: settings.clock_period(),
        })
    }

    /// Substitute `{clock_period}`, `{nthreads}`, `{run_dir}` and
    /// `{settings}` in every argument.
    fn render_argv(&self, settings: &JobSettings, run_dir: &Path) -> Vec<String> {
        let clock_period = settings
            .clock_period()
            .map(|p| p.to_string())
            .unwrap_or_default();
        let nthreads = settings
            .flow
            .get_u64("nthreads")
            .map(|n| n.to_string())
            .unwrap_or_default();
        let run_dir_str = run_dir.display().to_string();
        let settings_path = run_dir.join(SETTINGS_FILE).display().to_string();

        self.argv
            .iter()
            .map(|arg| {
                arg.replace("{clock_period}", &clock_period)
                    .replace("{nthreads}", &nthreads)
                    .replace("{run_dir}", &run_dir_str)
                    .replace("{settings}", &settings_path)
            })
            .collect()
    }
}

impl Flow for CommandFlow {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, settings: &JobSettings, run_dir: &Path) -> Result<(), FlowError> {
        let argv = self.render_argv(settings, run_dir);
        let Some((program, args)) = argv.split_first() else {
            return Err(FlowError::InvalidSettings("empty command".to_string()));
        };

        let log_path = run_dir.join(format!("{}_stdout.log", self.name));
        let log = File::create(&log_path)?;
        let log_err = log.try_clone()?;
        info!(program = %program, args = ?args, log = %log_path.display(), "Launching flow command");

        let status = Command::new(program)
            .args(args)
            .current_dir(run_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            .status()
            .map_err(|source| FlowError::Launch {
                program: program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(FlowError::CommandFailed(status.to_string()));
        }
        debug!(%status, "Flow command finished");
        Ok(())
    }

    fn collect_result(&self, run_dir: &Path) -> Result<FlowResult, FlowError> {
        let mut result = super::read_results(&run_dir.join(&self.results_file))?;
        if result.clock_period == 0.0 {
            if let Some(period) = self.clock_period {
                result.clock_period = period;
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::SettingsTree;
    use serde_json::json;
    use tempfile::TempDir;

    fn settings(flow: serde_json::Value) -> JobSettings {
        JobSettings::new(SettingsTree::new(json!({"name": "aes"})), SettingsTree::new(flow))
    }

    #[test]
    fn test_placeholders_are_rendered() {
        let s = settings(json!({
            "command": ["tool", "--period={clock_period}", "-j", "{nthreads}", "{settings}"],
            "clock_period": 4.5,
            "nthreads": 2
        }));
        let flow = CommandFlow::from_settings("tool", &s).unwrap();
        let argv = flow.render_argv(&s, Path::new("/runs/x"));
        assert_eq!(
            argv,
            vec!["tool", "--period=4.5", "-j", "2", "/runs/x/settings.json"]
        );
    }

    #[test]
    fn test_missing_command_is_rejected() {
        let s = settings(json!({"clock_period": 4.0}));
        assert!(matches!(
            CommandFlow::from_settings("tool", &s),
            Err(FlowError::InvalidSettings(_))
        ));
    }

    #[test]
    fn test_shell_command_writes_results() {
        let dir = TempDir::new().unwrap();
        let s = settings(json!({
            "command": "echo '{\"success\": true, \"wns\": 0.25, \"lut\": 12}' > out.json",
            "results_file": "out.json",
            "clock_period": 4.0
        }));
        let flow = CommandFlow::from_settings("tool", &s).unwrap();
        flow.execute(&s, dir.path()).unwrap();

        let result = flow.collect_result(dir.path()).unwrap();
        assert!(result.success);
        assert!((result.clock_period - 4.0).abs() < f64::EPSILON);
        assert!(dir.path().join("tool_stdout.log").exists());
    }

    #[test]
    fn test_failing_command_is_reported() {
        let dir = TempDir::new().unwrap();
        let s = settings(json!({"command": ["sh", "-c", "exit 2"], "clock_period": 4.0}));
        let flow = CommandFlow::from_settings("tool", &s).unwrap();
        assert!(matches!(
            flow.execute(&s, dir.path()),
            Err(FlowError::CommandFailed(_))
        ));
        assert!(matches!(
            flow.collect_result(dir.path()),
            Err(FlowError::MissingResults { .. })
        ));
    }
}
