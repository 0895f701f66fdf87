use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::domain::models::Config;

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Console format (json, pretty)
    #[serde(default = "default_format")]
    pub format: LogFormat,

    /// Directory for log files (optional, if None logs only to the console)
    pub log_dir: Option<PathBuf>,

    /// Where console output goes
    #[serde(default)]
    pub console: ConsoleTarget,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Console stream for log output
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleTarget {
    #[default]
    Stdout,
    /// Keeps stdout free for command output
    Stderr,
    None,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_format(),
            log_dir: None,
            console: ConsoleTarget::default(),
        }
    }
}

impl LogConfig {
    /// Logging for the search command: console plus JSON files under
    /// `<root>/Logs` when enabled.
    pub fn for_search(config: &Config) -> Self {
        Self {
            level: config.logging.level.clone(),
            format: parse_format(&config.logging.format),
            log_dir: config.logging.log_to_file.then(|| config.runs.logs_dir()),
            console: ConsoleTarget::Stderr,
        }
    }

    /// Logging inside a worker process: stderr only, which the pool
    /// redirects into the run directory's log.
    pub fn for_worker(config: &Config) -> Self {
        Self {
            level: config.logging.level.clone(),
            format: LogFormat::Pretty,
            log_dir: None,
            console: ConsoleTarget::Stderr,
        }
    }
}

fn parse_format(format: &str) -> LogFormat {
    if format.eq_ignore_ascii_case("json") {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_format() -> LogFormat {
    LogFormat::Pretty
}
