use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while fingerprinting a settings tree
#[derive(Error, Debug)]
pub enum HashError {
    #[error("Referenced file not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    #[error("Failed to read referenced file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid file reference at '{key_path}': expected a path string")]
    InvalidFileReference { key_path: String },
}

/// Errors raised while resolving a run directory
#[derive(Error, Debug)]
pub enum RunDirError {
    #[error("Failed to create run directory {}: {source}", path.display())]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Run directory path exists but is not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },
}

/// Errors raised by a flow collaborator
#[derive(Error, Debug)]
pub enum FlowError {
    #[error("Unknown flow: {0}")]
    UnknownFlow(String),

    #[error("Invalid flow settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to launch '{program}': {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Flow command exited with {0}")]
    CommandFailed(String),

    #[error("Results file not found: {}", path.display())]
    MissingResults { path: PathBuf },

    #[error("Malformed results in {}: {source}", path.display())]
    MalformedResults {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a job, inside or outside its worker
#[derive(Error, Debug)]
pub enum JobError {
    #[error("Flow failed: {0}")]
    Flow(#[from] FlowError),

    #[error("No stored result in {}", run_dir.display())]
    NoResult { run_dir: PathBuf },

    #[error("Stored result in {} belongs to another job", run_dir.display())]
    FingerprintMismatch { run_dir: PathBuf },

    #[error("Failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize {}: {source}", path.display())]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised by a batch executor as a whole
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("Executor is shut down")]
    Closed,

    #[error("Executor failure: {0}")]
    Internal(String),
}

/// Errors that stop a search before any job is submitted
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Missing design name")]
    MissingDesignName,

    #[error("Missing settings for flow '{0}'")]
    MissingFlowSettings(String),

    #[error("Invalid frequency range: low {lo} MHz must be positive and below high {hi} MHz")]
    InvalidRange { lo: f64, hi: f64 },

    #[error("Invalid resolution: {0} (must be positive)")]
    InvalidResolution(f64),

    #[error("Failed to fingerprint job settings: {0}")]
    Hash(#[from] HashError),

    #[error("Failed to prepare run directory: {0}")]
    RunDir(#[from] RunDirError),
}
