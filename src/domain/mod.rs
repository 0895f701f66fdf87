//! Domain layer for fmax
//!
//! This module contains the search state, job settings and result models,
//! and the ports the application layer runs against.

pub mod error;
pub mod models;
pub mod ports;

// Re-export error types for convenient access
pub use error::{ExecutorError, FlowError, HashError, JobError, RunDirError, SearchError};
