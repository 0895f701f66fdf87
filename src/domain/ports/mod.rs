//! Port trait definitions (Hexagonal Architecture)
//!
//! - Flow: a synthesis tool run inside a run directory
//! - BatchExecutor: concurrent execution of job batches

pub mod executor;
pub mod flow;

pub use executor::BatchExecutor;
pub use flow::Flow;
