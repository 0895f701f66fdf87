//! CLI command implementations.

pub mod hash;
pub mod search;
pub mod worker;
