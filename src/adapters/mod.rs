//! Adapters for external synthesis tools.

pub mod flows;
