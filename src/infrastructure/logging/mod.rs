//! Logging infrastructure
//!
//! Structured logging using tracing and tracing-subscriber:
//! - Pretty or JSON console output
//! - JSON log files under the run root
pub mod config;
pub mod logger;

pub use config::{ConsoleTarget, LogConfig, LogFormat};
pub use logger::LoggerImpl;
