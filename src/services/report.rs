//! Final report naming and persistence.

use chrono::{DateTime, TimeZone};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::run_directory::sanitize_component;
use crate::domain::models::FmaxReport;

/// Run timestamp: date, time and milliseconds, e.g. `2024-03-05-142301123`.
pub fn report_timestamp<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%Y-%m-%d-%H%M%S%3f").to_string()
}

/// `<root>/fmax_<design>_<flow>_<timestamp>.json`
pub fn report_path(root: &Path, design: &str, flow: &str, timestamp: &str) -> PathBuf {
    root.join(format!(
        "fmax_{}_{}_{}.json",
        sanitize_component(design),
        sanitize_component(flow),
        timestamp
    ))
}

/// Write `report` under `root` and return where it went.
pub fn write_report(report: &FmaxReport, root: &Path) -> std::io::Result<PathBuf> {
    fs::create_dir_all(root)?;
    let path = report_path(root, &report.design, &report.flow, &report.timestamp);
    let json = serde_json::to_vec_pretty(report)?;
    fs::write(&path, json)?;
    info!(path = %path.display(), "Wrote Fmax report");
    Ok(path)
}
