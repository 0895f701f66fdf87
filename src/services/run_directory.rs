//! Content-addressed run directories.
//!
//! Each job runs in `<root>/<design>/<flow>_<fingerprint>`, so identical
//! settings land in the same directory and can reuse what is stored there.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::error::RunDirError;
use crate::domain::models::Fingerprint;

/// A run directory and whether it existed before this resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunDirectory {
    pub path: PathBuf,
    pub reused: bool,
}

/// Maps `(design, flow, fingerprint)` to a stable directory under a root.
///
/// Identical settings always land in the same directory, so a later run can
/// pick up what an earlier one left behind.
#[derive(Debug, Clone)]
pub struct CachedRunDirectoryResolver {
    base_dir: PathBuf,
}

impl CachedRunDirectoryResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Path for the job without touching the filesystem.
    pub fn path_for(&self, design: &str, flow: &str, fingerprint: &Fingerprint) -> PathBuf {
        self.base_dir
            .join(sanitize_component(design))
            .join(sanitize_component(&format!("{flow}_{fingerprint}")))
    }

    /// Resolve and create the run directory.
    pub fn resolve(
        &self,
        design: &str,
        flow: &str,
        fingerprint: &Fingerprint,
    ) -> Result<RunDirectory, RunDirError> {
        let path = self.path_for(design, flow, fingerprint);

        if path.exists() {
            if !path.is_dir() {
                return Err(RunDirError::NotADirectory { path });
            }
            warn!(
                run_dir = %path.display(),
                fingerprint = %fingerprint.short(),
                "Using existing run directory"
            );
            return Ok(RunDirectory { path, reused: true });
        }

        // create_dir_all tolerates a concurrent creator
        std::fs::create_dir_all(&path).map_err(|source| RunDirError::Create {
            path: path.clone(),
            source,
        })?;
        debug!(run_dir = %path.display(), "Created run directory");

        Ok(RunDirectory {
            path,
            reused: false,
        })
    }
}

/// Make `name` safe as a single path component.
pub fn sanitize_component(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match cleaned.as_str() {
        "" | "." | ".." => "_".to_string(),
        _ => cleaned,
    }
}
