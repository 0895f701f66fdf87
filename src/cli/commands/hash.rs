//! Implementation of the `fmax hash` command.
//!
//! Prints the fingerprint a job would get and the run directory it maps to,
//! which is handy for finding or invalidating cached runs.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::design_file::DesignFile;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{ClockPeriod, JobSettings};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{CachedRunDirectoryResolver, SearchParameters, SemanticHasher};

#[derive(Args, Debug)]
pub struct HashArgs {
    /// Design settings file (JSON or YAML)
    pub design_file: PathBuf,

    /// Flow section to hash
    #[arg(short, long)]
    pub flow: String,

    /// Hash the job for this frequency (MHz), as the search would build it
    #[arg(long)]
    pub frequency: Option<f64>,

    /// Also print the canonical text that was hashed
    #[arg(long)]
    pub canonical: bool,

    /// Override a design file setting
    #[arg(long = "set", value_name = "KEY.PATH=VALUE")]
    pub overrides: Vec<String>,
}

#[derive(Debug, serde::Serialize)]
pub struct HashOutput {
    pub design: String,
    pub flow: String,
    pub fingerprint: String,
    pub run_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical: Option<String>,
}

impl CommandOutput for HashOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.fingerprint.clone()];
        if let Some(run_dir) = &self.run_dir {
            lines.push(format!("run directory: {}", run_dir.display()));
        }
        if let Some(canonical) = &self.canonical {
            lines.push(String::new());
            lines.push(canonical.clone());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: HashArgs, json_mode: bool) -> Result<()> {
    let config = ConfigLoader::load()?;

    let mut design = DesignFile::load(&args.design_file)?;
    for assignment in &args.overrides {
        design.apply_override(assignment)?;
    }
    let request = design.request(&args.flow);
    let design_name = request.design_name()?.to_string();
    if !request.flow.as_value().is_object() {
        anyhow::bail!("No settings for flow '{}' in {}", args.flow, args.design_file.display());
    }

    let base = JobSettings::new(request.design.clone(), request.flow.clone());
    let settings = match args.frequency {
        Some(freq) => {
            let nthreads = SearchParameters::resolve(&config, &request.flow).nthreads;
            base.for_clock_period(ClockPeriod::from_mhz(freq).as_ns(), nthreads)
        }
        None => base,
    };
    let tree = settings.to_tree();

    let hasher = SemanticHasher::new(design.base_dir());
    let fingerprint = hasher
        .fingerprint(&tree)
        .context("Failed to fingerprint settings")?;
    let canonical = if args.canonical {
        Some(hasher.canonical_text(&tree)?)
    } else {
        None
    };

    // only a full job has a run directory
    let run_dir = args.frequency.map(|_| {
        let root = std::path::absolute(&config.runs.root_dir).unwrap_or(config.runs.root_dir);
        CachedRunDirectoryResolver::new(root).path_for(&design_name, &args.flow, &fingerprint)
    });

    output(
        &HashOutput {
            design: design_name,
            flow: args.flow,
            fingerprint: fingerprint.to_string(),
            run_dir,
            canonical,
        },
        json_mode,
    );
    Ok(())
}
