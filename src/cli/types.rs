//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};

use super::commands::hash::HashArgs;
use super::commands::search::SearchArgs;
use super::commands::worker::WorkerArgs;

#[derive(Parser)]
#[command(name = "fmax")]
#[command(about = "fmax - adaptive maximum clock frequency search", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for the highest frequency at which a flow meets timing
    Search(SearchArgs),

    /// Print the settings fingerprint of a flow run
    Hash(HashArgs),

    /// Run a single job file (used by the worker pool)
    #[command(hide = true)]
    Worker(WorkerArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_worker_is_hidden() {
        let help = Cli::command().render_help().to_string();
        assert!(help.contains("search"));
        assert!(!help.contains("worker"));
    }

    #[test]
    fn test_global_json_flag() {
        let cli = Cli::parse_from(["fmax", "hash", "design.json", "--flow", "synthetic", "--json"]);
        assert!(cli.json);
        assert!(matches!(cli.command, Commands::Hash(_)));
    }
}
