//! fmax CLI entry point.

use clap::Parser;

use fmax::cli::{Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Search(args) => fmax::cli::commands::search::execute(args, cli.json).await,
        Commands::Hash(args) => fmax::cli::commands::hash::execute(args, cli.json).await,
        Commands::Worker(args) => fmax::cli::commands::worker::execute(args).await,
    };

    if let Err(err) = result {
        fmax::cli::handle_error(err, cli.json);
    }
}
