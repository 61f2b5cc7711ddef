//! Tessera - unified CLI entrypoint.
//!
//! Usage:
//!   tessera --config config/tessera.toml config validate
//!   tessera --config config/tessera.toml config show [--format json]
//!   tessera --config config/tessera.toml simulate --script ops.json
//!   tessera --backups 0 --cluster-id 2 simulate --script ops.json

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tessera::cli::commands::{run_config, run_simulate};
use tessera::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let overrides = cli.overrides();
    let config_path = cli.config.map(PathBuf::from);

    match cli.command {
        Commands::Config(args) => run_config(args, config_path.as_deref()),
        Commands::Simulate(args) => {
            run_simulate(args, config_path.as_deref(), &overrides).await
        }
    }
}
