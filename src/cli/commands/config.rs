//! Config command implementation.

use crate::core::config::Config;
use anyhow::Result;
use clap::{Args, Subcommand};
use std::path::Path;

/// Configuration operations.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands.
///
/// The file is taken from the global `--config` flag.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Validate configuration file.
    Validate,
    /// Print configuration with defaults filled in.
    Show {
        /// Output format (toml, json).
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

/// Default config location when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/tessera.toml";

/// Run the config command.
pub fn run_config(args: ConfigArgs, config: Option<&Path>) -> Result<()> {
    let path = config.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_PATH));
    match args.command {
        ConfigCommand::Validate => validate_config(path),
        ConfigCommand::Show { format } => show_config(path, &format),
    }
}

fn validate_config(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {:?}", path);
    }

    let config = Config::from_file(path)?;
    println!("✓ Configuration is valid");
    if config.partition.backups == 0 {
        println!("  ⚠ Warning: partition.backups = 0; removes will not retain tombstone versions");
    }
    if config.ttl.max_ttl_ms > 0 && config.ttl.default_ttl_ms == 0 {
        println!("  ⚠ Warning: ttl.max_ttl_ms is set but new entries default to eternal");
    }
    Ok(())
}

fn show_config(path: &Path, format: &str) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {:?}", path);
    }

    let config = Config::from_file(path)?;
    println!("{}", render_config(&config, format)?);
    Ok(())
}

fn render_config(config: &Config, format: &str) -> Result<String> {
    match format {
        "json" => Ok(serde_json::to_string_pretty(config)?),
        "toml" => Ok(toml::to_string_pretty(config)?),
        other => anyhow::bail!("unsupported format: {} (expected toml or json)", other),
    }
}
