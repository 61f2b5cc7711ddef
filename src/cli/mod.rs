//! Command-line interface.

pub mod commands;

use crate::core::config::ConfigOverrides;
use clap::{Parser, Subcommand};

/// Tessera - atomic update-decision core for a replicated key-value cache.
#[derive(Parser, Debug)]
#[command(name = "tessera")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path.
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Override the number of backup replicas.
    #[arg(long, global = true)]
    pub backups: Option<u32>,

    /// Override the local cluster id.
    #[arg(long, global = true)]
    pub cluster_id: Option<u8>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Config overrides taken from the global flags.
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            log_level: self.log_level.clone(),
            backups: self.backups,
            cluster_id: self.cluster_id,
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Configuration operations.
    Config(commands::ConfigArgs),
    /// Replay a script of writes against a primary/backup partition pair.
    Simulate(commands::SimulateArgs),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_overrides_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tessera",
            "simulate",
            "--script",
            "ops.json",
            "--backups",
            "0",
            "--cluster-id",
            "4",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.backups, Some(0));
        assert_eq!(overrides.cluster_id, Some(4));
        assert_eq!(overrides.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Simulate(_)));
    }

    #[test]
    fn test_no_flags_no_overrides() {
        let cli = Cli::try_parse_from(["tessera", "config", "validate"]).unwrap();
        let overrides = cli.overrides();
        assert_eq!(overrides.backups, None);
        assert_eq!(overrides.cluster_id, None);
        assert_eq!(overrides.log_level, None);
    }

    #[test]
    fn test_cluster_id_out_of_range_rejected() {
        let result = Cli::try_parse_from(["tessera", "--cluster-id", "300", "config", "validate"]);
        assert!(result.is_err());
    }
}
