//! Configuration parsing and validation.
//!
//! Tessera configuration is loaded from TOML files with CLI overrides.
//! Every section is optional and falls back to defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level Tessera configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Partition identity and topology.
    #[serde(default)]
    pub partition: PartitionConfig,

    /// Expiry policy.
    #[serde(default)]
    pub ttl: TtlConfig,

    /// Deferred delete retention.
    #[serde(default)]
    pub tombstones: TombstoneConfig,

    /// Cross-cluster conflict resolution.
    #[serde(default)]
    pub conflict: ConflictConfig,

    /// Telemetry configuration.
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Partition identity and topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Partition number (informational, used in log fields).
    #[serde(default)]
    pub partition_id: u32,

    /// Local cluster (data center) id stamped into every minted version.
    #[serde(default = "default_cluster_id")]
    pub cluster_id: u8,

    /// Local node order in the topology, stamped into every minted version.
    #[serde(default = "default_topology_order")]
    pub topology_order: u32,

    /// Number of backup replicas. Zero disables deferred delete tracking.
    #[serde(default = "default_backups")]
    pub backups: u32,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            partition_id: 0,
            cluster_id: default_cluster_id(),
            topology_order: default_topology_order(),
            backups: default_backups(),
        }
    }
}

/// Expiry policy configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtlConfig {
    /// TTL applied when an entry is created without an explicit TTL (0 = eternal).
    #[serde(default)]
    pub default_ttl_ms: u64,

    /// Upper bound for explicit TTLs (0 = unbounded). Larger values are clamped.
    #[serde(default)]
    pub max_ttl_ms: u64,
}

/// Deferred delete retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TombstoneConfig {
    /// How long a removed version is retained before purge.
    #[serde(default = "default_grace_period_ms")]
    pub grace_period_ms: u64,

    /// Maximum number of retained tombstones; the oldest are purged first.
    #[serde(default = "default_max_tombstones")]
    pub max_tombstones: usize,
}

impl Default for TombstoneConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            max_tombstones: default_max_tombstones(),
        }
    }
}

/// Conflict resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Built-in policy name. Only "last_writer_wins" is available from config.
    #[serde(default = "default_conflict_policy")]
    pub policy: String,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            policy: default_conflict_policy(),
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

// Default value functions for serde

fn default_cluster_id() -> u8 {
    1
}

fn default_topology_order() -> u32 {
    1
}

fn default_backups() -> u32 {
    1
}

fn default_grace_period_ms() -> u64 {
    10_000
}

fn default_max_tombstones() -> usize {
    100_000
}

fn default_conflict_policy() -> String {
    "last_writer_wins".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {:?}", path))?;

        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("failed to parse TOML config")?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI overrides to the configuration.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(ref level) = overrides.log_level {
            self.telemetry.log_level = level.clone();
        }
        if let Some(backups) = overrides.backups {
            self.partition.backups = backups;
        }
        if let Some(cluster_id) = overrides.cluster_id {
            self.partition.cluster_id = cluster_id;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.validate_ttl()?;
        self.validate_tombstones()?;
        self.validate_conflict()?;
        self.validate_telemetry()?;
        Ok(())
    }

    fn validate_ttl(&self) -> Result<()> {
        let ttl = &self.ttl;
        if ttl.max_ttl_ms > 0 && ttl.default_ttl_ms > ttl.max_ttl_ms {
            anyhow::bail!(
                "ttl.default_ttl_ms ({}) cannot exceed ttl.max_ttl_ms ({})",
                ttl.default_ttl_ms,
                ttl.max_ttl_ms
            );
        }
        Ok(())
    }

    fn validate_tombstones(&self) -> Result<()> {
        if self.tombstones.grace_period_ms == 0 {
            anyhow::bail!("tombstones.grace_period_ms must be > 0");
        }
        if self.tombstones.max_tombstones == 0 {
            anyhow::bail!("tombstones.max_tombstones must be > 0");
        }
        Ok(())
    }

    fn validate_conflict(&self) -> Result<()> {
        if self.conflict.policy != "last_writer_wins" {
            anyhow::bail!(
                "conflict.policy must be 'last_writer_wins', got: {}",
                self.conflict.policy
            );
        }
        Ok(())
    }

    fn validate_telemetry(&self) -> Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            anyhow::bail!(
                "telemetry.log_level must be one of {:?}, got: {}",
                valid_levels,
                self.telemetry.log_level
            );
        }
        Ok(())
    }
}

/// CLI override options that can be applied to configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    /// Override log level.
    pub log_level: Option<String>,
    /// Override backup count.
    pub backups: Option<u32>,
    /// Override local cluster id.
    pub cluster_id: Option<u8>,
}
