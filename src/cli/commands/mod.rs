//! CLI command implementations.

mod config;
mod simulate;

pub use config::{run_config, ConfigArgs};
pub use simulate::{run_simulate, SimulateArgs};

use crate::core::config::{Config, ConfigOverrides};
use anyhow::{Context, Result};
use std::path::Path;

/// Load a config file, or defaults when no file is given, then apply overrides.
pub fn load_config(path: Option<&Path>, overrides: &ConfigOverrides) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("failed to load config from {:?}", path))?,
        None => Config::default(),
    };
    config.apply_overrides(overrides);
    config.validate()?;
    Ok(config)
}
