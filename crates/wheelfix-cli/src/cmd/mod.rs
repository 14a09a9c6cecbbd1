//! Subcommand implementations.

pub mod failed;
pub mod run;
pub mod summary;

use std::path::Path;

use anyhow::{Context, Result};
use wheelfix_core::{Checkpoint, Config};

/// Load the config file (defaults when absent), then apply environment
/// overrides.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let mut config = Config::load(path).with_context(|| match path {
        Some(p) => format!("Failed to load config {}", p.display()),
        None => "Failed to load default config".to_string(),
    })?;
    config.apply_env()?;
    Ok(config)
}

/// Open the checkpoint in the configured output directory.
pub fn open_checkpoint(config: &Config) -> Result<Checkpoint> {
    Checkpoint::load(&config.dirs.output).with_context(|| {
        format!(
            "Failed to read checkpoint in {}",
            config.dirs.output.display()
        )
    })
}
