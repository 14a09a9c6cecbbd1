//! List repair failures.

use std::path::Path;

use anyhow::Result;

/// One filename per line, in checkpoint order.
pub fn failed(config_path: Option<&Path>) -> Result<()> {
    let config = super::load_config(config_path)?;
    let checkpoint = super::open_checkpoint(&config)?;

    for wheel in checkpoint.failed() {
        println!("{wheel}");
    }
    Ok(())
}
