//! Offline summary from the checkpoint.

use std::path::Path;

use anyhow::Result;
use wheelfix_core::RunSummary;

pub fn summary(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = super::load_config(config_path)?;
    let checkpoint = super::open_checkpoint(&config)?;
    let summary = RunSummary::replay(&checkpoint);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }
    Ok(())
}
