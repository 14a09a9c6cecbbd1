//! Full pipeline run.

use std::path::Path;

use anyhow::{Context, Result};

use crate::ui::ConsoleReporter;

/// Run the pipeline until every queried wheel is recorded or Ctrl-C.
pub async fn run(
    config_path: Option<&Path>,
    workers: Option<usize>,
    max_total: Option<usize>,
    quiet: bool,
) -> Result<()> {
    let mut config = super::load_config(config_path)?;
    if let Some(workers) = workers {
        config.run.workers = workers;
    }
    if let Some(max_total) = max_total {
        config.store.max_total = max_total;
    }

    let reporter = ConsoleReporter::new(quiet);
    let summary = wheelfix_core::run_pipeline(&config, reporter, shutdown_signal())
        .await
        .context("Pipeline failed")?;

    if summary.errors > 0 {
        tracing::warn!(
            errors = summary.errors,
            "some wheels were not recorded and will be retried on the next run"
        );
    }
    Ok(())
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}
