//! End-to-end run: setup, query, classify everything pending, summarize.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use wheelfix_schema::{ArtifactDescriptor, ArtifactEntry};

use crate::checkpoint::Checkpoint;
use crate::classify::Classifier;
use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::PipelineError;
use crate::io::{ArtifactStore, ArtifactoryClient};
use crate::paths::Layout;
use crate::repair::{self, Auditwheel};
use crate::reporter::Reporter;
use crate::summary::RunSummary;
use crate::venv::{InterpreterRegistry, VenvTester};

/// Run the whole pipeline against the configured repository.
///
/// # Errors
///
/// Returns an error for setup failures (directories, missing repair tool,
/// unreadable checkpoint, failed query) and for a checkpoint flush failure.
/// Per-artifact failures are counted in the returned summary instead.
pub async fn run_pipeline<R, F>(
    config: &Config,
    reporter: R,
    shutdown: F,
) -> Result<RunSummary, PipelineError>
where
    R: Reporter,
    F: Future<Output = ()>,
{
    config.validate_for_run()?;

    let layout = Layout::new(&config.dirs);
    layout.ensure()?;

    let program = repair::preflight(&config.repair.program)?;
    tracing::info!(repair_tool = %program.display(), "preflight ok");

    let store: Arc<dyn ArtifactStore> =
        Arc::new(ArtifactoryClient::new(config.store.clone(), layout.clone())?);
    let registry = InterpreterRegistry::from_config(&config.install);
    let classifier = Classifier::new(
        Arc::clone(&store),
        Arc::new(Auditwheel::new(config.repair.clone())),
        Arc::new(VenvTester::new(registry.clone(), &config.install)),
        registry,
        layout.clone(),
    );

    execute(
        store.as_ref(),
        Arc::new(classifier),
        &layout,
        config.run.workers,
        reporter,
        shutdown,
    )
    .await
}

/// The run after components are built: checkpoint, query, coordinate.
///
/// # Errors
///
/// See [`run_pipeline`].
pub async fn execute<R, F>(
    store: &dyn ArtifactStore,
    classifier: Arc<Classifier>,
    layout: &Layout,
    workers: usize,
    reporter: R,
    shutdown: F,
) -> Result<RunSummary, PipelineError>
where
    R: Reporter,
    F: Future<Output = ()>,
{
    let mut checkpoint = Checkpoint::load(layout.output_dir())?;
    let mut summary = RunSummary::replay(&checkpoint);
    reporter.info(&format!("{} artifacts already processed", checkpoint.len()));

    reporter.section("Querying");
    let entries = store.query().await?;
    reporter.info(&format!("{} artifacts in source repository", entries.len()));

    let artifacts = descriptors(entries, &mut summary, &reporter);

    reporter.section("Processing");
    let coordinator = Coordinator::new(classifier, workers, &reporter);
    let report = coordinator
        .run(artifacts, &mut checkpoint, &mut summary, shutdown)
        .await?;
    if report.not_dispatched > 0 {
        reporter.warning(&format!(
            "Interrupted: {} artifacts left for the next run",
            report.not_dispatched
        ));
    }

    reporter.summary(&summary.to_string());
    Ok(summary)
}

/// Dedupe entries by filename (first wins) and parse them. Unparseable
/// names are counted as errors.
fn descriptors<R: Reporter>(
    entries: Vec<ArtifactEntry>,
    summary: &mut RunSummary,
    reporter: &R,
) -> Vec<ArtifactDescriptor> {
    let mut unique: BTreeMap<String, ArtifactEntry> = BTreeMap::new();
    for entry in entries {
        if let Some(first) = unique.get(&entry.name) {
            tracing::warn!(
                wheel = %entry.name,
                kept = %first.location(),
                ignored = %entry.location(),
                "duplicate filename"
            );
            continue;
        }
        unique.insert(entry.name.clone(), entry);
    }

    unique
        .into_values()
        .filter_map(|entry| {
            let name = entry.name.clone();
            match ArtifactDescriptor::from_entry(entry) {
                Ok(d) => Some(d),
                Err(e) => {
                    tracing::warn!(wheel = %name, error = %e, "skipping artifact");
                    reporter.failed(&name, &e.to_string());
                    summary.record_error();
                    None
                }
            }
        })
        .collect()
}
