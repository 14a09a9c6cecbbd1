//! Bounded worker pool around the classifier.
//!
//! Workers only classify. The coordinating task is the sole owner of the
//! checkpoint and the summary: it merges and flushes each result as it
//! arrives, so checkpoint writes are serialized and progress is monotonic.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;

use wheelfix_schema::{ArtifactDescriptor, Outcome};

use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::classify::Classifier;
use crate::error::PipelineError;
use crate::reporter::{Reporter, progress_line};
use crate::summary::RunSummary;

/// How a batch ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub dispatched: usize,
    /// Artifacts left undispatched because shutdown was requested.
    pub not_dispatched: usize,
}

pub struct Coordinator<R: Reporter> {
    classifier: Arc<Classifier>,
    workers: usize,
    reporter: R,
}

impl<R: Reporter> Coordinator<R> {
    pub fn new(classifier: Arc<Classifier>, workers: usize, reporter: R) -> Self {
        Self {
            classifier,
            workers: workers.max(1),
            reporter,
        }
    }

    /// Classify every artifact not already in `checkpoint`.
    ///
    /// When `shutdown` resolves no further artifacts are dispatched; those
    /// in flight finish and are recorded.
    ///
    /// # Errors
    ///
    /// Only a checkpoint flush failure ends the batch early. Per-artifact
    /// errors are logged and counted in `summary`.
    pub async fn run<F>(
        &self,
        artifacts: Vec<ArtifactDescriptor>,
        checkpoint: &mut Checkpoint,
        summary: &mut RunSummary,
        shutdown: F,
    ) -> Result<BatchReport, CheckpointError>
    where
        F: Future<Output = ()>,
    {
        let mut pending: Vec<ArtifactDescriptor> = artifacts
            .into_iter()
            .filter(|a| !checkpoint.contains(a.name()))
            .collect();
        pending.sort_by(|a, b| a.name().cmp(b.name()));

        let total = checkpoint.len() + pending.len();
        let mut done = checkpoint.len();
        let mut queue = pending.into_iter();
        let mut dispatched = 0;

        tracing::info!(
            pending = total - done,
            already = done,
            workers = self.workers,
            "dispatching"
        );

        let mut set: JoinSet<(String, Result<Outcome, PipelineError>)> = JoinSet::new();
        let mut stopping = false;
        tokio::pin!(shutdown);

        loop {
            while !stopping && set.len() < self.workers {
                let Some(artifact) = queue.next() else { break };
                let classifier = Arc::clone(&self.classifier);
                dispatched += 1;
                set.spawn(async move {
                    let result = classifier.classify(&artifact).await;
                    (artifact.name().to_string(), result)
                });
            }

            if set.is_empty() {
                break;
            }

            tokio::select! {
                () = &mut shutdown, if !stopping => {
                    stopping = true;
                    self.reporter.warning(&format!(
                        "Shutdown requested, waiting for {} in-flight artifacts",
                        set.len()
                    ));
                }
                Some(joined) = set.join_next() => {
                    match joined {
                        Ok((name, Ok(outcome))) => {
                            checkpoint.merge(outcome.clone());
                            checkpoint.flush().await?;
                            summary.record(&outcome);
                            self.reporter.done(&name, &describe(&outcome));
                        }
                        Ok((name, Err(e))) => {
                            tracing::error!(wheel = %name, error = %e, "artifact failed");
                            summary.record_error();
                            self.reporter.failed(&name, &e.to_string());
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "worker task failed");
                            summary.record_error();
                            self.reporter.failed("<worker>", &e.to_string());
                        }
                    }
                    done += 1;
                    tracing::debug!("{}", progress_line(done, total));
                    self.reporter.progress(done, total);
                }
            }
        }

        Ok(BatchReport {
            dispatched,
            not_dispatched: queue.len(),
        })
    }
}

fn describe(outcome: &Outcome) -> String {
    format!(
        "repair {}, install {}",
        outcome.repair.status, outcome.install.status
    )
}
