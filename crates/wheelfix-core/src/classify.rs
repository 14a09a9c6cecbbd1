//! Per-artifact state machine.
//!
//! `classify` takes one artifact from download to a final [`Outcome`]:
//! platform-independent shortcut or native repair, install test, upload
//! gating and cleanup. It never touches the checkpoint; the coordinator
//! records whatever it returns.

use std::path::Path;
use std::sync::Arc;

use wheelfix_schema::outcome::{
    MSG_NO_BINARY_CONTENT, MSG_NO_REPAIRED_OUTPUT, MSG_PLATFORM_INDEPENDENT,
};
use wheelfix_schema::{ArtifactDescriptor, InterpreterTag, Outcome, StepResult, StepStatus};

use crate::error::PipelineError;
use crate::io::{ArtifactStore, native_libraries};
use crate::paths::Layout;
use crate::repair::{RepairReport, Repairer};
use crate::venv::{InstallReport, InstallTester, InterpreterRegistry};

pub struct Classifier {
    store: Arc<dyn ArtifactStore>,
    repairer: Arc<dyn Repairer>,
    tester: Arc<dyn InstallTester>,
    registry: InterpreterRegistry,
    layout: Layout,
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("registry", &self.registry)
            .field("layout", &self.layout)
            .finish_non_exhaustive()
    }
}

impl Classifier {
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        repairer: Arc<dyn Repairer>,
        tester: Arc<dyn InstallTester>,
        registry: InterpreterRegistry,
        layout: Layout,
    ) -> Self {
        Self {
            store,
            repairer,
            tester,
            registry,
            layout,
        }
    }

    /// Produce the outcome for one artifact.
    ///
    /// Local copies are removed afterwards whether or not classification
    /// succeeded.
    ///
    /// # Errors
    ///
    /// Download, upload, environment setup and archive inspection failures
    /// are raised; the artifact is then left unrecorded.
    pub async fn classify(&self, artifact: &ArtifactDescriptor) -> Result<Outcome, PipelineError> {
        let local = self.store.ensure_present(artifact).await?;
        let out_dir = self.layout.repaired_dir(artifact.filename());

        let result = self.classify_local(artifact, &local, &out_dir).await;

        cleanup(&local, &out_dir).await;
        result
    }

    async fn classify_local(
        &self,
        artifact: &ArtifactDescriptor,
        local: &Path,
        out_dir: &Path,
    ) -> Result<Outcome, PipelineError> {
        let name = artifact.name();
        let tag = self.registry.resolve(artifact.filename());

        if artifact.filename().is_platform_independent() {
            tracing::info!(wheel = name, "platform-independent, uploading original");
            self.store.upload(local, artifact).await?;
            let install = self.install_step(tag.as_ref(), local).await?;
            return Ok(Outcome {
                wheel: name.to_string(),
                repair: StepResult::success(MSG_PLATFORM_INDEPENDENT),
                install,
                native_libraries: Vec::new(),
            });
        }

        // Output left behind by an interrupted run must never be mistaken
        // for this repair's output.
        match tokio::fs::remove_dir_all(out_dir).await {
            Ok(()) => tracing::debug!(path = %out_dir.display(), "cleared stale repair output"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        tokio::fs::create_dir_all(out_dir).await?;
        match self.repairer.repair(local, out_dir).await? {
            RepairReport::Failed { message } => {
                tracing::warn!(wheel = name, %message, "repair failed");
                Ok(Outcome::repair_failed(name, message))
            }

            RepairReport::NoBinaryContent => {
                tracing::info!(wheel = name, "no binary content, testing original");
                let install = self.install_step(tag.as_ref(), local).await?;
                if publishable(&install) {
                    self.store.upload(local, artifact).await?;
                }
                Ok(Outcome {
                    wheel: name.to_string(),
                    repair: StepResult::success(MSG_NO_BINARY_CONTENT),
                    install,
                    native_libraries: Vec::new(),
                })
            }

            RepairReport::Repaired { outputs } => {
                let Some(repaired) = outputs.first() else {
                    tracing::warn!(wheel = name, "repair produced no output");
                    return Ok(Outcome::repair_failed(name, MSG_NO_REPAIRED_OUTPUT));
                };

                let native_libraries = native_libraries(repaired)?;
                tracing::info!(
                    wheel = name,
                    repaired = %repaired.display(),
                    libraries = native_libraries.len(),
                    "repaired"
                );

                let install = self.install_step(tag.as_ref(), repaired).await?;
                if publishable(&install) {
                    self.store.upload(repaired, artifact).await?;
                }
                Ok(Outcome {
                    wheel: name.to_string(),
                    repair: StepResult::success(""),
                    install,
                    native_libraries,
                })
            }
        }
    }

    async fn install_step(
        &self,
        tag: Option<&InterpreterTag>,
        wheel: &Path,
    ) -> Result<StepResult, PipelineError> {
        Ok(match self.tester.install_test(tag, wheel).await? {
            InstallReport::Installed => StepResult::success(""),
            InstallReport::Failed { message } => StepResult::failed(message),
            InstallReport::Skipped => StepResult::skipped(),
        })
    }
}

/// A repaired artifact is published unless its install test failed.
fn publishable(install: &StepResult) -> bool {
    install.status != StepStatus::Failed
}

async fn cleanup(local: &Path, out_dir: &Path) {
    if let Err(e) = tokio::fs::remove_file(local).await {
        tracing::debug!(path = %local.display(), error = %e, "cleanup");
    }
    if let Err(e) = tokio::fs::remove_dir_all(out_dir).await {
        tracing::debug!(path = %out_dir.display(), error = %e, "cleanup");
    }
}
