//! Per-artifact outcome records.
//!
//! An [`Outcome`] is produced exactly once per artifact and never mutated
//! afterwards. It is the unit persisted to the checkpoint tables and the
//! unit folded into the run summary.

use serde::{Deserialize, Serialize};

use crate::types::StepStatus;

/// Repair message for wheels that carry no platform-specific code.
pub const MSG_PLATFORM_INDEPENDENT: &str = "platform-independent artifact (repair skipped)";

/// Repair message when the repair tool found no binary content to repair.
pub const MSG_NO_BINARY_CONTENT: &str = "no ELF files found (platform-independent artifact)";

/// Skip message found in status tables written before
/// [`MSG_PLATFORM_INDEPENDENT`] existed.
const MSG_PLATFORM_INDEPENDENT_HISTORICAL: &str = "no-arch wheel (auditwheel skipped)";

/// Repair message when the repair tool exited cleanly but wrote nothing.
pub const MSG_NO_REPAIRED_OUTPUT: &str = "auditwheel succeeded but produced no manylinux wheel";

/// Status and diagnostic of one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    /// Step status.
    pub status: StepStatus,
    /// Diagnostic text, empty when there is nothing to report.
    pub message: String,
}

impl StepResult {
    /// A successful step with an optional note.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Success,
            message: message.into(),
        }
    }

    /// A failed step with its diagnostic.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            message: message.into(),
        }
    }

    /// A step that was not attempted.
    pub fn skipped() -> Self {
        Self {
            status: StepStatus::Skipped,
            message: String::new(),
        }
    }
}

/// Final record for one artifact, keyed by its filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Artifact filename; globally unique within a run.
    pub wheel: String,
    /// Result of the repair step.
    pub repair: StepResult,
    /// Result of the install test.
    pub install: StepResult,
    /// Shared-library members of the repaired artifact, in archive order.
    pub native_libraries: Vec<String>,
}

impl Outcome {
    /// Outcome for an artifact whose repair failed: install is skipped and
    /// no libraries are recorded.
    pub fn repair_failed(wheel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            wheel: wheel.into(),
            repair: StepResult::failed(message),
            install: StepResult::skipped(),
            native_libraries: Vec::new(),
        }
    }

    /// True when repair was skipped or found nothing to repair.
    ///
    /// Also recognises the older skip and `no elf` wordings found in
    /// status tables written by earlier tooling.
    pub fn is_platform_independent(&self) -> bool {
        self.repair.status == StepStatus::Success
            && (self.repair.message == MSG_PLATFORM_INDEPENDENT
                || self.repair.message == MSG_NO_BINARY_CONTENT
                || self.repair.message == MSG_PLATFORM_INDEPENDENT_HISTORICAL
                || self.repair.message.to_lowercase().contains("no elf"))
    }

    /// True when the artifact went through the native repair path and
    /// produced a repaired wheel.
    pub fn is_natively_repaired(&self) -> bool {
        self.repair.status == StepStatus::Success && !self.is_platform_independent()
    }

    /// Libraries grafted into the wheel by the repair tool, i.e. those that
    /// live in a `<name>.libs/` directory rather than next to the package's
    /// own extension modules.
    pub fn external_libraries(&self) -> Vec<String> {
        self.native_libraries
            .iter()
            .filter(|lib| {
                lib.split('/')
                    .rev()
                    .skip(1)
                    .any(|dir| dir.ends_with(".libs"))
            })
            .cloned()
            .collect()
    }
}
