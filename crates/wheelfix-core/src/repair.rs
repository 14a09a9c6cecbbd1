//! Repair tool invocation.
//!
//! Wraps `auditwheel repair`, which rewrites a Linux wheel so that its
//! native extensions only depend on libraries allowed by the target
//! manylinux policy, grafting any others into `<package>.libs/`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::config::RepairConfig;
use crate::process::{Tool, ToolError};

/// Marker the repair tool prints when a wheel contains no ELF objects.
const NO_BINARY_MARKER: &str = "no elf";

/// What the repair tool made of one wheel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairReport {
    /// Clean exit. `outputs` may be empty; callers treat that as a failure.
    Repaired { outputs: Vec<PathBuf> },
    /// The wheel has no binary content to repair.
    NoBinaryContent,
    /// Non-zero exit or timeout, with a one-line diagnostic.
    Failed { message: String },
}

#[async_trait]
pub trait Repairer: Send + Sync {
    /// Repair `wheel`, writing results into `out_dir`.
    ///
    /// Only launch failures are errors; tool failures are reported.
    async fn repair(&self, wheel: &Path, out_dir: &Path) -> Result<RepairReport, ToolError>;
}

/// [`Repairer`] backed by the `auditwheel` executable.
#[derive(Debug, Clone)]
pub struct Auditwheel {
    config: RepairConfig,
}

impl Auditwheel {
    pub fn new(config: RepairConfig) -> Self {
        Self { config }
    }

    fn command(&self, wheel: &Path, out_dir: &Path) -> Tool {
        let tool = Tool::new(&self.config.program)
            .arg("repair")
            .args(["--plat", self.config.platform.as_str(), "--only-plat"])
            .arg(wheel)
            .arg("-w")
            .arg(out_dir);

        match &self.config.ld_library_path {
            Some(path) => tool.env("LD_LIBRARY_PATH", path),
            None => tool,
        }
    }
}

#[async_trait]
impl Repairer for Auditwheel {
    async fn repair(&self, wheel: &Path, out_dir: &Path) -> Result<RepairReport, ToolError> {
        let output = match self
            .command(wheel, out_dir)
            .run(self.config.timeout())
            .await
        {
            Ok(output) => output,
            Err(e @ ToolError::TimedOut { .. }) => {
                tracing::warn!(wheel = %wheel.display(), "{e}");
                return Ok(RepairReport::Failed {
                    message: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        if output.success() {
            return Ok(RepairReport::Repaired {
                outputs: produced_wheels(out_dir),
            });
        }

        if output.stderr.to_lowercase().contains(NO_BINARY_MARKER) {
            return Ok(RepairReport::NoBinaryContent);
        }

        Ok(RepairReport::Failed {
            message: output.diagnostic(),
        })
    }
}

/// Wheels directly inside `out_dir`, sorted by filename. A missing
/// directory yields an empty list.
pub fn produced_wheels(out_dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(out_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(".whl"))
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Resolve the repair tool on `PATH` before any work is dispatched.
///
/// # Errors
///
/// Returns [`ToolError::NotFound`] if the program cannot be resolved.
pub fn preflight(program: &str) -> Result<PathBuf, ToolError> {
    which::which(program).map_err(|_| ToolError::NotFound {
        program: program.to_string(),
    })
}
