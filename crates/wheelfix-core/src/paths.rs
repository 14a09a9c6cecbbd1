//! Working-directory layout.
//!
//! All paths the pipeline touches on local disk are derived here so the
//! classifier, the checkpoint and the CLI agree on where things live.

use std::path::{Path, PathBuf};

use wheelfix_schema::{PackageName, Version, WheelFilename};

use crate::config::DirConfig;

/// Status table: one row per processed artifact.
pub const STATUS_TABLE: &str = "wheel_status.csv";

/// Every shared library found in each repaired artifact.
pub const LIBRARIES_TABLE: &str = "native_libs_all.csv";

/// Only the libraries the repair tool grafted in from the host.
pub const EXTERNAL_LIBRARIES_TABLE: &str = "native_libs_external.csv";

/// Resolved local directories for one run.
#[derive(Debug, Clone)]
pub struct Layout {
    downloads: PathBuf,
    repaired: PathBuf,
    output: PathBuf,
}

impl Layout {
    pub fn new(dirs: &DirConfig) -> Self {
        Self {
            downloads: dirs.downloads.clone(),
            repaired: dirs.repaired.clone(),
            output: dirs.output.clone(),
        }
    }

    /// Layout with relative directories resolved against `root`.
    pub fn rooted(root: &Path, dirs: &DirConfig) -> Self {
        Self {
            downloads: root.join(&dirs.downloads),
            repaired: root.join(&dirs.repaired),
            output: root.join(&dirs.output),
        }
    }

    /// Create every top-level directory.
    ///
    /// # Errors
    ///
    /// Returns an error if a directory cannot be created.
    pub fn ensure(&self) -> std::io::Result<()> {
        for dir in [&self.downloads, &self.repaired, &self.output] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    /// `<downloads>/<package>/<version>`
    pub fn download_dir(&self, package: &PackageName, version: &Version) -> PathBuf {
        self.downloads.join(package).join(version)
    }

    /// Where a source artifact is downloaded to.
    pub fn download_path(&self, wheel: &WheelFilename) -> PathBuf {
        self.download_dir(wheel.package(), wheel.version())
            .join(wheel.as_str())
    }

    /// Per-artifact repair output directory:
    /// `<repaired>/<package>/<version>/<wheel stem>`.
    ///
    /// Keyed by the full filename so two workers repairing different
    /// artifacts of the same release never see each other's output.
    pub fn repaired_dir(&self, wheel: &WheelFilename) -> PathBuf {
        let stem = wheel.as_str().strip_suffix(".whl").unwrap_or(wheel.as_str());
        self.repaired
            .join(wheel.package())
            .join(wheel.version())
            .join(stem)
    }

    /// Holds the checkpoint tables.
    pub fn output_dir(&self) -> &Path {
        &self.output
    }
}
