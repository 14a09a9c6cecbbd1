//! Artifact identity as reported by the source repository.

use serde::{Deserialize, Serialize};

use crate::filename::{WheelFilename, WheelFilenameError};
use crate::tag::InterpreterTag;
use crate::types::{PackageName, Version};

/// One row of a repository metadata query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Repository identifier the artifact lives in.
    pub repo: String,
    /// Folder path inside the repository (`.` for the root).
    pub path: String,
    /// Artifact filename.
    pub name: String,
}

impl ArtifactEntry {
    /// Repository-relative location: `<repo>/<path>/<name>`.
    pub fn location(&self) -> String {
        let path = self.path.trim_matches('/');
        if path.is_empty() || path == "." {
            format!("{}/{}", self.repo, self.name)
        } else {
            format!("{}/{}/{}", self.repo, path, self.name)
        }
    }
}

/// A repository entry whose filename parsed as a wheel.
///
/// Immutable once built; the classifier reads it and the coordinator drops
/// it once the outcome has been checkpointed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    entry: ArtifactEntry,
    filename: WheelFilename,
}

impl ArtifactDescriptor {
    /// Build a descriptor by parsing the entry's filename.
    ///
    /// # Errors
    ///
    /// Returns a [`WheelFilenameError`] if the filename is not a valid
    /// wheel name; such artifacts cannot be placed in the upload layout.
    pub fn from_entry(entry: ArtifactEntry) -> Result<Self, WheelFilenameError> {
        let filename = WheelFilename::parse(&entry.name)?;
        Ok(Self { entry, filename })
    }

    /// The originating repository entry.
    pub fn entry(&self) -> &ArtifactEntry {
        &self.entry
    }

    /// The parsed filename.
    pub fn filename(&self) -> &WheelFilename {
        &self.filename
    }

    /// Artifact filename; the checkpoint key.
    pub fn name(&self) -> &str {
        &self.entry.name
    }

    /// Distribution name.
    pub fn package(&self) -> &PackageName {
        self.filename.package()
    }

    /// Distribution version.
    pub fn version(&self) -> &Version {
        self.filename.version()
    }

    /// Interpreter tag embedded in the filename, if any.
    pub fn interpreter_tag(&self) -> Option<InterpreterTag> {
        self.filename.interpreter_tag()
    }
}
