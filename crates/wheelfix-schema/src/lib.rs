//! Shared types for wheelfix.
//!
//! Everything in this crate is pure data: no filesystem, network or
//! subprocess access. The core crate builds its pipeline on these types and
//! the checkpoint tables are rows of them.

pub mod artifact;
pub mod filename;
pub mod outcome;
pub mod tag;
pub mod types;

// Re-exports
pub use artifact::{ArtifactDescriptor, ArtifactEntry};
pub use filename::{WheelFilename, WheelFilenameError};
pub use outcome::{Outcome, StepResult};
pub use tag::InterpreterTag;
pub use types::*;

/// Sentinel written to the native-library tables when an artifact has none.
pub const NO_LIBRARIES_SENTINEL: &str = "not found";

/// Platform tag the repair tool targets by default.
pub const DEFAULT_REPAIR_PLATFORM: &str = "manylinux_2_34_ppc64le";
