//! Repair pipeline for Linux wheels hosted in an artifact repository.
//!
//! Artifacts are queried from a source repository, repaired with
//! `auditwheel`, install-tested in throwaway virtual environments and
//! published to a target repository. Outcomes are checkpointed after every
//! artifact so interrupted runs resume where they stopped.

pub mod checkpoint;
pub mod classify;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod io;
pub mod paths;
pub mod pipeline;
pub mod process;
pub mod repair;
pub mod reporter;
pub mod summary;
pub mod venv;

#[cfg(test)]
pub(crate) mod testutil;

pub use checkpoint::{Checkpoint, CheckpointError};
pub use config::{Config, ConfigError};
pub use error::PipelineError;
pub use paths::Layout;
pub use pipeline::run_pipeline;
pub use reporter::{NullReporter, Reporter, progress_line};
pub use summary::RunSummary;

/// User Agent string for repository requests
pub const USER_AGENT: &str = concat!("wheelfix-core/", env!("CARGO_PKG_VERSION"));
