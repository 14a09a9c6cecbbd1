use thiserror::Error;

use wheelfix_schema::WheelFilenameError;

use crate::checkpoint::CheckpointError;
use crate::config::ConfigError;
use crate::io::{ArchiveError, StoreError};
use crate::process::ToolError;
use crate::venv::EnvError;

/// Errors raised while processing artifacts.
///
/// Raised from `classify`, one of these means the artifact gets no outcome
/// and is retried on the next run. Raised from setup, it ends the run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Env(#[from] EnvError),

    #[error("Failed to inspect repaired wheel: {0}")]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("Invalid wheel filename: {0}")]
    Filename(#[from] WheelFilenameError),
}
