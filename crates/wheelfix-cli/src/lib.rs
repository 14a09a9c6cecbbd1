//! wheelfix - repair, install-test and republish Linux wheels
#![allow(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::doc_markdown)]
//!
//! # Overview
//!
//! `wheelfix run` queries a source repository for wheels, repairs each one
//! with `auditwheel`, install-tests the result in a throwaway virtual
//! environment and publishes it to a target repository. Progress is
//! checkpointed to three CSV tables after every wheel, so an interrupted
//! run picks up where it stopped.
//!
//! # Output Layout
//!
//! ```text
//! output/
//! ├── wheel_status.csv          # one row per processed wheel
//! ├── native_libs_all.csv       # every shared library per wheel
//! └── native_libs_external.csv  # libraries grafted in by the repair tool
//! ```

pub mod cmd;
pub mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "wheelfix")]
#[command(author, version, about = "wheelfix - repair, install-test and republish Linux wheels")]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "WHEELFIX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Process every wheel not yet recorded in the checkpoint
    Run {
        /// Number of parallel workers
        #[arg(short, long)]
        workers: Option<usize>,
        /// Process at most this many queried wheels (0 for no limit)
        #[arg(long)]
        max_total: Option<usize>,
    },
    /// Print the summary rebuilt from the checkpoint, without network access
    Summary {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// List wheels whose repair failed (candidates for a source build)
    Failed,
}
