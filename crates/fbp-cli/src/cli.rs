//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Interaction-log processor.
///
/// Imports anonymized IDE interaction logs and turns them into activity
/// intervals, usage reports, completion traces and developer statistics.
#[derive(Debug, Parser)]
#[command(name = "fbp", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Import JSONL event archives into the local store.
    Import {
        /// Archive files, one JSON event per line.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run the cleanup filter chain and print what it would prune.
    Filter {
        /// Minimum accepted collector version.
        #[arg(long, default_value_t = 1000)]
        min_version: i32,
    },

    /// Compute per-session active-window intervals as JSON.
    Intervals {
        /// Minimum accepted collector version.
        #[arg(long, default_value_t = 1000)]
        min_version: i32,
    },

    /// Print the window usage table as CSV.
    Report {
        /// Minimum accepted collector version.
        #[arg(long, default_value_t = 1000)]
        min_version: i32,
    },

    /// Merge developer records that share sessions.
    Consolidate,

    /// Extract completion interaction traces as JSONL.
    Traces {
        /// Minimum accepted collector version.
        #[arg(long, default_value_t = 1000)]
        min_version: i32,
    },

    /// Print developer statistics.
    Stats,
}
