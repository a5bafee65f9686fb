//! CLI argument definitions using clap
//!
//! Commands:
//! - aerolite put --store <dir> --doc <id> --json <object>
//! - aerolite history --store <dir> --doc <id>
//! - aerolite compact --store <dir> [--max-depth <n>]
//! - aerolite info --store <dir>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// aerolite - embedded multi-version document store
#[derive(Parser, Debug)]
#[command(name = "aerolite")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Minimum log severity (trace, info, warn, error, fatal)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Write a new revision of a document on top of its current one
    Put {
        /// Store directory
        #[arg(long)]
        store: PathBuf,
        /// Document id
        #[arg(long)]
        doc: String,
        /// Document properties as a JSON object
        #[arg(long)]
        json: String,
    },

    /// Print a document's revision history, newest first
    History {
        #[arg(long)]
        store: PathBuf,
        #[arg(long)]
        doc: String,
    },

    /// Prune every document's history to a fixed depth
    Compact {
        #[arg(long)]
        store: PathBuf,
        /// Generations to keep per branch
        #[arg(long, default_value_t = crate::database::DEFAULT_MAX_REV_TREE_DEPTH)]
        max_depth: u32,
    },

    /// Print database statistics
    Info {
        #[arg(long)]
        store: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
