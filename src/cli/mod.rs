//! CLI module for aerolite
//!
//! A thin exerciser over a file-backed database:
//! - put: write a revision
//! - history: show a document's history
//! - compact: prune histories
//! - info: database statistics

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{compact, history, info, put, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
