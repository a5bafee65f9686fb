//! aerolite CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors have already
//! been reported as JSON on stdout; the process exits non-zero.

use aerolite::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
