//! CLI command implementations
//!
//! Each command opens the file-backed database at `--store`, performs one
//! operation and closes it. Results are built as JSON values and written by
//! `run_command`, which keeps the commands testable without capturing stdout.

use std::path::Path;

use serde_json::{json, Value};

use crate::compaction::CompactionEngine;
use crate::database::{Database, DatabaseConfig};
use crate::observability::Severity;
use crate::revision::{Properties, RevisionNode};

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Parse arguments and run the selected command.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    if let Some(level) = &cli.log_level {
        let severity = Severity::parse(level)
            .ok_or_else(|| CliError::invalid_argument(format!("Invalid log level: '{}'", level)))?;
        crate::observability::Logger::set_min_severity(severity);
    }
    run_command(cli.command)
}

/// Run one command and print its JSON response.
pub fn run_command(cmd: Command) -> CliResult<()> {
    let outcome = match cmd {
        Command::Put { store, doc, json } => put(&store, &doc, &json),
        Command::History { store, doc } => history(&store, &doc),
        Command::Compact { store, max_depth } => compact(&store, max_depth),
        Command::Info { store } => info(&store),
    };

    match outcome {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

fn open(store: &Path) -> CliResult<Database> {
    Ok(Database::open(DatabaseConfig::file(store))?)
}

fn revision_json(node: &RevisionNode) -> Value {
    json!({
        "rev_id": node.rev_id().to_string(),
        "generation": node.generation(),
        "deleted": node.is_deleted(),
    })
}

/// Write `json` as the next revision of `doc_id`.
pub fn put(store: &Path, doc_id: &str, json: &str) -> CliResult<Value> {
    let properties: Properties = match serde_json::from_str::<Value>(json)? {
        Value::Object(map) => map,
        _ => return Err(CliError::invalid_argument("--json must be a JSON object")),
    };

    let db = open(store)?;
    let node = db.put_properties(doc_id, properties)?;

    let mut out = revision_json(&node);
    out["doc_id"] = json!(doc_id);
    Ok(out)
}

/// Revision history of `doc_id`, newest first.
pub fn history(store: &Path, doc_id: &str) -> CliResult<Value> {
    let db = open(store)?;
    let history = db.history(doc_id)?;
    let conflicted = db.document(doc_id).is_some_and(|d| d.is_conflicted());

    Ok(json!({
        "doc_id": doc_id,
        "conflicted": conflicted,
        "revisions": history.iter().map(revision_json).collect::<Vec<_>>(),
    }))
}

/// Prune all documents to `max_depth`.
pub fn compact(store: &Path, max_depth: u32) -> CliResult<Value> {
    let db = open(store)?;
    let report = CompactionEngine::new(max_depth)?.compact(&db)?;
    Ok(serde_json::to_value(report)?)
}

/// Document and revision counts.
pub fn info(store: &Path) -> CliResult<Value> {
    let db = open(store)?;
    let ids = db.document_ids();

    let mut revisions = 0;
    let mut conflicted = 0;
    let mut deleted = 0;
    for id in &ids {
        if let Some(doc) = db.document(id) {
            revisions += doc.revision_count();
            conflicted += usize::from(doc.is_conflicted());
            deleted += usize::from(doc.is_deleted());
        }
    }

    Ok(json!({
        "name": db.name(),
        "documents": ids.len(),
        "deleted": deleted,
        "conflicted": conflicted,
        "revisions": revisions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_then_history() {
        let dir = TempDir::new().unwrap();
        put(dir.path(), "a", r#"{"n":1}"#).unwrap();
        put(dir.path(), "a", r#"{"n":2}"#).unwrap();

        let out = history(dir.path(), "a").unwrap();
        let revisions = out["revisions"].as_array().unwrap();
        assert_eq!(revisions.len(), 2);
        assert_eq!(revisions[0]["generation"], json!(2));
        assert_eq!(out["conflicted"], json!(false));
    }

    #[test]
    fn test_put_rejects_non_object() {
        let dir = TempDir::new().unwrap();
        let err = put(dir.path(), "a", "[1,2]").unwrap_err();
        assert_eq!(err.code_str(), "AERO_CLI_INVALID_ARGUMENT");
    }

    #[test]
    fn test_history_of_missing_document() {
        let dir = TempDir::new().unwrap();
        let err = history(dir.path(), "ghost").unwrap_err();
        assert_eq!(err.code_str(), "AERO_NOT_FOUND");
    }

    #[test]
    fn test_compact_persists() {
        let dir = TempDir::new().unwrap();
        for n in 0..5 {
            put(dir.path(), "a", &format!(r#"{{"n":{}}}"#, n)).unwrap();
        }

        let report = compact(dir.path(), 2).unwrap();
        assert_eq!(report["revisions_removed"], json!(3));

        let out = history(dir.path(), "a").unwrap();
        assert_eq!(out["revisions"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_compact_rejects_zero_depth() {
        let dir = TempDir::new().unwrap();
        assert_eq!(compact(dir.path(), 0).unwrap_err().code_str(), "AERO_INVALID_CONFIG");
    }

    #[test]
    fn test_info_counts() {
        let dir = TempDir::new().unwrap();
        put(dir.path(), "a", r#"{"n":1}"#).unwrap();
        put(dir.path(), "b", r#"{"n":1}"#).unwrap();
        put(dir.path(), "b", r#"{"n":2}"#).unwrap();

        let out = info(dir.path()).unwrap();
        assert_eq!(out["documents"], json!(2));
        assert_eq!(out["revisions"], json!(3));
    }
}
