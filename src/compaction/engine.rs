//! Revision tree compaction
//!
//! One pass over a database:
//!
//! 1. Serialize against other passes (compaction lock)
//! 2. For each document, in id order, under the writer gate and the document
//!    lock: prune the tree to `max_depth` in memory and journal what changed
//! 3. Under a single gate hold: delete removed nodes from the store, rewrite
//!    detached ones, then sync
//!
//! The store is not touched until step 3, so a commit that syncs between two
//! documents never persists part of a pass. Any failure undoes every change
//! the pass made, in memory and in the store, and syncs again if the store
//! was written. Compaction never changes a document's winning revision and
//! never notifies listeners.

use serde::Serialize;

use crate::database::{validate_max_rev_tree_depth, Database, DatabaseError, DatabaseResult};
use crate::observability::{log_event_at, Event, ObservationScope, Severity};
use crate::revision::Pruning;
use crate::transaction::{UndoEntry, UndoJournal};

/// Totals for one compaction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    pub documents_scanned: usize,
    /// Documents that lost at least one revision
    pub documents_pruned: usize,
    pub revisions_removed: usize,
}

/// Prunes revision trees to a fixed depth.
#[derive(Debug, Clone, Copy)]
pub struct CompactionEngine {
    max_depth: u32,
}

impl CompactionEngine {
    /// Rejects a depth of zero.
    pub fn new(max_depth: u32) -> DatabaseResult<Self> {
        validate_max_rev_tree_depth(max_depth)?;
        Ok(Self { max_depth })
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Runs one pass over `db`.
    ///
    /// Fails with `TransactionInProgress` if called from inside a transaction
    /// on the same database.
    pub fn compact(&self, db: &Database) -> DatabaseResult<CompactionReport> {
        if db.gate().held_by_current_thread() {
            return Err(DatabaseError::TransactionInProgress);
        }
        let _serial = db.compaction_guard();

        let depth = self.max_depth.to_string();
        let scope = ObservationScope::with_fields(
            "COMPACTION",
            &[("database", db.name()), ("max_depth", &depth)],
        );

        let mut journal = UndoJournal::new();
        let mut pruned: Vec<(String, Pruning)> = Vec::new();
        let mut report = CompactionReport::default();

        for doc_id in db.document_ids() {
            report.documents_scanned += 1;
            match self.prune_document(db, &doc_id, &mut journal) {
                Ok(None) => {}
                Ok(Some(pruning)) => {
                    report.documents_pruned += 1;
                    report.revisions_removed += pruning.removed.len();
                    pruned.push((doc_id, pruning));
                }
                Err(e) => {
                    let e = restore(db, &mut journal, e);
                    scope.fail(&e.to_string());
                    return Err(e);
                }
            }
        }

        if !pruned.is_empty() {
            if let Err(e) = persist(db, &pruned, &mut journal) {
                scope.fail(&e.to_string());
                return Err(e);
            }
        }

        scope.complete_with_fields(&[
            ("documents_scanned", &report.documents_scanned.to_string()),
            ("documents_pruned", &report.documents_pruned.to_string()),
            ("revisions_removed", &report.revisions_removed.to_string()),
        ]);
        Ok(report)
    }

    /// Prunes one document in memory under the gate and journals the change.
    fn prune_document(
        &self,
        db: &Database,
        doc_id: &str,
        journal: &mut UndoJournal,
    ) -> DatabaseResult<Option<Pruning>> {
        let _gate = db.gate().acquire()?;
        let Some(handle) = db.tree_handle(doc_id) else {
            return Ok(None);
        };
        let mut tree = db.lock_tree(&handle);

        let pruning = tree.prune_to_depth(self.max_depth);
        if pruning.is_empty() {
            return Ok(None);
        }
        record(doc_id, &pruning, journal);

        log_event_at(
            Severity::Trace,
            Event::DocumentPruned,
            &[
                ("doc_id", doc_id),
                ("removed", &pruning.removed.len().to_string()),
                ("remaining", &tree.len().to_string()),
            ],
        );
        Ok(Some(pruning))
    }
}

fn record(doc_id: &str, pruning: &Pruning, journal: &mut UndoJournal) {
    for node in &pruning.removed {
        journal.record(UndoEntry::Removed { node: node.clone() });
    }
    for detached in &pruning.detached {
        journal.record(UndoEntry::Detached {
            doc_id: doc_id.to_string(),
            rev_id: detached.rev_id.clone(),
            former_parent: detached.former_parent.clone(),
        });
    }
}

/// Writes the whole pass to the store and syncs it under one gate hold.
/// On failure the pass is undone and the store synced back to its prior
/// contents before the gate is released.
fn persist(
    db: &Database,
    pruned: &[(String, Pruning)],
    journal: &mut UndoJournal,
) -> DatabaseResult<()> {
    let _gate = match db.gate().acquire() {
        Ok(gate) => gate,
        Err(e) => return Err(restore(db, journal, e)),
    };

    let Err(e) = write_pass(db, pruned) else {
        return Ok(());
    };
    journal.rollback_to(0, db);
    if let Err(sync_err) = db.store().sync() {
        log_event_at(
            Severity::Error,
            Event::TxnRollbackFailed,
            &[("operation", "compaction"), ("error", &sync_err.to_string())],
        );
    }
    Err(e)
}

fn write_pass(db: &Database, pruned: &[(String, Pruning)]) -> DatabaseResult<()> {
    for (doc_id, pruning) in pruned {
        for node in &pruning.removed {
            db.store().delete(doc_id, node.rev_id())?;
        }
        if pruning.detached.is_empty() {
            continue;
        }
        let Some(handle) = db.tree_handle(doc_id) else {
            continue;
        };
        let tree = db.lock_tree(&handle);
        for detached in &pruning.detached {
            if let Some(node) = tree.get(&detached.rev_id) {
                db.store().put(node)?;
            }
        }
    }
    db.store().sync()?;
    Ok(())
}

/// Undoes the in-memory part of a pass that never reached the store.
///
/// Returns `cause`, or if the gate cannot be taken, an abort carrying the
/// gate error; the pruned trees are then left as they are.
fn restore(db: &Database, journal: &mut UndoJournal, cause: DatabaseError) -> DatabaseError {
    match db.gate().acquire() {
        Ok(_gate) => {
            journal.rollback_to(0, db);
            cause
        }
        Err(gate_err) => {
            log_event_at(
                Severity::Error,
                Event::TxnRollbackFailed,
                &[("operation", "compaction"), ("error", &gate_err.to_string())],
            );
            DatabaseError::aborted(format!("compaction restore skipped after: {}", cause), gate_err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseConfig;
    use crate::revision::Properties;
    use serde_json::json;

    fn props(n: usize) -> Properties {
        json!({ "n": n }).as_object().cloned().unwrap()
    }

    fn db_with_chain(len: usize) -> Database {
        let db = Database::open(DatabaseConfig::in_memory("compact")).unwrap();
        for n in 0..len {
            db.put_properties("doc", props(n)).unwrap();
        }
        db
    }

    #[test]
    fn test_zero_depth_rejected() {
        assert!(CompactionEngine::new(0).is_err());
    }

    #[test]
    fn test_prunes_to_depth() {
        let db = db_with_chain(10);
        let report = CompactionEngine::new(3).unwrap().compact(&db).unwrap();

        assert_eq!(report.documents_scanned, 1);
        assert_eq!(report.documents_pruned, 1);
        assert_eq!(report.revisions_removed, 7);
        assert_eq!(db.history("doc").unwrap().len(), 3);
    }

    #[test]
    fn test_restore_returns_cause() {
        let db = db_with_chain(2);
        let mut journal = UndoJournal::new();
        let err = restore(&db, &mut journal, DatabaseError::NotFound("doc".into()));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_restore_reports_unavailable_gate() {
        let db = db_with_chain(2);
        let _held = db.gate().acquire().unwrap();
        let mut journal = UndoJournal::new();
        let err = restore(&db, &mut journal, DatabaseError::NotFound("doc".into()));
        match err {
            DatabaseError::TransactionAborted { cause, .. } => {
                assert!(matches!(cause.as_deref(), Some(DatabaseError::TransactionInProgress)));
            }
            other => panic!("expected abort, got {}", other),
        }
    }

    #[test]
    fn test_second_pass_is_noop() {
        let db = db_with_chain(5);
        let engine = CompactionEngine::new(2).unwrap();
        engine.compact(&db).unwrap();
        let again = engine.compact(&db).unwrap();
        assert_eq!(again.revisions_removed, 0);
        assert_eq!(again.documents_pruned, 0);
    }

    #[test]
    fn test_rejected_inside_transaction() {
        let db = db_with_chain(3);
        let engine = CompactionEngine::new(1).unwrap();
        let outcome = db.run_in_transaction(|_| {
            assert!(matches!(engine.compact(&db), Err(DatabaseError::TransactionInProgress)));
            Ok(true)
        });
        assert!(outcome.unwrap());
        assert_eq!(db.history("doc").unwrap().len(), 3);
    }
}
