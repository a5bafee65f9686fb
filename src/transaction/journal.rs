//! Undo journal
//!
//! Every structural change made under the writer gate is recorded here before
//! the gate is released. Undo replays entries newest-first against both the
//! in-memory trees and the store, so the store needs no native transactions.

use crate::database::Database;
use crate::observability::{log_event_with_fields, Event};
use crate::revision::{RevisionId, RevisionNode};

/// One reversible change.
#[derive(Debug, Clone)]
pub(crate) enum UndoEntry {
    /// A revision was added; undo removes it.
    Inserted { doc_id: String, rev_id: RevisionId },
    /// A revision was pruned; undo restores it.
    Removed { node: RevisionNode },
    /// A surviving revision lost its parent link; undo relinks it.
    Detached {
        doc_id: String,
        rev_id: RevisionId,
        former_parent: RevisionId,
    },
}

#[derive(Debug, Default)]
pub(crate) struct UndoJournal {
    entries: Vec<UndoEntry>,
}

impl UndoJournal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget everything; the changes are now permanent.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Undoes entries recorded after `mark`, newest first.
    ///
    /// Returns the number of entries whose store compensation failed. Memory
    /// is always restored.
    pub(crate) fn rollback_to(&mut self, mark: usize, db: &Database) -> usize {
        let mut failures = 0;
        while self.entries.len() > mark {
            let Some(entry) = self.entries.pop() else {
                break;
            };
            if let Err(reason) = undo(&entry, db) {
                failures += 1;
                log_event_with_fields(
                    Event::TxnRollbackFailed,
                    &[("entry", &format!("{:?}", entry)), ("error", &reason)],
                );
            }
        }
        failures
    }
}

fn undo(entry: &UndoEntry, db: &Database) -> Result<(), String> {
    match entry {
        UndoEntry::Inserted { doc_id, rev_id } => {
            if let Some(tree) = db.tree_handle(doc_id) {
                db.lock_tree(&tree).remove_node(rev_id);
                db.discard_if_empty(doc_id);
            }
            db.store().delete(doc_id, rev_id).map_err(|e| e.to_string())
        }
        UndoEntry::Removed { node } => {
            let tree = db.tree_handle_or_create(node.doc_id());
            db.lock_tree(&tree).restore_node(node.clone());
            db.store().put(node).map_err(|e| e.to_string())
        }
        UndoEntry::Detached {
            doc_id,
            rev_id,
            former_parent,
        } => {
            let Some(tree) = db.tree_handle(doc_id) else {
                return Err(format!("document '{}' vanished", doc_id));
            };
            let relinked = db
                .lock_tree(&tree)
                .set_parent(rev_id, Some(former_parent.clone()))
                .cloned();
            match relinked {
                Some(node) => db.store().put(&node).map_err(|e| e.to_string()),
                None => Err(format!("revision {} vanished", rev_id)),
            }
        }
    }
}
