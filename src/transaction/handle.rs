//! Transaction handle
//!
//! A `Transaction` owns the writer gate for its whole lifetime. Mutations are
//! applied immediately (reads through the handle see them) and journaled;
//! their change records stay pending until the outermost scope commits.
//!
//! Outcomes:
//! - commit: store synced, journal discarded, pending changes handed back
//! - decline, error or drop without commit: journal undone, changes discarded
//!
//! Nested scopes are savepoints over the same journal.

use std::mem;
use std::sync::{Arc, Mutex};
use std::thread;

use uuid::Uuid;

use super::gate::GateGuard;
use super::journal::{UndoEntry, UndoJournal};
use crate::database::{Database, DatabaseError, DatabaseResult, Document};
use crate::notify::{ChangeEvent, DocumentChange};
use crate::observability::{log_event_at, log_event_with_fields, Event, Severity};
use crate::revision::{InsertMode, Properties, RevisionId, RevisionNode, RevisionTree};

/// How the parent of a new revision is chosen.
enum ParentRef<'a> {
    /// Caller names the parent (or none, for a creation).
    Explicit(Option<&'a RevisionId>),
    /// The current revision if live, otherwise a creation.
    Current,
    /// The current revision, which must exist and be live.
    LiveCurrent,
}

/// An open unit of work against a `Database`.
pub struct Transaction<'db> {
    db: &'db Database,
    journal: UndoJournal,
    pending: Vec<DocumentChange>,
    finished: bool,
    depth: usize,
    // Dropped after `Drop::drop` has undone any unfinished work.
    _gate: GateGuard<'db>,
}

impl<'db> Transaction<'db> {
    pub(crate) fn begin(db: &'db Database) -> DatabaseResult<Self> {
        let gate = db.gate().acquire()?;
        Ok(Self {
            db,
            journal: UndoJournal::new(),
            pending: Vec::new(),
            finished: false,
            depth: 0,
            _gate: gate,
        })
    }

    /// Runs `work` as a nested scope.
    ///
    /// `Ok(false)` or `Err` undoes only what `work` did and drops its pending
    /// changes. `Ok(true)` keeps them for the enclosing scope to commit.
    pub fn run_in_transaction<F>(&mut self, work: F) -> DatabaseResult<bool>
    where
        F: FnOnce(&mut Transaction<'db>) -> DatabaseResult<bool>,
    {
        let journal_mark = self.journal.len();
        let pending_mark = self.pending.len();
        self.depth += 1;
        let outcome = work(self);
        self.depth -= 1;

        match outcome {
            Ok(true) => Ok(true),
            Ok(false) => {
                self.rollback_to(journal_mark, pending_mark, "declined");
                Ok(false)
            }
            Err(e) => {
                self.rollback_to(journal_mark, pending_mark, &e.to_string());
                Err(e)
            }
        }
    }

    /// Nesting level of the scope currently executing; 0 is outermost.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Changes that will be published if the outermost scope commits.
    pub fn pending_changes(&self) -> &[DocumentChange] {
        &self.pending
    }

    /// Creates a document under a fresh random id.
    pub fn create_document(&mut self, properties: Properties) -> DatabaseResult<RevisionNode> {
        let doc_id = Uuid::new_v4().simple().to_string();
        self.create_document_with_id(&doc_id, properties)
    }

    /// Creates `doc_id`, or revives it if its current revision is a tombstone.
    pub fn create_document_with_id(
        &mut self,
        doc_id: &str,
        properties: Properties,
    ) -> DatabaseResult<RevisionNode> {
        self.insert(
            doc_id,
            ParentRef::Explicit(None),
            Some(properties),
            false,
            InsertMode::Strict,
            None,
        )
    }

    /// Writes a new revision on top of the current one, creating the
    /// document if needed.
    pub fn put_properties(
        &mut self,
        doc_id: &str,
        properties: Properties,
    ) -> DatabaseResult<RevisionNode> {
        self.insert(
            doc_id,
            ParentRef::Current,
            Some(properties),
            false,
            InsertMode::Strict,
            None,
        )
    }

    /// Writes a revision with an explicit parent, which must be a leaf.
    pub fn put_revision(
        &mut self,
        doc_id: &str,
        parent: Option<&RevisionId>,
        properties: Option<Properties>,
        deleted: bool,
    ) -> DatabaseResult<RevisionNode> {
        self.insert(
            doc_id,
            ParentRef::Explicit(parent),
            properties,
            deleted,
            InsertMode::Strict,
            None,
        )
    }

    /// Inserts a revision under any existing parent, possibly branching.
    ///
    /// Used for revisions arriving from a remote; `source` marks the change
    /// as external. Re-inserting an existing revision is a no-op.
    pub fn force_insert(
        &mut self,
        doc_id: &str,
        parent: Option<&RevisionId>,
        properties: Option<Properties>,
        deleted: bool,
        source: Option<&str>,
    ) -> DatabaseResult<RevisionNode> {
        self.insert(
            doc_id,
            ParentRef::Explicit(parent),
            properties,
            deleted,
            InsertMode::Force,
            source,
        )
    }

    /// Writes a tombstone on top of the current revision.
    pub fn delete_document(&mut self, doc_id: &str) -> DatabaseResult<RevisionNode> {
        self.insert(
            doc_id,
            ParentRef::LiveCurrent,
            None,
            true,
            InsertMode::Strict,
            None,
        )
    }

    /// Reads a document, including this transaction's own writes.
    pub fn document(&self, doc_id: &str) -> Option<Document> {
        self.db.document(doc_id)
    }

    pub fn current_revision(&self, doc_id: &str) -> Option<RevisionNode> {
        self.db.current_revision(doc_id)
    }

    fn insert(
        &mut self,
        doc_id: &str,
        parent: ParentRef<'_>,
        properties: Option<Properties>,
        deleted: bool,
        mode: InsertMode,
        source: Option<&str>,
    ) -> DatabaseResult<RevisionNode> {
        let handle = self.db.tree_handle_or_create(doc_id);
        let outcome = self.insert_into(&handle, doc_id, parent, properties, deleted, mode, source);
        if outcome.is_err() {
            self.db.discard_if_empty(doc_id);
        }
        outcome
    }

    #[allow(clippy::too_many_arguments)]
    fn insert_into(
        &mut self,
        handle: &Arc<Mutex<RevisionTree>>,
        doc_id: &str,
        parent: ParentRef<'_>,
        properties: Option<Properties>,
        deleted: bool,
        mode: InsertMode,
        source: Option<&str>,
    ) -> DatabaseResult<RevisionNode> {
        let mut tree = self.db.lock_tree(handle);

        let parent: Option<RevisionId> = match parent {
            ParentRef::Explicit(parent) => parent.cloned(),
            ParentRef::Current => tree
                .current_node()
                .filter(|n| !n.is_deleted())
                .map(|n| n.rev_id().clone()),
            ParentRef::LiveCurrent => match tree.current_node() {
                Some(n) if !n.is_deleted() => Some(n.rev_id().clone()),
                _ => return Err(DatabaseError::NotFound(format!("document '{}'", doc_id))),
            },
        };

        let insertion = tree.add_revision(
            parent.as_ref(),
            properties,
            deleted,
            mode,
            self.db.canonicalizer(),
        )?;
        if !insertion.inserted {
            return Ok(insertion.node);
        }

        let rev_id = insertion.node.rev_id().clone();
        if let Err(e) = self.db.store().put(&insertion.node) {
            tree.remove_node(&rev_id);
            return Err(e.into());
        }

        self.journal.record(UndoEntry::Inserted {
            doc_id: doc_id.to_string(),
            rev_id: rev_id.clone(),
        });

        let winning_rev_id = tree.current().cloned().unwrap_or_else(|| rev_id.clone());
        self.pending.push(DocumentChange {
            doc_id: doc_id.to_string(),
            is_current_revision: winning_rev_id == rev_id,
            rev_id,
            winning_rev_id,
            in_conflict: tree.is_conflicted(),
            source: source.map(str::to_string),
        });

        Ok(insertion.node)
    }

    /// Makes the outermost scope durable and returns its event, if any.
    ///
    /// The event's sequence is assigned while the gate is still held, so
    /// sequences follow commit order. A sync failure undoes everything and
    /// yields `TransactionAborted`.
    pub(crate) fn commit(mut self) -> DatabaseResult<Option<ChangeEvent>> {
        self.finished = true;
        if self.journal.is_empty() {
            return Ok(None);
        }

        match self.db.store().sync() {
            Ok(()) => {
                self.journal.clear();
                let changes = mem::take(&mut self.pending);
                log_event_with_fields(Event::TxnCommit, &[("changes", &changes.len().to_string())]);
                Ok(Some(ChangeEvent::new(self.db.next_sequence(), changes)))
            }
            Err(e) => {
                let reason = e.to_string();
                self.rollback_to(0, 0, &reason);
                Err(DatabaseError::aborted("commit failed to sync store", e.into()))
            }
        }
    }

    /// Undoes everything and closes the transaction.
    pub(crate) fn rollback(mut self, reason: &str) {
        self.finished = true;
        self.rollback_to(0, 0, reason);
    }

    fn rollback_to(&mut self, journal_mark: usize, pending_mark: usize, reason: &str) {
        let undone = self.journal.len().saturating_sub(journal_mark);
        let failures = self.journal.rollback_to(journal_mark, self.db);
        self.pending.truncate(pending_mark);

        let severity = if failures > 0 {
            Severity::Error
        } else {
            Severity::Info
        };
        log_event_at(
            severity,
            Event::TxnRollback,
            &[
                ("depth", &self.depth.to_string()),
                ("undone", &undone.to_string()),
                ("failures", &failures.to_string()),
                ("reason", reason),
            ],
        );
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        let reason = if thread::panicking() {
            "panic"
        } else {
            "dropped"
        };
        self.rollback_to(0, 0, reason);
    }
}

impl std::fmt::Debug for Transaction<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("database", &self.db.name())
            .field("journal", &self.journal.len())
            .field("pending", &self.pending.len())
            .field("depth", &self.depth)
            .finish()
    }
}
