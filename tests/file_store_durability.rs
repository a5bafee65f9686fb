//! File store durability tests
//!
//! Committed work survives reopening; uncommitted work never reaches disk.

mod common;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::thread;

use aerolite::revision::{RevisionId, RevisionNode};
use aerolite::store::{FileRevisionStore, RevisionStore, StoreError, StoreResult, STORE_FILE};
use aerolite::{Database, DatabaseConfig};
use common::props;
use serde_json::json;
use tempfile::TempDir;

fn open(dir: &TempDir) -> Database {
    Database::open(DatabaseConfig::file(dir.path().join("inventory"))).unwrap()
}

#[test]
fn test_committed_revisions_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let (rev, second) = {
        let db = open(&dir);
        assert_eq!(db.name(), "inventory");
        db.create_document_with_id("sku-1", props(json!({ "qty": 1 }))).unwrap();
        let rev = db.put_properties("sku-1", props(json!({ "qty": 2 }))).unwrap();
        let second = db.create_document(props(json!({ "qty": 9 }))).unwrap();
        (rev, second)
    };

    let db = open(&dir);
    assert_eq!(db.document_count(), 2);
    let current = db.current_revision("sku-1").unwrap();
    assert_eq!(current.rev_id(), rev.rev_id());
    assert_eq!(current.property("qty"), Some(&json!(2)));
    assert_eq!(db.history("sku-1").unwrap().len(), 2);
    assert!(db.document(second.doc_id()).is_some());
}

#[test]
fn test_declined_transaction_is_not_persisted() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir);
        db.create_document_with_id("kept", props(json!({ "n": 1 }))).unwrap();
        db.run_in_transaction(|txn| {
            txn.create_document_with_id("lost", props(json!({ "n": 2 })))?;
            Ok(false)
        })
        .unwrap();
    }

    let db = open(&dir);
    assert_eq!(db.document_ids(), vec!["kept".to_string()]);
}

#[test]
fn test_conflicts_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let winner = {
        let db = open(&dir);
        let root = db.create_document_with_id("doc", props(json!({ "v": 0 }))).unwrap();
        db.force_insert("doc", Some(root.rev_id()), Some(props(json!({ "v": 1 }))), false, None)
            .unwrap();
        db.force_insert("doc", Some(root.rev_id()), Some(props(json!({ "v": 2 }))), false, None)
            .unwrap();
        db.current_revision("doc").unwrap()
    };

    let db = open(&dir);
    let doc = db.document("doc").unwrap();
    assert!(doc.is_conflicted());
    assert_eq!(doc.current_revision_id(), winner.rev_id());
}

#[test]
fn test_deleted_document_reloads_as_deleted() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir);
        db.create_document_with_id("gone", props(json!({ "n": 1 }))).unwrap();
        db.delete_document("gone").unwrap();
    }

    let db = open(&dir);
    let doc = db.document("gone").unwrap();
    assert!(doc.is_deleted());
    assert!(doc.properties().is_none());
}

#[test]
fn test_compaction_is_persisted() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir);
        for i in 0..8 {
            db.put_properties("doc", props(json!({ "i": i }))).unwrap();
        }
        db.set_max_rev_tree_depth(2).unwrap();
        db.compact().unwrap();
    }

    let db = open(&dir);
    let history = db.history("doc").unwrap();
    assert_eq!(history.len(), 2);
    assert!(history[1].parent_rev_id().is_none());
}

#[test]
fn test_corrupt_store_fails_open() {
    let dir = TempDir::new().unwrap();
    {
        let db = open(&dir);
        db.create_document_with_id("doc", props(json!({ "n": 1 }))).unwrap();
    }

    let path = dir.path().join("inventory").join(STORE_FILE);
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, bytes).unwrap();

    let err = Database::open(DatabaseConfig::file(dir.path().join("inventory"))).unwrap_err();
    match err {
        aerolite::DatabaseError::Storage(e) => {
            assert!(e.is_fatal());
            assert_eq!(e.code().code(), "AERO_DATA_CORRUPTION");
        }
        other => panic!("expected storage error, got {}", other),
    }
}

/// File store whose deletes fail for one document.
struct DeleteFailsFor {
    inner: FileRevisionStore,
    doc_id: &'static str,
}

impl RevisionStore for DeleteFailsFor {
    fn get(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<Option<RevisionNode>> {
        self.inner.get(doc_id, rev_id)
    }

    fn put(&self, node: &RevisionNode) -> StoreResult<()> {
        self.inner.put(node)
    }

    fn delete(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<()> {
        if doc_id == self.doc_id {
            return Err(StoreError::write_failed_no_source("delete refused"));
        }
        self.inner.delete(doc_id, rev_id)
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        self.inner.document_ids()
    }

    fn revisions(&self, doc_id: &str) -> StoreResult<Vec<RevisionNode>> {
        self.inner.revisions(doc_id)
    }

    fn sync(&self) -> StoreResult<()> {
        self.inner.sync()
    }
}

fn open_failing(path: &Path, doc_id: &'static str) -> Database {
    let store = DeleteFailsFor {
        inner: FileRevisionStore::open(path).unwrap(),
        doc_id,
    };
    Database::with_store(DatabaseConfig::file(path), Arc::new(store)).unwrap()
}

#[test]
fn test_failed_compaction_leaves_disk_unpruned() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inventory");
    let db = Arc::new(open_failing(&path, "zz"));

    let mut doc_ids: Vec<String> = (0..150).map(|i| format!("d{:03}", i)).collect();
    doc_ids.push("zz".to_string());
    for doc_id in &doc_ids {
        for i in 0..3 {
            db.put_properties(doc_id, props(json!({ "i": i }))).unwrap();
        }
    }

    let writer = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for i in 0..200 {
                db.put_properties("writer", props(json!({ "i": i }))).unwrap();
            }
        })
    };
    let outcome = db.set_max_rev_tree_depth(1).and_then(|_| db.compact());
    writer.join().unwrap();

    assert!(outcome.is_err());
    for doc_id in &doc_ids {
        assert_eq!(db.history(doc_id).unwrap().len(), 3);
    }

    // Any later commit syncs the store; it must not carry a partial pass.
    db.put_properties("after", props(json!({ "n": 1 }))).unwrap();
    drop(db);

    let reopened = Database::open(DatabaseConfig::file(&path)).unwrap();
    for doc_id in &doc_ids {
        let history = reopened.history(doc_id).unwrap();
        assert_eq!(history.len(), 3, "{} lost history on disk", doc_id);
        assert!(history[2].parent_rev_id().is_none());
    }
}

#[test]
fn test_failed_compaction_then_successful_pass() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("inventory");
    {
        let db = open_failing(&path, "b");
        for doc_id in ["a", "b"] {
            for i in 0..4 {
                db.put_properties(doc_id, props(json!({ "i": i }))).unwrap();
            }
        }
        db.set_max_rev_tree_depth(2).unwrap();
        assert!(db.compact().is_err());
    }
    {
        let db = open(&dir);
        assert_eq!(db.history("a").unwrap().len(), 4);
        assert_eq!(db.history("b").unwrap().len(), 4);
        db.set_max_rev_tree_depth(2).unwrap();
        assert_eq!(db.compact().unwrap().revisions_removed, 4);
    }

    let db = open(&dir);
    assert_eq!(db.history("a").unwrap().len(), 2);
    assert_eq!(db.history("b").unwrap().len(), 2);
}
