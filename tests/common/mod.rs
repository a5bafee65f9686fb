//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use aerolite::notify::ChangeEvent;
use aerolite::revision::{Properties, RevisionId, RevisionNode};
use aerolite::store::{MemoryRevisionStore, RevisionStore, StoreError, StoreResult};
use aerolite::{Database, DatabaseConfig};
use serde_json::Value;

/// Properties from a JSON object literal.
pub fn props(value: Value) -> Properties {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {}", other),
    }
}

pub fn memory_db(name: &str) -> Database {
    Database::open(DatabaseConfig::in_memory(name)).unwrap()
}

/// Records every delivered event.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<ChangeEvent>>>,
}

impl EventLog {
    pub fn attach(db: &Database) -> Self {
        let log = Self::default();
        let events = log.events.clone();
        db.on_change(move |e: &ChangeEvent| events.lock().unwrap().push(e.clone()));
        log
    }

    pub fn events(&self) -> Vec<ChangeEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

/// Memory store with switchable failures.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryRevisionStore,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
    pub fail_sync: AtomicBool,
    pub syncs: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    fn check(flag: &AtomicBool, op: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(StoreError::write_failed_no_source(format!("injected {} failure", op)));
        }
        Ok(())
    }
}

impl RevisionStore for FlakyStore {
    fn get(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<Option<RevisionNode>> {
        self.inner.get(doc_id, rev_id)
    }

    fn put(&self, node: &RevisionNode) -> StoreResult<()> {
        Self::check(&self.fail_put, "put")?;
        self.inner.put(node)
    }

    fn delete(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<()> {
        Self::check(&self.fail_delete, "delete")?;
        self.inner.delete(doc_id, rev_id)
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        self.inner.document_ids()
    }

    fn revisions(&self, doc_id: &str) -> StoreResult<Vec<RevisionNode>> {
        self.inner.revisions(doc_id)
    }

    fn sync(&self) -> StoreResult<()> {
        Self::check(&self.fail_sync, "sync")?;
        self.syncs.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn flaky_db(name: &str) -> (Database, Arc<FlakyStore>) {
    let store = FlakyStore::new();
    let db = Database::with_store(DatabaseConfig::in_memory(name), store.clone()).unwrap();
    (db, store)
}
