//! Database - revision trees, transactions, notifications and replications
//!
//! Concurrency model:
//! - one `Mutex<RevisionTree>` per document; every read or write of a tree
//!   holds it, so no reader sees a half-applied insert
//! - one writer gate per database; transactions and compaction steps hold it
//!   while mutating, readers never take it
//! - listeners run after the gate is released, on the committing thread,
//!   before the write call returns

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use super::config::{validate_max_rev_tree_depth, DatabaseConfig};
use super::document::Document;
use super::errors::{DatabaseError, DatabaseResult};
use crate::compaction::{CompactionEngine, CompactionReport};
use crate::notify::{ChangeEvent, ChangeNotifier, DispatchReport, ListenerHandle, ListenerId};
use crate::observability::{log_event_with_fields, Event, Logger};
use crate::replication::{
    ActiveReplications, Direction, Replication, ReplicationObserver, ReplicationResult,
};
use crate::revision::{
    CanonicalJson, Canonicalizer, Properties, RevisionId, RevisionNode, RevisionTree,
};
use crate::store::{open_store, RevisionStore};
use crate::transaction::{Transaction, WriterGate};

type TreeHandle = Arc<Mutex<RevisionTree>>;

/// An embedded multi-version document database.
pub struct Database {
    name: String,
    max_rev_tree_depth: AtomicU32,
    store: Arc<dyn RevisionStore>,
    canonicalizer: Arc<dyn Canonicalizer>,
    documents: RwLock<HashMap<String, TreeHandle>>,
    gate: WriterGate,
    notifier: ChangeNotifier,
    sequence: AtomicU64,
    compaction: Mutex<()>,
    replications: Arc<ActiveReplications>,
}

impl Database {
    /// Opens a database, building its store from `config.store`.
    pub fn open(config: DatabaseConfig) -> DatabaseResult<Self> {
        config.validate()?;
        if let Some(severity) = config.min_severity() {
            Logger::set_min_severity(severity);
        }
        let store = open_store(&config.store)?;
        Self::with_store(config, store)
    }

    /// Opens a database over an existing store.
    pub fn with_store(config: DatabaseConfig, store: Arc<dyn RevisionStore>) -> DatabaseResult<Self> {
        Self::with_parts(config, store, Arc::new(CanonicalJson))
    }

    /// Opens a database with an explicit property canonicalizer.
    pub fn with_parts(
        config: DatabaseConfig,
        store: Arc<dyn RevisionStore>,
        canonicalizer: Arc<dyn Canonicalizer>,
    ) -> DatabaseResult<Self> {
        config.validate()?;

        let mut documents = HashMap::new();
        let mut revisions = 0;
        for doc_id in store.document_ids()? {
            let nodes = store.revisions(&doc_id)?;
            revisions += nodes.len();
            let tree = RevisionTree::from_nodes(doc_id.clone(), nodes)?;
            documents.insert(doc_id, Arc::new(Mutex::new(tree)));
        }

        let name = config.resolved_name();
        log_event_with_fields(
            Event::DatabaseOpen,
            &[
                ("database", &name),
                ("documents", &documents.len().to_string()),
                ("revisions", &revisions.to_string()),
                ("max_rev_tree_depth", &config.max_rev_tree_depth.to_string()),
            ],
        );

        Ok(Self {
            name,
            max_rev_tree_depth: AtomicU32::new(config.max_rev_tree_depth),
            store,
            canonicalizer,
            documents: RwLock::new(documents),
            gate: WriterGate::new(),
            notifier: ChangeNotifier::new(),
            sequence: AtomicU64::new(0),
            compaction: Mutex::new(()),
            replications: Arc::new(ActiveReplications::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn max_rev_tree_depth(&self) -> u32 {
        self.max_rev_tree_depth.load(Ordering::Acquire)
    }

    /// Changes the depth used by later compactions. Zero is rejected.
    pub fn set_max_rev_tree_depth(&self, depth: u32) -> DatabaseResult<()> {
        validate_max_rev_tree_depth(depth)?;
        let previous = self.max_rev_tree_depth.swap(depth, Ordering::AcqRel);
        log_event_with_fields(
            Event::ConfigChanged,
            &[
                ("database", &self.name),
                ("max_rev_tree_depth", &depth.to_string()),
                ("previous", &previous.to_string()),
            ],
        );
        Ok(())
    }

    /// Sequence of the most recently published change event.
    pub fn last_sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    // --- Reads ---

    /// Snapshot of a document, `None` if it has no revisions.
    pub fn document(&self, doc_id: &str) -> Option<Document> {
        let handle = self.tree_handle(doc_id)?;
        let tree = self.lock_tree(&handle);
        Document::from_tree(&tree)
    }

    /// The winning revision of a document.
    pub fn current_revision(&self, doc_id: &str) -> Option<RevisionNode> {
        let handle = self.tree_handle(doc_id)?;
        let tree = self.lock_tree(&handle);
        tree.current_node().cloned()
    }

    pub fn revision(&self, doc_id: &str, rev_id: &RevisionId) -> Option<RevisionNode> {
        let handle = self.tree_handle(doc_id)?;
        let tree = self.lock_tree(&handle);
        tree.get(rev_id).cloned()
    }

    /// Current revision back to the oldest retained ancestor.
    pub fn history(&self, doc_id: &str) -> DatabaseResult<Vec<RevisionNode>> {
        let handle = self
            .tree_handle(doc_id)
            .ok_or_else(|| DatabaseError::NotFound(format!("document '{}'", doc_id)))?;
        let tree = self.lock_tree(&handle);
        if tree.is_empty() {
            return Err(DatabaseError::NotFound(format!("document '{}'", doc_id)));
        }
        Ok(tree.history().into_iter().cloned().collect())
    }

    /// Copy of a document's full revision tree.
    pub fn revision_tree(&self, doc_id: &str) -> Option<RevisionTree> {
        let handle = self.tree_handle(doc_id)?;
        let tree = self.lock_tree(&handle);
        (!tree.is_empty()).then(|| tree.clone())
    }

    /// Ids of documents with at least one revision, sorted.
    pub fn document_ids(&self) -> Vec<String> {
        let handles: Vec<(String, TreeHandle)> = {
            let documents = self.documents.read().unwrap_or_else(PoisonError::into_inner);
            documents
                .iter()
                .map(|(id, handle)| (id.clone(), handle.clone()))
                .collect()
        };
        let mut ids: Vec<String> = handles
            .into_iter()
            .filter(|(_, handle)| !self.lock_tree(handle).is_empty())
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        ids
    }

    pub fn document_count(&self) -> usize {
        self.document_ids().len()
    }

    // --- Writes ---

    /// Runs `work` as one atomic unit.
    ///
    /// - `Ok(true)`: mutations are committed, one aggregate event is
    ///   delivered to listeners, then `Ok(true)` is returned
    /// - `Ok(false)`: everything is rolled back, nothing is delivered
    /// - `Err(e)`: everything is rolled back and `e` is returned
    ///
    /// A panic inside `work` rolls back before unwinding further.
    pub fn run_in_transaction<F>(&self, work: F) -> DatabaseResult<bool>
    where
        F: FnOnce(&mut Transaction<'_>) -> DatabaseResult<bool>,
    {
        let mut txn = Transaction::begin(self)?;
        match work(&mut txn) {
            Ok(true) => {
                let event = txn.commit()?;
                self.publish(event);
                Ok(true)
            }
            Ok(false) => {
                txn.rollback("declined");
                Ok(false)
            }
            Err(e) => {
                txn.rollback(&e.to_string());
                Err(e)
            }
        }
    }

    pub fn create_document(&self, properties: Properties) -> DatabaseResult<RevisionNode> {
        self.single(|txn| txn.create_document(properties))
    }

    pub fn create_document_with_id(
        &self,
        doc_id: &str,
        properties: Properties,
    ) -> DatabaseResult<RevisionNode> {
        self.single(|txn| txn.create_document_with_id(doc_id, properties))
    }

    pub fn put_properties(&self, doc_id: &str, properties: Properties) -> DatabaseResult<RevisionNode> {
        self.single(|txn| txn.put_properties(doc_id, properties))
    }

    pub fn put_revision(
        &self,
        doc_id: &str,
        parent: Option<&RevisionId>,
        properties: Option<Properties>,
        deleted: bool,
    ) -> DatabaseResult<RevisionNode> {
        self.single(|txn| txn.put_revision(doc_id, parent, properties, deleted))
    }

    pub fn force_insert(
        &self,
        doc_id: &str,
        parent: Option<&RevisionId>,
        properties: Option<Properties>,
        deleted: bool,
        source: Option<&str>,
    ) -> DatabaseResult<RevisionNode> {
        self.single(|txn| txn.force_insert(doc_id, parent, properties, deleted, source))
    }

    pub fn delete_document(&self, doc_id: &str) -> DatabaseResult<RevisionNode> {
        self.single(|txn| txn.delete_document(doc_id))
    }

    /// A single mutation as its own transaction.
    fn single<T, F>(&self, work: F) -> DatabaseResult<T>
    where
        F: FnOnce(&mut Transaction<'_>) -> DatabaseResult<T>,
    {
        let mut txn = Transaction::begin(self)?;
        match work(&mut txn) {
            Ok(value) => {
                let event = txn.commit()?;
                self.publish(event);
                Ok(value)
            }
            Err(e) => {
                txn.rollback(&e.to_string());
                Err(e)
            }
        }
    }

    // --- Notifications ---

    pub fn add_change_listener(&self, handle: ListenerHandle) {
        self.notifier.add_change_listener(handle);
    }

    /// Registers a closure and returns its handle for later removal.
    pub fn on_change<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        let handle = ListenerHandle::new(listener);
        self.notifier.add_change_listener(handle.clone());
        handle
    }

    pub fn remove_change_listener(&self, id: ListenerId) {
        self.notifier.remove_change_listener(id);
    }

    pub fn listener_count(&self) -> usize {
        self.notifier.listener_count()
    }

    fn publish(&self, event: Option<ChangeEvent>) -> DispatchReport {
        match event {
            Some(event) if !event.is_empty() => self.notifier.notify(event),
            _ => DispatchReport::default(),
        }
    }

    // --- Compaction ---

    /// Prunes every document to the configured depth.
    pub fn compact(&self) -> DatabaseResult<CompactionReport> {
        CompactionEngine::new(self.max_rev_tree_depth())?.compact(self)
    }

    // --- Replications ---

    pub fn create_pull_replication(&self, remote: &str) -> ReplicationResult<Replication> {
        self.create_replication(remote, Direction::Pull)
    }

    pub fn create_push_replication(&self, remote: &str) -> ReplicationResult<Replication> {
        self.create_replication(remote, Direction::Push)
    }

    fn create_replication(&self, remote: &str, direction: Direction) -> ReplicationResult<Replication> {
        let replication = Replication::new(remote, direction)?;
        let observer: Weak<dyn ReplicationObserver> =
            Arc::downgrade(&self.replications) as Weak<dyn ReplicationObserver>;
        replication.add_observer(observer);
        self.replications.register(&replication);
        Ok(replication)
    }

    /// Every replication this database created.
    pub fn all_replications(&self) -> Vec<Replication> {
        self.replications.all()
    }

    /// Replications currently in `Active`.
    pub fn active_replications(&self) -> Vec<Replication> {
        self.replications.active()
    }

    pub fn replications(&self) -> &ActiveReplications {
        &self.replications
    }

    // --- Crate internals ---

    pub(crate) fn gate(&self) -> &WriterGate {
        &self.gate
    }

    pub(crate) fn store(&self) -> &dyn RevisionStore {
        self.store.as_ref()
    }

    pub(crate) fn canonicalizer(&self) -> &dyn Canonicalizer {
        self.canonicalizer.as_ref()
    }

    pub(crate) fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn compaction_guard(&self) -> MutexGuard<'_, ()> {
        self.compaction.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn tree_handle(&self, doc_id: &str) -> Option<TreeHandle> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(doc_id)
            .cloned()
    }

    pub(crate) fn tree_handle_or_create(&self, doc_id: &str) -> TreeHandle {
        if let Some(handle) = self.tree_handle(doc_id) {
            return handle;
        }
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(doc_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(RevisionTree::new(doc_id))))
            .clone()
    }

    /// Drops the entry for `doc_id` if its tree holds no revisions. Called
    /// with the writer gate held, after a failed insert or an undo.
    pub(crate) fn discard_if_empty(&self, doc_id: &str) {
        let mut documents = self.documents.write().unwrap_or_else(PoisonError::into_inner);
        let empty = documents
            .get(doc_id)
            .is_some_and(|handle| self.lock_tree(handle).is_empty());
        if empty {
            documents.remove(doc_id);
        }
    }

    pub(crate) fn lock_tree<'a>(&self, handle: &'a TreeHandle) -> MutexGuard<'a, RevisionTree> {
        handle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.name)
            .field("max_rev_tree_depth", &self.max_rev_tree_depth())
            .field("last_sequence", &self.last_sequence())
            .finish()
    }
}
