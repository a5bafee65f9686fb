//! Revision storage
//!
//! The database keeps revision trees in memory and mirrors every node into a
//! `RevisionStore`. The store has no transactions of its own; the transaction
//! journal compensates (`put` undone by `delete` and vice versa) and `sync`
//! marks the durability boundary at each outermost commit.

mod errors;
mod file;
mod memory;
mod record;

use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

pub use errors::{StoreError, StoreErrorCode, StoreResult};
pub use file::{FileRevisionStore, STORE_FILE};
pub use memory::MemoryRevisionStore;

use crate::revision::{RevisionId, RevisionNode};

/// Persistence collaborator for revision nodes.
pub trait RevisionStore: Send + Sync {
    fn get(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<Option<RevisionNode>>;

    /// Insert or overwrite a node.
    fn put(&self, node: &RevisionNode) -> StoreResult<()>;

    /// Remove a node. Removing an absent node is not an error.
    fn delete(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<()>;

    /// Ids of every document with at least one stored revision, sorted.
    fn document_ids(&self) -> StoreResult<Vec<String>>;

    fn revisions(&self, doc_id: &str) -> StoreResult<Vec<RevisionNode>>;

    /// Make everything written so far durable.
    fn sync(&self) -> StoreResult<()>;
}

/// Store backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File { path: PathBuf },
}

/// Builds the store for `backend`.
pub fn open_store(backend: &StoreBackend) -> StoreResult<Arc<dyn RevisionStore>> {
    match backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryRevisionStore::new())),
        StoreBackend::File { path } => Ok(Arc::new(FileRevisionStore::open(path)?)),
    }
}
