//! In-memory revision store

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use super::errors::StoreResult;
use super::RevisionStore;
use crate::revision::{RevisionId, RevisionNode};

type NodeMap = HashMap<String, BTreeMap<RevisionId, RevisionNode>>;

/// Volatile store. `sync` is a no-op.
#[derive(Debug, Default)]
pub struct MemoryRevisionStore {
    nodes: RwLock<NodeMap>,
}

impl MemoryRevisionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total revisions held across all documents.
    pub fn len(&self) -> usize {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn from_nodes(nodes: impl IntoIterator<Item = RevisionNode>) -> Self {
        let mut map = NodeMap::new();
        for node in nodes {
            map.entry(node.doc_id().to_string())
                .or_default()
                .insert(node.rev_id().clone(), node);
        }
        Self {
            nodes: RwLock::new(map),
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<RevisionNode> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut doc_ids: Vec<&String> = nodes.keys().collect();
        doc_ids.sort();
        doc_ids
            .into_iter()
            .flat_map(|doc| nodes[doc].values().cloned())
            .collect()
    }
}

impl RevisionStore for MemoryRevisionStore {
    fn get(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<Option<RevisionNode>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(nodes.get(doc_id).and_then(|revs| revs.get(rev_id)).cloned())
    }

    fn put(&self, node: &RevisionNode) -> StoreResult<()> {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        nodes
            .entry(node.doc_id().to_string())
            .or_default()
            .insert(node.rev_id().clone(), node.clone());
        Ok(())
    }

    fn delete(&self, doc_id: &str, rev_id: &RevisionId) -> StoreResult<()> {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(revs) = nodes.get_mut(doc_id) {
            revs.remove(rev_id);
            if revs.is_empty() {
                nodes.remove(doc_id);
            }
        }
        Ok(())
    }

    fn document_ids(&self) -> StoreResult<Vec<String>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = nodes.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    fn revisions(&self, doc_id: &str) -> StoreResult<Vec<RevisionNode>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(nodes
            .get(doc_id)
            .map(|revs| revs.values().cloned().collect())
            .unwrap_or_default())
    }

    fn sync(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(doc: &str, gen: u64, digest: &str) -> RevisionNode {
        RevisionNode::new(doc, RevisionId::new(gen, digest).unwrap(), None, None, false)
    }

    #[test]
    fn test_put_get_delete() {
        let store = MemoryRevisionStore::new();
        let n = node("a", 1, "aa");
        store.put(&n).unwrap();
        assert_eq!(store.get("a", n.rev_id()).unwrap(), Some(n.clone()));

        store.delete("a", n.rev_id()).unwrap();
        assert_eq!(store.get("a", n.rev_id()).unwrap(), None);
        assert!(store.document_ids().unwrap().is_empty());
    }

    #[test]
    fn test_revisions_are_per_document() {
        let store = MemoryRevisionStore::new();
        store.put(&node("a", 1, "aa")).unwrap();
        store.put(&node("a", 2, "bb")).unwrap();
        store.put(&node("b", 1, "cc")).unwrap();

        assert_eq!(store.revisions("a").unwrap().len(), 2);
        assert_eq!(store.document_ids().unwrap(), vec!["a", "b"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let store = MemoryRevisionStore::new();
        store.delete("ghost", &RevisionId::new(1, "aa").unwrap()).unwrap();
        assert!(store.is_empty());
    }
}
