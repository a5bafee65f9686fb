//! Read-only document snapshot

use serde_json::Value;

use crate::revision::{Properties, RevisionId, RevisionNode, RevisionTree};

/// A document as of the moment it was read.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    doc_id: String,
    current: RevisionNode,
    history: Vec<RevisionNode>,
    conflicts: Vec<RevisionNode>,
    leaf_count: usize,
    revision_count: usize,
}

impl Document {
    /// Snapshot of `tree`, `None` if it holds no revisions.
    pub(crate) fn from_tree(tree: &RevisionTree) -> Option<Self> {
        let current = tree.current_node()?.clone();
        Some(Self {
            doc_id: tree.doc_id().to_string(),
            current,
            history: tree.history().into_iter().cloned().collect(),
            conflicts: tree.conflicting_leaves().into_iter().cloned().collect(),
            leaf_count: tree.leaves().len(),
            revision_count: tree.len(),
        })
    }

    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// The winning revision.
    pub fn current_revision(&self) -> &RevisionNode {
        &self.current
    }

    pub fn current_revision_id(&self) -> &RevisionId {
        self.current.rev_id()
    }

    pub fn properties(&self) -> Option<&Properties> {
        self.current.properties()
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.current.property(key)
    }

    /// True if the winning revision is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.current.is_deleted()
    }

    /// Current revision back to the oldest retained ancestor.
    pub fn history(&self) -> &[RevisionNode] {
        &self.history
    }

    /// Live leaves that lost to the current revision.
    pub fn conflicting_revisions(&self) -> &[RevisionNode] {
        &self.conflicts
    }

    /// More than one live leaf.
    pub fn is_conflicted(&self) -> bool {
        !self.conflicts.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Revisions retained for this document, all branches.
    pub fn revision_count(&self) -> usize {
        self.revision_count
    }
}
