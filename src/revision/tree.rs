//! RevisionTree - the branching history of one document
//!
//! Nodes live in an arena keyed by `RevisionId`; parent links are keys into
//! that arena. `leaves` and `current` are derived views, recomputed after
//! every structural change so a reader holding the tree never observes a
//! half-applied insert.
//!
//! Invariants:
//! - every parent link references a node in the arena
//! - `leaves` is non-empty whenever the arena is non-empty
//! - `current` is a member of `leaves`; a deleted leaf is only current when
//!   no live leaf exists
//! - pruning never removes a leaf

use std::collections::{BTreeMap, BTreeSet};

use super::canonical::{Canonicalizer, Properties};
use super::errors::{RevisionError, RevisionResult};
use super::node::RevisionNode;
use super::revision_id::RevisionId;

/// How `add_revision` treats a parent that is not a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    /// Parent must be a current leaf; anything else is a conflict.
    Strict,
    /// Any existing parent is accepted. Used by replication to record
    /// concurrent branches on purpose.
    Force,
}

/// Outcome of `add_revision`.
#[derive(Debug, Clone)]
pub struct Insertion {
    /// The inserted node, or the already-present node for an idempotent
    /// forced insert.
    pub node: RevisionNode,
    /// False when a forced insert found the revision already present.
    pub inserted: bool,
    /// `current` before the insert.
    pub previous_current: Option<RevisionId>,
}

/// A node that lost its parent link during pruning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detachment {
    pub rev_id: RevisionId,
    pub former_parent: RevisionId,
}

/// Outcome of `prune_to_depth`.
#[derive(Debug, Clone, Default)]
pub struct Pruning {
    /// Removed nodes, as they were before removal.
    pub removed: Vec<RevisionNode>,
    /// Surviving nodes that became roots.
    pub detached: Vec<Detachment>,
}

impl Pruning {
    /// Ids of the removed nodes.
    pub fn removed_ids(&self) -> BTreeSet<RevisionId> {
        self.removed.iter().map(|n| n.rev_id().clone()).collect()
    }

    /// True if nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// The full revision graph of a single document.
#[derive(Debug, Clone)]
pub struct RevisionTree {
    doc_id: String,
    nodes: BTreeMap<RevisionId, RevisionNode>,
    leaves: BTreeSet<RevisionId>,
    current: Option<RevisionId>,
}

impl RevisionTree {
    /// Creates an empty tree for `doc_id`.
    pub fn new(doc_id: impl Into<String>) -> Self {
        Self {
            doc_id: doc_id.into(),
            nodes: BTreeMap::new(),
            leaves: BTreeSet::new(),
            current: None,
        }
    }

    /// Rebuilds a tree from persisted nodes.
    ///
    /// Fails if any node references a parent that is not among `nodes`.
    pub fn from_nodes(
        doc_id: impl Into<String>,
        nodes: impl IntoIterator<Item = RevisionNode>,
    ) -> RevisionResult<Self> {
        let mut tree = Self::new(doc_id);
        for node in nodes {
            tree.nodes.insert(node.rev_id().clone(), node);
        }

        for node in tree.nodes.values() {
            if let Some(parent) = node.parent_rev_id() {
                if !tree.nodes.contains_key(parent) {
                    return Err(RevisionError::DanglingParent {
                        doc_id: tree.doc_id.clone(),
                        rev_id: node.rev_id().to_string(),
                        parent: parent.to_string(),
                    });
                }
            }
        }

        tree.recompute();
        Ok(tree)
    }

    /// Owning document id.
    #[inline]
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Number of revisions held.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no revision exists.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Looks up a revision.
    pub fn get(&self, rev_id: &RevisionId) -> Option<&RevisionNode> {
        self.nodes.get(rev_id)
    }

    /// True if `rev_id` is present.
    pub fn contains(&self, rev_id: &RevisionId) -> bool {
        self.nodes.contains_key(rev_id)
    }

    /// All nodes in revision order.
    pub fn nodes(&self) -> impl Iterator<Item = &RevisionNode> {
        self.nodes.values()
    }

    /// Revisions without children.
    #[inline]
    pub fn leaves(&self) -> &BTreeSet<RevisionId> {
        &self.leaves
    }

    /// The winning leaf.
    #[inline]
    pub fn current(&self) -> Option<&RevisionId> {
        self.current.as_ref()
    }

    /// The winning leaf's node.
    pub fn current_node(&self) -> Option<&RevisionNode> {
        self.current.as_ref().and_then(|id| self.nodes.get(id))
    }

    /// True if the winning revision is a tombstone.
    pub fn is_deleted(&self) -> bool {
        self.current_node().is_some_and(|n| n.is_deleted())
    }

    /// Live leaves other than `current`, highest first.
    pub fn conflicting_leaves(&self) -> Vec<&RevisionNode> {
        self.leaves
            .iter()
            .rev()
            .filter(|id| Some(*id) != self.current.as_ref())
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| !n.is_deleted())
            .collect()
    }

    /// More than one live leaf.
    pub fn is_conflicted(&self) -> bool {
        self.leaves
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .filter(|n| !n.is_deleted())
            .count()
            > 1
    }

    /// Adds a revision as a child of `parent`.
    ///
    /// With `parent = None` a root is created on an empty tree; on a tree
    /// whose current revision is a tombstone the tombstone becomes the parent;
    /// otherwise the document already exists and the call conflicts.
    pub fn add_revision(
        &mut self,
        parent: Option<&RevisionId>,
        properties: Option<Properties>,
        deleted: bool,
        mode: InsertMode,
        canonicalizer: &dyn Canonicalizer,
    ) -> RevisionResult<Insertion> {
        let parent = self.resolve_parent(parent, mode)?;

        let properties = if deleted {
            None
        } else {
            Some(properties.unwrap_or_default())
        };
        let canonical = match &properties {
            Some(props) => canonicalizer.canonicalize(props),
            None => canonicalizer.canonicalize(&Properties::new()),
        };
        let rev_id = RevisionId::compute(parent.as_ref(), deleted, &canonical);
        let previous_current = self.current.clone();

        if let Some(existing) = self.nodes.get(&rev_id) {
            return match mode {
                InsertMode::Strict => Err(RevisionError::conflict(
                    &self.doc_id,
                    format!("revision {} already exists", rev_id),
                )),
                InsertMode::Force => Ok(Insertion {
                    node: existing.clone(),
                    inserted: false,
                    previous_current,
                }),
            };
        }

        let node = RevisionNode::new(self.doc_id.clone(), rev_id.clone(), parent, properties, deleted);
        self.nodes.insert(rev_id, node.clone());
        self.recompute();

        Ok(Insertion {
            node,
            inserted: true,
            previous_current,
        })
    }

    fn resolve_parent(
        &self,
        parent: Option<&RevisionId>,
        mode: InsertMode,
    ) -> RevisionResult<Option<RevisionId>> {
        match parent {
            Some(parent) => {
                if !self.nodes.contains_key(parent) {
                    return Err(RevisionError::not_found(&self.doc_id, parent));
                }
                if mode == InsertMode::Strict && !self.leaves.contains(parent) {
                    return Err(RevisionError::conflict(
                        &self.doc_id,
                        format!("parent {} is not a leaf", parent),
                    ));
                }
                Ok(Some(parent.clone()))
            }
            None => match self.current_node() {
                None => Ok(None),
                Some(current) if current.is_deleted() => Ok(Some(current.rev_id().clone())),
                Some(current) => Err(RevisionError::conflict(
                    &self.doc_id,
                    format!("document exists with current revision {}", current.rev_id()),
                )),
            },
        }
    }

    /// Discards history beyond `max_depth` generations per branch.
    ///
    /// Each leaf keeps itself and its `max_depth - 1` nearest ancestors. A
    /// node outside every leaf's window is removed. A kept node whose parent
    /// was removed becomes a parentless root. A depth of 0 is treated as 1.
    pub fn prune_to_depth(&mut self, max_depth: u32) -> Pruning {
        let depth = max_depth.max(1) as usize;

        let mut keep: BTreeSet<RevisionId> = BTreeSet::new();
        for leaf in &self.leaves {
            let mut cursor = Some(leaf);
            let mut taken = 0;
            while let Some(id) = cursor {
                if taken == depth {
                    break;
                }
                let Some(node) = self.nodes.get(id) else {
                    break;
                };
                keep.insert(id.clone());
                taken += 1;
                cursor = node.parent_rev_id();
            }
        }

        let doomed: Vec<RevisionId> = self
            .nodes
            .keys()
            .filter(|id| !keep.contains(*id))
            .cloned()
            .collect();
        if doomed.is_empty() {
            return Pruning::default();
        }

        let mut pruning = Pruning::default();
        for id in doomed {
            if let Some(node) = self.nodes.remove(&id) {
                pruning.removed.push(node);
            }
        }

        for node in self.nodes.values_mut() {
            let orphaned = node
                .parent_rev_id()
                .filter(|parent| !keep.contains(*parent))
                .cloned();
            if let Some(former_parent) = orphaned {
                node.set_parent(None);
                pruning.detached.push(Detachment {
                    rev_id: node.rev_id().clone(),
                    former_parent,
                });
            }
        }

        let before = self.current.clone();
        self.recompute();
        debug_assert_eq!(before, self.current, "pruning must not change the winner");

        pruning
    }

    /// Revisions from `current` back to the oldest retained ancestor.
    pub fn history(&self) -> Vec<&RevisionNode> {
        match &self.current {
            Some(current) => self.ancestry(current),
            None => Vec::new(),
        }
    }

    /// Revisions from `rev_id` back to the oldest retained ancestor.
    pub fn ancestry(&self, rev_id: &RevisionId) -> Vec<&RevisionNode> {
        let mut out = Vec::new();
        let mut cursor = self.nodes.get(rev_id);
        while let Some(node) = cursor {
            out.push(node);
            cursor = node.parent_rev_id().and_then(|p| self.nodes.get(p));
        }
        out
    }

    // --- Raw operations, used only to undo journaled changes ---

    pub(crate) fn restore_node(&mut self, node: RevisionNode) {
        self.nodes.insert(node.rev_id().clone(), node);
        self.recompute();
    }

    pub(crate) fn remove_node(&mut self, rev_id: &RevisionId) -> Option<RevisionNode> {
        let removed = self.nodes.remove(rev_id);
        if removed.is_some() {
            self.recompute();
        }
        removed
    }

    pub(crate) fn set_parent(&mut self, rev_id: &RevisionId, parent: Option<RevisionId>) -> Option<&RevisionNode> {
        let node = self.nodes.get_mut(rev_id)?;
        node.set_parent(parent);
        self.recompute();
        self.nodes.get(rev_id)
    }

    fn recompute(&mut self) {
        let parents: BTreeSet<&RevisionId> = self
            .nodes
            .values()
            .filter_map(|n| n.parent_rev_id())
            .collect();

        self.leaves = self
            .nodes
            .keys()
            .filter(|id| !parents.contains(id))
            .cloned()
            .collect();

        let live_winner = self
            .leaves
            .iter()
            .filter(|id| self.nodes.get(*id).is_some_and(|n| !n.is_deleted()))
            .max();
        self.current = live_winner.or_else(|| self.leaves.iter().max()).cloned();
    }
}
