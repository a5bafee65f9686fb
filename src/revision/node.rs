//! RevisionNode - one immutable version of a document
//!
//! A node carries either a document body or nothing at all (a tombstone).
//! The parent link is a key into the owning tree's arena, never a pointer.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::canonical::Properties;
use super::revision_id::RevisionId;

/// A single version of a document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevisionNode {
    doc_id: String,
    rev_id: RevisionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent_rev_id: Option<RevisionId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    properties: Option<Properties>,
    #[serde(default)]
    deleted: bool,
}

impl RevisionNode {
    /// Creates a node. Tombstones never carry properties.
    pub fn new(
        doc_id: impl Into<String>,
        rev_id: RevisionId,
        parent_rev_id: Option<RevisionId>,
        properties: Option<Properties>,
        deleted: bool,
    ) -> Self {
        Self {
            doc_id: doc_id.into(),
            rev_id,
            parent_rev_id,
            properties: if deleted { None } else { properties },
            deleted,
        }
    }

    /// Owning document id.
    #[inline]
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// This node's revision id.
    #[inline]
    pub fn rev_id(&self) -> &RevisionId {
        &self.rev_id
    }

    /// Parent revision id, `None` for a root.
    #[inline]
    pub fn parent_rev_id(&self) -> Option<&RevisionId> {
        self.parent_rev_id.as_ref()
    }

    /// Document body, `None` for a tombstone.
    #[inline]
    pub fn properties(&self) -> Option<&Properties> {
        self.properties.as_ref()
    }

    /// Single property lookup.
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.as_ref().and_then(|p| p.get(key))
    }

    /// True if this node marks the document as deleted on its branch.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Shorthand for `rev_id().generation()`.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.rev_id.generation()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<RevisionId>) {
        self.parent_rev_id = parent;
    }
}
