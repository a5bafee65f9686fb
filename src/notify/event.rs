//! Change events delivered to database listeners

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::revision::RevisionId;

/// One revision added to one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub doc_id: String,

    /// The revision that was added
    pub rev_id: RevisionId,

    /// Winning revision after the change
    pub winning_rev_id: RevisionId,

    /// True if the added revision became the winner
    pub is_current_revision: bool,

    /// True if the document has more than one live leaf after the change
    pub in_conflict: bool,

    /// Remote the revision arrived from, `None` for local writes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A batch of changes, one per committed unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    /// Monotonically increasing per database
    pub sequence: u64,

    /// Changes in commit order
    pub changes: Vec<DocumentChange>,

    /// True when every change came from a remote source
    pub is_external: bool,

    /// Shared source of all changes, if there is exactly one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl ChangeEvent {
    /// Builds an event from committed changes.
    pub fn new(sequence: u64, changes: Vec<DocumentChange>) -> Self {
        let is_external = !changes.is_empty() && changes.iter().all(|c| c.source.is_some());
        let source = match changes.first().and_then(|c| c.source.as_ref()) {
            Some(first) if changes.iter().all(|c| c.source.as_ref() == Some(first)) => {
                Some(first.clone())
            }
            _ => None,
        };

        Self {
            sequence,
            changes,
            is_external,
            source,
            timestamp: Utc::now(),
        }
    }

    /// Ids of changed documents, first-change order, without duplicates.
    pub fn doc_ids(&self) -> Vec<&str> {
        let mut seen = Vec::with_capacity(self.changes.len());
        for change in &self.changes {
            if !seen.contains(&change.doc_id.as_str()) {
                seen.push(change.doc_id.as_str());
            }
        }
        seen
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}
