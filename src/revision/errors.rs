//! Revision tree error types

use thiserror::Error;

/// Result type for revision tree operations
pub type RevisionResult<T> = Result<T, RevisionError>;

/// Revision tree errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RevisionError {
    /// Insert against a parent that is not a leaf without force intent,
    /// or creation of a document that already has a live revision.
    #[error("Conflict on document '{doc_id}': {reason}")]
    Conflict { doc_id: String, reason: String },

    /// Referenced revision does not exist in the tree
    #[error("Revision {rev_id} not found in document '{doc_id}'")]
    NotFound { doc_id: String, rev_id: String },

    /// Revision id text could not be parsed
    #[error("Invalid revision id: '{0}'")]
    InvalidRevisionId(String),

    /// A loaded node references a parent that is not present
    #[error("Revision {rev_id} of document '{doc_id}' references missing parent {parent}")]
    DanglingParent {
        doc_id: String,
        rev_id: String,
        parent: String,
    },
}

impl RevisionError {
    pub(crate) fn conflict(doc_id: &str, reason: impl Into<String>) -> Self {
        Self::Conflict {
            doc_id: doc_id.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(doc_id: &str, rev_id: impl ToString) -> Self {
        Self::NotFound {
            doc_id: doc_id.to_string(),
            rev_id: rev_id.to_string(),
        }
    }
}
