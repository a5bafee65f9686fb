//! Database error types

use thiserror::Error;

use crate::revision::RevisionError;
use crate::store::StoreError;

/// Result type for database operations
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Database errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Write against a non-leaf parent, or creation of an existing document
    #[error("Conflict on document '{doc_id}': {reason}")]
    Conflict { doc_id: String, reason: String },

    /// Document or revision does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Storage collaborator failed
    #[error(transparent)]
    Storage(#[from] StoreError),

    /// Unit of work was rolled back
    #[error("Transaction aborted: {reason}")]
    TransactionAborted {
        reason: String,
        #[source]
        cause: Option<Box<DatabaseError>>,
    },

    /// Configuration rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A database-level write was attempted on a thread that already holds
    /// the open transaction
    #[error("A transaction is already open on this thread")]
    TransactionInProgress,

    /// Persisted revision data is structurally invalid
    #[error("Invalid revision data: {0}")]
    InvalidRevision(RevisionError),
}

impl DatabaseError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            DatabaseError::Conflict { .. } => "AERO_CONFLICT",
            DatabaseError::NotFound(_) => "AERO_NOT_FOUND",
            DatabaseError::Storage(e) => e.code().code(),
            DatabaseError::TransactionAborted { .. } => "AERO_TRANSACTION_ABORTED",
            DatabaseError::InvalidConfig(_) => "AERO_INVALID_CONFIG",
            DatabaseError::TransactionInProgress => "AERO_TRANSACTION_IN_PROGRESS",
            DatabaseError::InvalidRevision(_) => "AERO_INVALID_REVISION",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, DatabaseError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DatabaseError::NotFound(_))
    }

    pub(crate) fn aborted(reason: impl Into<String>, cause: DatabaseError) -> Self {
        DatabaseError::TransactionAborted {
            reason: reason.into(),
            cause: Some(Box::new(cause)),
        }
    }
}

impl From<RevisionError> for DatabaseError {
    fn from(err: RevisionError) -> Self {
        match err {
            RevisionError::Conflict { doc_id, reason } => DatabaseError::Conflict { doc_id, reason },
            RevisionError::NotFound { doc_id, rev_id } => {
                DatabaseError::NotFound(format!("revision {} of document '{}'", rev_id, doc_id))
            }
            other => DatabaseError::InvalidRevision(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_conflict_maps_to_conflict() {
        let err: DatabaseError = RevisionError::Conflict {
            doc_id: "a".into(),
            reason: "parent is not a leaf".into(),
        }
        .into();
        assert!(err.is_conflict());
        assert_eq!(err.code(), "AERO_CONFLICT");
    }

    #[test]
    fn test_storage_code_passes_through() {
        let err: DatabaseError = StoreError::corruption_at_offset(0, "bad").into();
        assert_eq!(err.code(), "AERO_DATA_CORRUPTION");
    }

    #[test]
    fn test_aborted_keeps_cause() {
        use std::error::Error;
        let err = DatabaseError::aborted(
            "commit failed",
            StoreError::write_failed_no_source("disk full").into(),
        );
        assert_eq!(err.code(), "AERO_TRANSACTION_ABORTED");
        assert!(err.source().is_some());
    }
}
