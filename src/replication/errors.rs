//! Replication error types

use std::fmt;

use super::state::ReplicationState;

/// Replication error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicationErrorKind {
    /// Lifecycle transition not permitted from the current state
    IllegalTransition,
    /// Remote address rejected at creation
    InvalidRemote,
}

/// Replication error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationError {
    pub kind: ReplicationErrorKind,
    pub message: String,
}

impl ReplicationError {
    pub fn new(kind: ReplicationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn illegal_transition(from: ReplicationState, to: ReplicationState) -> Self {
        Self::new(
            ReplicationErrorKind::IllegalTransition,
            format!("cannot move from {} to {}", from, to),
        )
    }

    pub fn invalid_remote(message: impl Into<String>) -> Self {
        Self::new(ReplicationErrorKind::InvalidRemote, message)
    }
}

impl fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ReplicationError({:?}): {}", self.kind, self.message)
    }
}

impl std::error::Error for ReplicationError {}

/// Result type for replication operations
pub type ReplicationResult<T> = Result<T, ReplicationError>;
