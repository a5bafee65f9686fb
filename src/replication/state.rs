//! Replication lifecycle state machine
//!
//! ```text
//! NotStarted --> Active <--> Idle
//!     |            |          |
//!     +------------+----------+--> Stopped (terminal)
//! ```
//!
//! Re-entering the current state is accepted and changes nothing.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::{ReplicationError, ReplicationResult};

/// Lifecycle state of one replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReplicationState {
    NotStarted,
    /// Transferring revisions
    Active,
    /// Caught up, waiting for changes
    Idle,
    Stopped,
}

impl ReplicationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplicationState::NotStarted => "NOT_STARTED",
            ReplicationState::Active => "ACTIVE",
            ReplicationState::Idle => "IDLE",
            ReplicationState::Stopped => "STOPPED",
        }
    }

    /// Validates a move to `next` and returns it.
    pub fn transition(self, next: ReplicationState) -> ReplicationResult<ReplicationState> {
        use ReplicationState::*;

        let allowed = self == next
            || matches!(
                (self, next),
                (NotStarted, Active)
                    | (NotStarted, Stopped)
                    | (Active, Idle)
                    | (Idle, Active)
                    | (Active, Stopped)
                    | (Idle, Stopped)
            );

        if allowed {
            Ok(next)
        } else {
            Err(ReplicationError::illegal_transition(self, next))
        }
    }

    /// Started and not yet stopped.
    pub fn is_running(&self) -> bool {
        matches!(self, ReplicationState::Active | ReplicationState::Idle)
    }

    pub fn is_terminal(&self) -> bool {
        *self == ReplicationState::Stopped
    }
}

impl fmt::Display for ReplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which way revisions flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Push,
    Pull,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Push => "push",
            Direction::Pull => "pull",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::ReplicationState::*;
    use crate::replication::ReplicationErrorKind;

    #[test]
    fn test_forward_path() {
        assert_eq!(NotStarted.transition(Active), Ok(Active));
        assert_eq!(Active.transition(Idle), Ok(Idle));
        assert_eq!(Idle.transition(Active), Ok(Active));
        assert_eq!(Idle.transition(Stopped), Ok(Stopped));
    }

    #[test]
    fn test_stop_before_start() {
        assert_eq!(NotStarted.transition(Stopped), Ok(Stopped));
    }

    #[test]
    fn test_stopped_is_terminal() {
        for next in [NotStarted, Active, Idle] {
            let err = Stopped.transition(next).unwrap_err();
            assert_eq!(err.kind, ReplicationErrorKind::IllegalTransition);
        }
        assert_eq!(Stopped.transition(Stopped), Ok(Stopped));
    }

    #[test]
    fn test_cannot_return_to_not_started() {
        assert!(Active.transition(NotStarted).is_err());
        assert!(Idle.transition(NotStarted).is_err());
    }

    #[test]
    fn test_idle_requires_start() {
        assert!(NotStarted.transition(Idle).is_err());
    }

    #[test]
    fn test_running() {
        assert!(!NotStarted.is_running());
        assert!(Active.is_running());
        assert!(Idle.is_running());
        assert!(!Stopped.is_running());
    }
}
