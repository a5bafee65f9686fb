//! Observable lifecycle events for aerolite
//!
//! Events are explicit and typed. Each maps to a stable upper-case name that
//! appears as the `event` key of a log line.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Database lifecycle
    /// Database opened and revision trees loaded
    DatabaseOpen,
    /// Database configuration changed at runtime
    ConfigChanged,

    // Transactions
    /// Outermost transaction committed
    TxnCommit,
    /// Transaction (or savepoint) rolled back
    TxnRollback,
    /// Undo of a journal entry failed; storage may diverge from memory
    TxnRollbackFailed,

    // Notification
    /// Change event delivered to listeners
    ChangeDispatched,
    /// A listener panicked during delivery
    ListenerFailed,

    // Compaction
    /// A document's revision tree was pruned
    DocumentPruned,

    // Storage
    /// Store synced to durable media
    StoreSync,
    /// Persisted revision data failed validation
    StoreCorruption,

    // Replication
    /// A replication changed lifecycle state
    ReplicationStateChanged,
    /// A replication state change arrived out of order and was ignored
    ReplicationChangeIgnored,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::DatabaseOpen => "DATABASE_OPEN",
            Event::ConfigChanged => "CONFIG_CHANGED",

            Event::TxnCommit => "TXN_COMMIT",
            Event::TxnRollback => "TXN_ROLLBACK",
            Event::TxnRollbackFailed => "TXN_ROLLBACK_FAILED",

            Event::ChangeDispatched => "CHANGE_DISPATCHED",
            Event::ListenerFailed => "LISTENER_FAILED",

            Event::DocumentPruned => "DOCUMENT_PRUNED",

            Event::StoreSync => "STORE_SYNC",
            Event::StoreCorruption => "STORE_CORRUPTION",

            Event::ReplicationStateChanged => "REPLICATION_STATE_CHANGED",
            Event::ReplicationChangeIgnored => "REPLICATION_CHANGE_IGNORED",
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::StoreCorruption | Event::TxnRollbackFailed)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::DatabaseOpen,
            Event::ConfigChanged,
            Event::TxnCommit,
            Event::TxnRollback,
            Event::TxnRollbackFailed,
            Event::ChangeDispatched,
            Event::ListenerFailed,
            Event::DocumentPruned,
            Event::StoreSync,
            Event::StoreCorruption,
            Event::ReplicationStateChanged,
            Event::ReplicationChangeIgnored,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::StoreCorruption.is_fatal());
        assert!(!Event::TxnCommit.is_fatal());
        assert!(!Event::ListenerFailed.is_fatal());
    }
}
