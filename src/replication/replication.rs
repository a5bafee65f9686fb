//! Replication handle
//!
//! The network protocol is out of scope; this handle carries the lifecycle a
//! replicator drives (`start`, `mark_idle`, `mark_active`, `stop`) and fans
//! each state change out synchronously:
//! 1. internal observers (the owning database's registry)
//! 2. caller listeners, in registration order
//!
//! Observers run first so a caller listener always sees the registry already
//! updated for the change it is being told about.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde::Serialize;
use uuid::Uuid;

use super::errors::{ReplicationError, ReplicationResult};
use super::state::{Direction, ReplicationState};
use crate::notify::ListenerId;
use crate::observability::{log_event_at, log_event_with_fields, Event, Severity};

/// One lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplicationChange {
    pub replication_id: Uuid,
    pub previous: ReplicationState,
    pub current: ReplicationState,
    /// Per-replication transition counter, starting at 1
    pub seq: u64,
}

/// Internal subscriber to state changes.
pub(crate) trait ReplicationObserver: Send + Sync {
    fn replication_changed(&self, replication: &Replication, change: &ReplicationChange);
}

type ChangeCallback = Arc<dyn Fn(&ReplicationChange) + Send + Sync>;

struct Lifecycle {
    state: ReplicationState,
    seq: u64,
}

struct Inner {
    id: Uuid,
    remote: String,
    direction: Direction,
    lifecycle: Mutex<Lifecycle>,
    observers: RwLock<Vec<Weak<dyn ReplicationObserver>>>,
    listeners: RwLock<Vec<(ListenerId, ChangeCallback)>>,
}

/// A replication to or from one remote. Clones share state.
#[derive(Clone)]
pub struct Replication {
    inner: Arc<Inner>,
}

impl Replication {
    pub fn new(remote: impl Into<String>, direction: Direction) -> ReplicationResult<Self> {
        let remote = remote.into();
        if remote.trim().is_empty() {
            return Err(ReplicationError::invalid_remote("remote must not be empty"));
        }
        Ok(Self {
            inner: Arc::new(Inner {
                id: Uuid::new_v4(),
                remote,
                direction,
                lifecycle: Mutex::new(Lifecycle {
                    state: ReplicationState::NotStarted,
                    seq: 0,
                }),
                observers: RwLock::new(Vec::new()),
                listeners: RwLock::new(Vec::new()),
            }),
        })
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn remote(&self) -> &str {
        &self.inner.remote
    }

    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    pub fn state(&self) -> ReplicationState {
        self.inner
            .lifecycle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    pub fn is_pull(&self) -> bool {
        self.inner.direction == Direction::Pull
    }

    /// NotStarted → Active.
    pub fn start(&self) -> ReplicationResult<()> {
        self.move_to(ReplicationState::Active)
    }

    /// Active → Idle, once caught up.
    pub fn mark_idle(&self) -> ReplicationResult<()> {
        self.move_to(ReplicationState::Idle)
    }

    /// Idle → Active, when new work arrives.
    pub fn mark_active(&self) -> ReplicationResult<()> {
        self.move_to(ReplicationState::Active)
    }

    /// Any running or unstarted state → Stopped.
    pub fn stop(&self) -> ReplicationResult<()> {
        self.move_to(ReplicationState::Stopped)
    }

    /// Registers a callback for state changes.
    pub fn add_change_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&ReplicationChange) + Send + Sync + 'static,
    {
        let id = ListenerId::new();
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Arc::new(listener)));
        id
    }

    pub fn remove_change_listener(&self, id: ListenerId) {
        self.inner
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(existing, _)| *existing != id);
    }

    pub(crate) fn add_observer(&self, observer: Weak<dyn ReplicationObserver>) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn move_to(&self, next: ReplicationState) -> ReplicationResult<()> {
        let change = {
            let mut lifecycle = self
                .inner
                .lifecycle
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let previous = lifecycle.state;
            let current = previous.transition(next)?;
            if current == previous {
                return Ok(());
            }
            lifecycle.state = current;
            lifecycle.seq += 1;
            ReplicationChange {
                replication_id: self.inner.id,
                previous,
                current,
                seq: lifecycle.seq,
            }
        };

        log_event_with_fields(
            Event::ReplicationStateChanged,
            &[
                ("replication", &change.replication_id.to_string()),
                ("remote", &self.inner.remote),
                ("from", change.previous.as_str()),
                ("to", change.current.as_str()),
            ],
        );
        self.dispatch(&change);
        Ok(())
    }

    fn dispatch(&self, change: &ReplicationChange) {
        let observers: Vec<Arc<dyn ReplicationObserver>> = {
            let mut observers = self
                .inner
                .observers
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            observers.retain(|o| o.strong_count() > 0);
            observers.iter().filter_map(Weak::upgrade).collect()
        };
        for observer in observers {
            observer.replication_changed(self, change);
        }

        let listeners: Vec<(ListenerId, ChangeCallback)> = self
            .inner
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for (id, listener) in listeners {
            if panic::catch_unwind(AssertUnwindSafe(|| listener(change))).is_err() {
                log_event_at(
                    Severity::Error,
                    Event::ListenerFailed,
                    &[
                        ("listener", &id.to_string()),
                        ("replication", &change.replication_id.to_string()),
                    ],
                );
            }
        }
    }
}

impl PartialEq for Replication {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Replication {}

impl fmt::Debug for Replication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Replication")
            .field("id", &self.inner.id)
            .field("remote", &self.inner.remote)
            .field("direction", &self.inner.direction)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replication::ReplicationErrorKind;

    #[test]
    fn test_new_replication_is_not_started() {
        let repl = Replication::new("http://remote/db", Direction::Pull).unwrap();
        assert_eq!(repl.state(), ReplicationState::NotStarted);
        assert!(repl.is_pull());
    }

    #[test]
    fn test_empty_remote_rejected() {
        let err = Replication::new("  ", Direction::Push).unwrap_err();
        assert_eq!(err.kind, ReplicationErrorKind::InvalidRemote);
    }

    #[test]
    fn test_listener_sees_each_transition_once() {
        let repl = Replication::new("http://remote/db", Direction::Push).unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        repl.add_change_listener(move |c| s.lock().unwrap().push((c.previous, c.current, c.seq)));

        repl.start().unwrap();
        repl.start().unwrap();
        repl.mark_idle().unwrap();
        repl.stop().unwrap();

        use ReplicationState::*;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(NotStarted, Active, 1), (Active, Idle, 2), (Idle, Stopped, 3)]
        );
    }

    #[test]
    fn test_illegal_transition_emits_nothing() {
        let repl = Replication::new("http://remote/db", Direction::Push).unwrap();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        repl.add_change_listener(move |_| *h.lock().unwrap() += 1);

        repl.stop().unwrap();
        assert!(repl.start().is_err());
        assert_eq!(*hits.lock().unwrap(), 1);
        assert_eq!(repl.state(), ReplicationState::Stopped);
    }

    #[test]
    fn test_removed_listener_is_silent() {
        let repl = Replication::new("http://remote/db", Direction::Push).unwrap();
        let hits = Arc::new(Mutex::new(0));
        let h = hits.clone();
        let id = repl.add_change_listener(move |_| *h.lock().unwrap() += 1);
        repl.remove_change_listener(id);
        repl.start().unwrap();
        assert_eq!(*hits.lock().unwrap(), 0);
    }

    #[test]
    fn test_clones_share_state() {
        let repl = Replication::new("http://remote/db", Direction::Pull).unwrap();
        let other = repl.clone();
        repl.start().unwrap();
        assert_eq!(other.state(), ReplicationState::Active);
        assert_eq!(repl, other);
    }
}
