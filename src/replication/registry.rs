//! ActiveReplications - per-database view of replication lifecycles
//!
//! Populated only through state-change events from the replications the
//! database created. Each replication is tracked from its first running
//! state until it stops. A change whose `seq` is not newer than the last one
//! applied for that replication is ignored, so late deliveries cannot revive
//! a stopped entry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use uuid::Uuid;

use super::replication::{Replication, ReplicationChange, ReplicationObserver};
use super::state::ReplicationState;
use crate::observability::{log_event_at, Event, Severity};

#[derive(Debug)]
struct Entry {
    replication: Replication,
    state: ReplicationState,
    seq: u64,
}

#[derive(Debug, Default)]
struct Registry {
    /// Every replication created, in creation order
    all: Vec<Replication>,
    /// Running replications
    tracked: HashMap<Uuid, Entry>,
    /// Highest seq applied per replication, kept after it stops
    applied: HashMap<Uuid, u64>,
}

/// Registry of a database's replications.
#[derive(Debug, Default)]
pub struct ActiveReplications {
    registry: RwLock<Registry>,
}

impl ActiveReplications {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a newly created replication.
    pub(crate) fn register(&self, replication: &Replication) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        if !registry.all.iter().any(|r| r == replication) {
            registry.all.push(replication.clone());
        }
    }

    /// Every replication created by the database.
    pub fn all(&self) -> Vec<Replication> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .all
            .clone()
    }

    /// Replications currently in `Active`.
    pub fn active(&self) -> Vec<Replication> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .all
            .iter()
            .filter(|r| {
                registry
                    .tracked
                    .get(&r.id())
                    .is_some_and(|e| e.state == ReplicationState::Active)
            })
            .cloned()
            .collect()
    }

    /// Running replications with their last observed state.
    pub fn tracked(&self) -> Vec<(Replication, ReplicationState)> {
        let registry = self.registry.read().unwrap_or_else(PoisonError::into_inner);
        registry
            .all
            .iter()
            .filter_map(|r| {
                registry
                    .tracked
                    .get(&r.id())
                    .map(|e| (e.replication.clone(), e.state))
            })
            .collect()
    }

    /// Last observed state of `id`, `None` if not running.
    pub fn state_of(&self, id: Uuid) -> Option<ReplicationState> {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tracked
            .get(&id)
            .map(|e| e.state)
    }

    pub fn active_count(&self) -> usize {
        self.active().len()
    }

    fn apply(&self, replication: &Replication, change: &ReplicationChange) {
        let mut registry = self.registry.write().unwrap_or_else(PoisonError::into_inner);
        let last = registry.applied.get(&change.replication_id).copied().unwrap_or(0);
        if change.seq <= last {
            drop(registry);
            log_event_at(
                Severity::Warn,
                Event::ReplicationChangeIgnored,
                &[
                    ("replication", &change.replication_id.to_string()),
                    ("seq", &change.seq.to_string()),
                    ("applied", &last.to_string()),
                ],
            );
            return;
        }
        registry.applied.insert(change.replication_id, change.seq);

        if change.current.is_running() {
            let entry = registry
                .tracked
                .entry(change.replication_id)
                .or_insert_with(|| Entry {
                    replication: replication.clone(),
                    state: change.current,
                    seq: change.seq,
                });
            entry.state = change.current;
            entry.seq = change.seq;
        } else {
            registry.tracked.remove(&change.replication_id);
        }
    }
}

impl ReplicationObserver for ActiveReplications {
    fn replication_changed(&self, replication: &Replication, change: &ReplicationChange) {
        self.apply(replication, change);
    }
}
