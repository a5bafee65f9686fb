//! ChangeNotifier - synchronous fan-out of change events
//!
//! Delivery rules:
//! - listeners run on the notifying thread, in registration order
//! - the listener list is snapshotted per event; changes made by a listener
//!   take effect from the next event
//! - a panicking listener is logged and skipped, the rest still run
//! - a listener that triggers another notify on the same thread does not
//!   recurse: the nested event is queued and delivered after the current one,
//!   before the outermost `notify` returns

use std::any::Any;
use std::collections::{HashMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::{self, ThreadId};

use super::event::ChangeEvent;
use super::listener::{ListenerHandle, ListenerId};
use crate::observability::{log_event_at, Event, Severity};

/// Outcome of one `notify` call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    /// Successful listener invocations
    pub delivered: usize,
    /// Listener invocations that panicked
    pub failed: usize,
    /// Events queued behind an in-flight dispatch on this thread
    pub deferred: usize,
}

impl DispatchReport {
    fn absorb(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.failed += other.failed;
        self.deferred += other.deferred;
    }
}

/// Registry of change listeners for one database.
#[derive(Debug, Default)]
pub struct ChangeNotifier {
    listeners: RwLock<Vec<ListenerHandle>>,
    dispatching: Mutex<HashMap<ThreadId, VecDeque<ChangeEvent>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handle`. Registering the same handle twice is a no-op.
    pub fn add_change_listener(&self, handle: ListenerHandle) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if !listeners.iter().any(|l| l.id() == handle.id()) {
            listeners.push(handle);
        }
    }

    /// Removes the listener with `id`. Unknown ids are ignored.
    pub fn remove_change_listener(&self, id: ListenerId) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        listeners.retain(|l| l.id() != id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .map(|l| l.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    /// Delivers `event` to every registered listener.
    ///
    /// Never fails. Called on a thread that is already delivering, the event
    /// is queued and the report counts it as deferred.
    pub fn notify(&self, event: ChangeEvent) -> DispatchReport {
        let me = thread::current().id();
        {
            let mut active = self.dispatching.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(queue) = active.get_mut(&me) {
                queue.push_back(event);
                return DispatchReport {
                    deferred: 1,
                    ..DispatchReport::default()
                };
            }
            active.insert(me, VecDeque::new());
        }
        let _guard = DispatchGuard {
            notifier: self,
            thread: me,
        };

        let mut report = DispatchReport::default();
        let mut next = Some(event);
        while let Some(event) = next {
            report.absorb(self.deliver(&event));
            next = self
                .dispatching
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .get_mut(&me)
                .and_then(VecDeque::pop_front);
        }
        report
    }

    fn deliver(&self, event: &ChangeEvent) -> DispatchReport {
        let snapshot: Vec<ListenerHandle> = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        let mut report = DispatchReport::default();
        for listener in &snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| listener.deliver(event))) {
                Ok(()) => report.delivered += 1,
                Err(payload) => {
                    report.failed += 1;
                    let reason = panic_message(payload.as_ref());
                    log_event_at(
                        Severity::Error,
                        Event::ListenerFailed,
                        &[
                            ("listener", &listener.id().to_string()),
                            ("sequence", &event.sequence.to_string()),
                            ("reason", &reason),
                        ],
                    );
                }
            }
        }

        log_event_at(
            Severity::Trace,
            Event::ChangeDispatched,
            &[
                ("sequence", &event.sequence.to_string()),
                ("changes", &event.changes.len().to_string()),
                ("delivered", &report.delivered.to_string()),
            ],
        );
        report
    }
}

/// Clears this thread's dispatch slot even if delivery unwinds.
struct DispatchGuard<'a> {
    notifier: &'a ChangeNotifier,
    thread: ThreadId,
}

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        self.notifier
            .dispatching
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.thread);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "listener panicked".to_string()
    }
}
