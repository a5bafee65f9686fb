//! Single-writer gate
//!
//! At most one unit of work mutates a database at a time. The gate records
//! the owning thread so that a second database-level write from that same
//! thread fails fast instead of waiting on itself.

use std::sync::{Condvar, Mutex, PoisonError};
use std::thread::{self, ThreadId};

use crate::database::{DatabaseError, DatabaseResult};

#[derive(Debug, Default)]
pub(crate) struct WriterGate {
    owner: Mutex<Option<ThreadId>>,
    released: Condvar,
}

impl WriterGate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Blocks until the gate is free, then takes it.
    ///
    /// Returns `TransactionInProgress` if the calling thread already holds it.
    pub(crate) fn acquire(&self) -> DatabaseResult<GateGuard<'_>> {
        let me = thread::current().id();
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match *owner {
                None => {
                    *owner = Some(me);
                    return Ok(GateGuard { gate: self });
                }
                Some(holder) if holder == me => return Err(DatabaseError::TransactionInProgress),
                Some(_) => {
                    owner = self
                        .released
                        .wait(owner)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    /// True if the calling thread holds the gate.
    pub(crate) fn held_by_current_thread(&self) -> bool {
        let owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        *owner == Some(thread::current().id())
    }

    fn release(&self) {
        let mut owner = self.owner.lock().unwrap_or_else(PoisonError::into_inner);
        *owner = None;
        self.released.notify_one();
    }
}

/// Holds the gate until dropped.
#[derive(Debug)]
pub(crate) struct GateGuard<'a> {
    gate: &'a WriterGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_same_thread_reacquire_fails() {
        let gate = WriterGate::new();
        let _held = gate.acquire().unwrap();
        assert!(gate.held_by_current_thread());
        assert!(matches!(gate.acquire(), Err(DatabaseError::TransactionInProgress)));
    }

    #[test]
    fn test_release_on_drop() {
        let gate = WriterGate::new();
        drop(gate.acquire().unwrap());
        assert!(!gate.held_by_current_thread());
        assert!(gate.acquire().is_ok());
    }

    #[test]
    fn test_other_thread_waits() {
        let gate = Arc::new(WriterGate::new());
        let entered = Arc::new(AtomicBool::new(false));
        let held = gate.acquire().unwrap();

        let g = gate.clone();
        let e = entered.clone();
        let waiter = std::thread::spawn(move || {
            let _guard = g.acquire().unwrap();
            e.store(true, Ordering::SeqCst);
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst));
        drop(held);
        waiter.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }
}
