//! Listener identity
//!
//! Closures have no usable identity in Rust, so registration hands out a
//! `ListenerHandle` carrying a `ListenerId`. Add and remove are keyed on that
//! id, which makes both idempotent.

use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::event::ChangeEvent;

/// Receives change events.
pub trait ChangeListener: Send + Sync {
    fn on_change(&self, event: &ChangeEvent);
}

impl<F> ChangeListener for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &ChangeEvent) {
        self(event)
    }
}

/// Stable listener identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(Uuid);

impl ListenerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A listener plus its identity. Clones share the identity.
#[derive(Clone)]
pub struct ListenerHandle {
    id: ListenerId,
    listener: Arc<dyn ChangeListener>,
}

impl ListenerHandle {
    pub fn new(listener: impl ChangeListener + 'static) -> Self {
        Self {
            id: ListenerId::new(),
            listener: Arc::new(listener),
        }
    }

    pub fn from_arc(listener: Arc<dyn ChangeListener>) -> Self {
        Self {
            id: ListenerId::new(),
            listener,
        }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }

    pub(crate) fn deliver(&self, event: &ChangeEvent) {
        self.listener.on_change(event);
    }
}

impl fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerHandle").field("id", &self.id).finish()
    }
}

impl PartialEq for ListenerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ListenerHandle {}
