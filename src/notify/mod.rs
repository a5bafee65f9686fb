//! Change notification
//!
//! Listeners observe committed changes only. One event is produced per
//! committed unit of work: a single mutation outside a transaction, or the
//! whole outermost transaction. Rolled-back work produces nothing.

mod event;
mod listener;
mod notifier;

pub use event::{ChangeEvent, DocumentChange};
pub use listener::{ChangeListener, ListenerHandle, ListenerId};
pub use notifier::{ChangeNotifier, DispatchReport};
