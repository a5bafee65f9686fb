//! Replication lifecycle tracking
//!
//! The replication protocol itself is external. This module models what the
//! database needs from it:
//! - `ReplicationState`: the NotStarted → Active ↔ Idle → Stopped machine
//! - `Replication`: a handle that emits state changes synchronously
//! - `ActiveReplications`: the database's registry, fed by those changes

mod errors;
mod registry;
#[allow(clippy::module_inception)]
mod replication;
mod state;

pub use errors::{ReplicationError, ReplicationErrorKind, ReplicationResult};
pub use registry::ActiveReplications;
pub use replication::{Replication, ReplicationChange};
pub use state::{Direction, ReplicationState};

pub(crate) use replication::ReplicationObserver;
