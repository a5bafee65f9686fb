//! Transactions
//!
//! - `WriterGate`: one open unit of work per database
//! - `UndoJournal`: reversible record of structural changes
//! - `Transaction`: the handle a unit of work mutates through
//!
//! Only the outermost scope commits. Nested scopes are savepoints.

mod gate;
mod handle;
mod journal;

pub use handle::Transaction;

pub(crate) use gate::WriterGate;
pub(crate) use journal::{UndoEntry, UndoJournal};
