//! aerolite - an embedded multi-version document store
//!
//! Documents are trees of immutable revisions. Concurrent edits branch the
//! tree; a deterministic rule picks the winning revision on every replica.
//!
//! - `revision`: revision ids, nodes and trees
//! - `store`: persistence collaborator (memory or checksummed file)
//! - `transaction`: writer gate, undo journal, nested scopes
//! - `notify`: change listeners and dispatch
//! - `compaction`: bounded history
//! - `replication`: replication lifecycle and the active set
//! - `database`: the facade tying them together
//!
//! ```ignore
//! use aerolite::{Database, DatabaseConfig};
//!
//! let db = Database::open(DatabaseConfig::in_memory("inventory"))?;
//! db.run_in_transaction(|txn| {
//!     txn.put_properties("sku-1", props)?;
//!     txn.put_properties("sku-2", more)?;
//!     Ok(true)
//! })?;
//! ```

pub mod cli;
pub mod compaction;
pub mod database;
pub mod notify;
pub mod observability;
pub mod replication;
pub mod revision;
pub mod store;
pub mod transaction;

pub use database::{Database, DatabaseConfig, DatabaseError, DatabaseResult, Document};
