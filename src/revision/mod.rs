//! Revision module
//!
//! Per-document revision graphs:
//! - `RevisionId`: generation plus content digest, totally ordered
//! - `RevisionNode`: one immutable version (body or tombstone)
//! - `RevisionTree`: arena of nodes with derived leaves and winner
//!
//! The tree is a pure in-memory structure. Persistence, locking and
//! notification live in the database layer.

mod canonical;
mod errors;
mod node;
mod revision_id;
mod tree;

pub use canonical::{CanonicalJson, Canonicalizer, Properties, RESERVED_KEYS};
pub use errors::{RevisionError, RevisionResult};
pub use node::RevisionNode;
pub use revision_id::RevisionId;
pub use tree::{Detachment, InsertMode, Insertion, Pruning, RevisionTree};
