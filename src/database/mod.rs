//! Database facade
//!
//! Ties revision trees, storage, transactions, notification, compaction and
//! replication tracking together behind `Database`.

mod config;
#[allow(clippy::module_inception)]
mod database;
mod document;
mod errors;

pub use config::{database_name_from_path, DatabaseConfig, DEFAULT_MAX_REV_TREE_DEPTH};
pub use database::Database;
pub use document::Document;
pub use errors::{DatabaseError, DatabaseResult};

pub(crate) use config::validate_max_rev_tree_depth;
