//! Compaction
//!
//! Bounds revision history per document. Runs alongside reads and alongside
//! writes to other documents; never emits change events.

mod engine;

pub use engine::{CompactionEngine, CompactionReport};
