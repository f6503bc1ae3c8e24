//! KeyDir Module
//!
//! In-memory index from each live key to the position of its latest record.
//!
//! ## Responsibilities
//! - Fast point lookups without touching the disk
//! - Single-writer/multi-reader access pattern
//! - Rebuilt from the log on every open, never persisted
//!
//! ## Data Structure Choice
//! HashMap wrapped in RwLock:
//! - Point lookups only, no ordering needed on the hot path
//! - `keys()` sorts a snapshot when callers want order

mod table;

pub use table::KeyDir;

/// Where the latest live record of a key lives in the data file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Offset of the record header
    pub offset: u64,

    /// Length of the value in bytes
    pub value_size: u32,

    /// Record timestamp (unix seconds)
    pub timestamp: i64,
}

impl Location {
    pub fn new(offset: u64, value_size: u32, timestamp: i64) -> Self {
        Self {
            offset,
            value_size,
            timestamp,
        }
    }
}
