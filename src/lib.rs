//! # caskdb
//!
//! A single-file, append-only key-value store in the Bitcask style:
//! - Every write is appended to one log file
//! - Reads go through an in-memory index straight to the record's offset
//! - The index is rebuilt by replaying the log on open
//! - CRC-16 checksums on every record, verified on every read
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Engine                              │
//! │            (Single Writer / Multi Reader)                   │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  DataFile   │          │   KeyDir    │
//!   │  (Append)   │◄─offset──│  (RwLock)   │
//!   └──────┬──────┘          └─────────────┘
//!          │  replay on open        ▲
//!          └────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use caskdb::Engine;
//!
//! let engine = Engine::open_path("./demo.log", 0o600)?;
//! engine.put(b"hello", b"world")?;
//! assert_eq!(engine.get(b"hello")?, b"world".to_vec());
//! engine.delete(b"hello")?;
//! engine.close()?;
//! # Ok::<(), caskdb::CaskError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod log;
pub mod keydir;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CaskError, Result};
pub use config::{Config, SyncStrategy};
pub use engine::Engine;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of caskdb
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
