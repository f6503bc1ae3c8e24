//! Log Module
//!
//! The single append-only data file and its record format.
//!
//! ## Responsibilities
//! - Encode/decode records with a CRC-16 checksum
//! - Append records at a single, serialized tail
//! - Offset-addressed reads that always verify the checksum
//! - In-place tombstoning of a record's header
//! - Sequential replay to rebuild the key index
//!
//! ## File Format
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │ Record 1                                                  │
//! │ ┌────────┬────────┬────────┬────────┬────────┬─────┬─────┐ │
//! │ │CRC (2) │ TS (8) │KLen (4)│VLen (4)│Flags(2)│ Key │ Val │ │
//! │ └────────┴────────┴────────┴────────┴────────┴─────┴─────┘ │
//! ├───────────────────────────────────────────────────────────┤
//! │ Record 2                                                  │
//! │   ...                                                     │
//! └───────────────────────────────────────────────────────────┘
//! ```
//! All integers are little-endian. The CRC covers bytes `[2, end)`.

mod entry;
mod data_file;
mod replay;

pub use entry::{checksum, verify, Entry, Flags, Header, HEADER_SIZE};
pub use data_file::DataFile;
pub use replay::{replay, LogReader, ReplayStats};
