//! Error types for caskdb
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using CaskError
pub type Result<T> = std::result::Result<T, CaskError>;

/// Unified error type for caskdb operations
#[derive(Debug, Error)]
pub enum CaskError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Record Errors
    // -------------------------------------------------------------------------
    #[error("CRC16 check failed: expected {want:#06x}, got {got:#06x}")]
    ChecksumMismatch { want: u16, got: u16 },

    #[error("Malformed header: expected at least {expected} bytes, got {actual}")]
    MalformedHeader { expected: usize, actual: usize },

    #[error("Corrupt record at offset {offset}: runs past the end of the log, yet a valid record starts at {next}")]
    CorruptLength { offset: u64, next: u64 },

    #[error("Entry too large: {len} bytes does not fit a u32 length field")]
    EntryTooLarge { len: usize },

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    #[error("Key not found: {}", String::from_utf8_lossy(.0))]
    KeyNotFound(Vec<u8>),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CaskError {
    /// Whether this error means the key is absent (as opposed to a failure)
    pub fn is_not_found(&self) -> bool {
        matches!(self, CaskError::KeyNotFound(_))
    }
}
