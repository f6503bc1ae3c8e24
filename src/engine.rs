//! Engine Module
//!
//! The storage engine that coordinates the data file and the key index.
//!
//! ## Responsibilities
//! - Replay the log into a fresh KeyDir on open
//! - Append on put, tombstone on delete, keep the KeyDir in step
//! - Serve reads from the KeyDir + a verified file read
//! - Handle concurrent read/write access

use std::path::Path;

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::keydir::{KeyDir, Location};
use crate::log::{self, DataFile, Entry, ReplayStats};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - Order: write_lock → data file → keydir
///
/// - **Reads** (get): Concurrent
///   - No write_lock needed
///   - KeyDir uses an internal RwLock, released before any file I/O
///   - The data file blocks reads only while a header is being rewritten
///
/// Tombstones are written in place: deleting a key flips the DELETED bit in
/// the header of its current record instead of appending a marker record.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// The append-only log
    file: DataFile,

    /// Index of live keys (internal RwLock)
    keydir: KeyDir,

    /// Serializes write operations (put/delete)
    write_lock: Mutex<()>,

    /// What the opening replay found
    replay_stats: ReplayStats,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Open/create the data file
    /// 2. Replay every record into an empty KeyDir
    /// 3. Stop at a torn tail record (truncated by the first put), fail on a corrupt one
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let file = DataFile::open(&config.path, config.permissions, config.sync_strategy)?;
        let keydir = KeyDir::new();

        let replay_stats = log::replay(&file, &keydir)?;

        tracing::info!(
            "Opened {}: {} records replayed ({} tombstoned), {} live keys, tail at {}",
            config.path.display(),
            replay_stats.entries_read,
            replay_stats.tombstones,
            replay_stats.live_keys,
            replay_stats.tail_offset
        );

        Ok(Self {
            config,
            file,
            keydir,
            write_lock: Mutex::new(()),
            replay_stats,
        })
    }

    /// Open with a path and permission bits (convenience method)
    ///
    /// Uses the default config for everything else
    pub fn open_path(path: impl AsRef<Path>, permissions: u32) -> Result<Self> {
        let config = Config::builder()
            .path(path.as_ref())
            .permissions(permissions)
            .build();
        Self::open(config)
    }

    /// Get the value stored under `key`
    ///
    /// Fails with `KeyNotFound` if the key is absent.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let mut location = self.keydir.get(key)?;

        loop {
            let entry = self.file.read_at(location.offset)?;
            if !entry.is_deleted() {
                return Ok(entry.into_value());
            }

            // A writer tombstoned this record after we resolved it. Follow
            // the index if it has moved on, otherwise the key is gone.
            match self.keydir.get(key) {
                Ok(current) if current.offset != location.offset => location = current,
                _ => return Err(CaskError::KeyNotFound(key.to_vec())),
            }
        }
    }

    /// Put a key-value pair
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Append a fresh record
    /// 3. Point the KeyDir at it
    /// 4. Tombstone the superseded record (best effort)
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        let entry = Entry::new(key, value)?;
        let offset = self.file.append(&entry)?;

        tracing::debug!("put: appended {} bytes at offset {}", entry.size(), offset);

        let header = entry.header();
        let location = Location::new(offset, header.value_size, header.timestamp);
        let previous = self.keydir.put(entry.into_key(), location);

        // The new record already shadows the old one on replay, so a failure
        // here only leaves a stale live record behind.
        if let Some(old) = previous {
            if let Err(e) = self.file.mark_deleted(old.offset) {
                tracing::warn!(
                    "Failed to tombstone superseded record at offset {}: {}",
                    old.offset,
                    e
                );
            }
        }

        Ok(())
    }

    /// Delete a key
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Resolve the key (KeyNotFound if absent)
    /// 3. Tombstone its record on disk
    /// 4. Remove it from the KeyDir
    ///
    /// If step 3 fails the key stays indexed.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        let location = self.keydir.get(key)?;
        self.file.mark_deleted(location.offset)?;
        self.keydir.remove(key);

        tracing::debug!("delete: tombstoned record at offset {}", location.offset);

        Ok(())
    }

    /// Whether `key` currently has a live value
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.keydir.contains(key)
    }

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.keydir.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keydir.is_empty()
    }

    /// Sorted snapshot of the live keys
    pub fn keys(&self) -> Vec<Vec<u8>> {
        self.keydir.keys()
    }

    /// Force an fsync of the data file
    pub fn sync(&self) -> Result<()> {
        self.file.sync()
    }

    /// Close the engine gracefully
    ///
    /// Syncs the data file and releases it. Consumes the engine, so no
    /// operation can follow.
    pub fn close(self) -> Result<()> {
        {
            let _write_guard = self.write_lock.lock();
            self.file.sync()?;
        }

        tracing::info!(
            "Closed {} with {} live keys",
            self.config.path.display(),
            self.keydir.len()
        );

        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data file path
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Offset where the next record will be appended
    pub fn tail_offset(&self) -> u64 {
        self.file.tail()
    }

    /// Statistics from the replay performed on open
    pub fn replay_stats(&self) -> ReplayStats {
        self.replay_stats
    }
}
