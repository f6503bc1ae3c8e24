//! Data File
//!
//! Owns the append-only log file and its tail offset.
//!
//! ## Concurrency
//! - `tail`: Mutex. Every append goes through it, so it is the only place the
//!   tail moves and two appends can never interleave.
//! - `rewrite`: RwLock. Reads share it; `mark_deleted` takes it exclusively
//!   so no read can see a half-rewritten header.
//! - Appends only touch bytes at or past the tail, which no reader or
//!   tombstone rewrite addresses, so they skip `rewrite`.
//!
//! ## Torn Tails
//! Bytes found past the last whole record on open are left on disk until the
//! first append, which truncates them before writing. An open that never
//! writes leaves the file exactly as it found it.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};

use crate::config::SyncStrategy;
use crate::error::Result;

use super::entry::{self, Entry, Flags, Header, HEADER_SIZE};

/// Mutable append state, guarded by a single mutex
struct Tail {
    /// Position of the next append
    offset: u64,

    /// Writes since the last fsync
    uncommitted: usize,

    /// Bytes past `offset` still to be truncated before the next append
    torn: u64,
}

/// The single append-only log file
pub struct DataFile {
    path: PathBuf,
    file: File,
    tail: Mutex<Tail>,
    rewrite: RwLock<()>,
    sync_strategy: SyncStrategy,
}

impl DataFile {
    /// Open or create the log file in read/write mode
    ///
    /// `permissions` are Unix mode bits applied on creation. The tail starts
    /// at 0; call `seal_tail` once the end of the valid log is known.
    pub fn open(path: &Path, permissions: u32, sync_strategy: SyncStrategy) -> Result<Self> {
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(permissions);
        }
        #[cfg(not(unix))]
        let _ = permissions;

        Ok(Self::from_file(path, options.open(path)?, sync_strategy))
    }

    /// Open an existing log for inspection only
    ///
    /// Fails if the file does not exist. Appends and tombstones on the
    /// returned handle fail with an I/O error.
    pub fn open_read_only(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        Ok(Self::from_file(path, file, SyncStrategy::EveryWrite))
    }

    fn from_file(path: &Path, file: File, sync_strategy: SyncStrategy) -> Self {
        Self {
            path: path.to_path_buf(),
            file,
            tail: Mutex::new(Tail {
                offset: 0,
                uncommitted: 0,
                torn: 0,
            }),
            rewrite: RwLock::new(()),
            sync_strategy,
        }
    }

    /// Append an entry at the tail, returning the offset of its header
    pub fn append(&self, entry: &Entry) -> Result<u64> {
        let bytes = entry.encode();

        let mut tail = self.tail.lock();
        self.drop_torn_bytes(&mut tail)?;
        let offset = tail.offset;

        write_all_at(&self.file, &bytes, offset)?;
        tail.offset += bytes.len() as u64;

        tracing::trace!("Appended {} bytes at offset {}", bytes.len(), offset);

        self.record_write(&mut tail)?;
        Ok(offset)
    }

    /// Read and verify the entry whose header starts at `offset`
    pub fn read_at(&self, offset: u64) -> Result<Entry> {
        let _read_guard = self.rewrite.read();

        let (header, header_bytes) = self.read_header(offset)?;
        let record = self.read_record(offset, &header, header_bytes)?;

        entry::verify(&record)?;
        Entry::decode(&record)
    }

    /// Flag the record at `offset` as DELETED, rewriting only its header
    ///
    /// The key and value bytes stay where they are; the checksum is
    /// recomputed over the mutated header plus the existing body so the
    /// record still verifies. Marking an already deleted record is a no-op.
    pub fn mark_deleted(&self, offset: u64) -> Result<()> {
        let _write_guard = self.rewrite.write();

        let (mut header, header_bytes) = self.read_header(offset)?;
        let record = self.read_record(offset, &header, header_bytes)?;

        // Refuse to re-seal a record that is already damaged
        entry::verify(&record)?;

        if header.is_deleted() {
            return Ok(());
        }

        header.flags.insert(Flags::DELETED);
        header.checksum = header.checksum_with(&[&record[HEADER_SIZE..]]);
        write_all_at(&self.file, &header.encode(), offset)?;

        tracing::trace!("Tombstoned record at offset {}", offset);

        let mut tail = self.tail.lock();
        self.record_write(&mut tail)
    }

    /// Raw bytes of the record at `offset`, or `None` if it would extend past `end`
    ///
    /// Used by sequential scans, where a short record means the log ended.
    /// The checksum is not checked here.
    pub(crate) fn read_raw(&self, offset: u64, end: u64) -> Result<Option<Vec<u8>>> {
        let _read_guard = self.rewrite.read();

        if offset.saturating_add(HEADER_SIZE as u64) > end {
            return Ok(None);
        }
        let (header, header_bytes) = self.read_header(offset)?;

        if offset.saturating_add(header.entry_size()) > end {
            return Ok(None);
        }
        self.read_record(offset, &header, header_bytes).map(Some)
    }

    /// `len` bytes starting at `offset`, unverified
    pub(crate) fn read_span(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let _read_guard = self.rewrite.read();

        let mut bytes = vec![0u8; len];
        read_exact_at(&self.file, &mut bytes, offset)?;
        Ok(bytes)
    }

    /// Fix the tail after replay
    ///
    /// Returns the number of torn bytes past `offset`. They stay on disk
    /// until the next append truncates them.
    pub fn seal_tail(&self, offset: u64) -> Result<u64> {
        let mut tail = self.tail.lock();

        let len = self.file.metadata()?.len();
        tail.offset = offset;
        tail.torn = len.saturating_sub(offset);
        Ok(tail.torn)
    }

    /// Force an fsync of all written data
    pub fn sync(&self) -> Result<()> {
        let mut tail = self.tail.lock();
        self.file.sync_data()?;
        tail.uncommitted = 0;
        Ok(())
    }

    /// Position of the next append
    pub fn tail(&self) -> u64 {
        self.tail.lock().offset
    }

    /// Writes not yet covered by an fsync
    pub fn uncommitted_count(&self) -> usize {
        self.tail.lock().uncommitted
    }

    /// Current on-disk length of the file
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read_header(&self, offset: u64) -> Result<(Header, [u8; HEADER_SIZE])> {
        let mut bytes = [0u8; HEADER_SIZE];
        read_exact_at(&self.file, &mut bytes, offset)?;
        Ok((Header::decode(&bytes)?, bytes))
    }

    /// Read key and value following an already parsed header
    fn read_record(
        &self,
        offset: u64,
        header: &Header,
        header_bytes: [u8; HEADER_SIZE],
    ) -> Result<Vec<u8>> {
        let mut record = vec![0u8; HEADER_SIZE + header.body_len()];
        record[..HEADER_SIZE].copy_from_slice(&header_bytes);
        read_exact_at(&self.file, &mut record[HEADER_SIZE..], offset + HEADER_SIZE as u64)?;
        Ok(record)
    }

    /// Truncate bytes left past the tail by a torn write
    fn drop_torn_bytes(&self, tail: &mut Tail) -> Result<()> {
        if tail.torn == 0 {
            return Ok(());
        }

        self.file.set_len(tail.offset)?;
        self.file.sync_all()?;

        tracing::warn!(
            "Truncated {} torn bytes at offset {} of {}",
            tail.torn,
            tail.offset,
            self.path.display()
        );
        tail.torn = 0;
        Ok(())
    }

    /// Count a write and fsync if the strategy asks for it
    fn record_write(&self, tail: &mut Tail) -> Result<()> {
        tail.uncommitted += 1;

        let due = match self.sync_strategy {
            SyncStrategy::EveryWrite => true,
            SyncStrategy::EveryNEntries { count } => tail.uncommitted >= count,
        };
        if due {
            self.file.sync_data()?;
            tail.uncommitted = 0;
        }

        Ok(())
    }
}

// =============================================================================
// Positional I/O
// =============================================================================

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut std::mem::take(&mut buf)[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
