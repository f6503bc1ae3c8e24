//! Log Replay
//!
//! Sequential scan of the data file used to rebuild the key index on open.
//!
//! A record that does not fully fit before the end of the file is a torn
//! write and ends the scan cleanly. A complete record whose checksum does not
//! match is corruption and aborts the scan. So does a short record with a
//! valid record somewhere after it: that is a damaged length field, not a
//! torn write, and treating it as one would discard the rest of the log.

use crate::error::{CaskError, Result};
use crate::keydir::{KeyDir, Location};

use super::entry::{self, Entry, HEADER_SIZE};
use super::DataFile;

/// Reads records from the start of a data file in append order
pub struct LogReader<'a> {
    file: &'a DataFile,

    /// Offset of the next record to read
    position: u64,

    /// File length when the reader was created
    end: u64,

    /// Set once an error has been yielded by the iterator
    failed: bool,
}

impl<'a> LogReader<'a> {
    /// Create a reader positioned at offset 0
    pub fn new(file: &'a DataFile) -> Result<Self> {
        let end = file.len()?;
        Ok(Self {
            file,
            position: 0,
            end,
            failed: false,
        })
    }

    /// Read the next record and its offset
    ///
    /// `Ok(None)` marks the end of the log.
    pub fn next_entry(&mut self) -> Result<Option<(u64, Entry)>> {
        let record = match self.file.read_raw(self.position, self.end)? {
            Some(record) => record,
            None => return Ok(None),
        };

        if let Err(e) = entry::verify(&record) {
            tracing::error!("Corrupt record at offset {}: {}", self.position, e);
            return Err(e);
        }

        let entry = Entry::decode(&record)?;
        let offset = self.position;
        self.position += entry.size();

        Ok(Some((offset, entry)))
    }

    /// Offset just past the last record read
    pub fn position(&self) -> u64 {
        self.position
    }

    /// File length when the reader was created
    pub fn end(&self) -> u64 {
        self.end
    }
}

impl Iterator for LogReader<'_> {
    type Item = Result<(u64, Entry)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.next_entry() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Outcome of a replay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Records read, live and tombstoned
    pub entries_read: u64,

    /// Records carrying the DELETED flag
    pub tombstones: u64,

    /// Keys in the index after replay
    pub live_keys: usize,

    /// Offset where the next append will land
    pub tail_offset: u64,

    /// Torn bytes past the tail, truncated by the next append
    pub torn_bytes: u64,
}

/// Rebuild `keydir` from `file` and fix the file's tail
///
/// Records are applied in append order: a live record upserts its key, a
/// tombstoned one removes it. The file itself is not modified.
pub fn replay(file: &DataFile, keydir: &KeyDir) -> Result<ReplayStats> {
    let mut reader = LogReader::new(file)?;
    let mut stats = ReplayStats::default();

    while let Some((offset, entry)) = reader.next_entry()? {
        stats.entries_read += 1;

        if entry.is_deleted() {
            stats.tombstones += 1;
            keydir.remove(entry.key());
            continue;
        }

        let header = entry.header();
        let location = Location::new(offset, header.value_size, header.timestamp);
        keydir.put(entry.into_key(), location);
    }

    stats.tail_offset = reader.position();
    if stats.tail_offset < reader.end() {
        if let Some(next) = find_record_after(file, stats.tail_offset, reader.end())? {
            tracing::error!(
                "Record at offset {} of {} overruns the log but a valid record follows at {}",
                stats.tail_offset,
                file.path().display(),
                next
            );
            return Err(CaskError::CorruptLength {
                offset: stats.tail_offset,
                next,
            });
        }
    }

    stats.torn_bytes = file.seal_tail(stats.tail_offset)?;
    stats.live_keys = keydir.len();

    if stats.torn_bytes > 0 {
        tracing::warn!(
            "Ignoring {} torn bytes at the end of {}",
            stats.torn_bytes,
            file.path().display()
        );
    }

    Ok(stats)
}

/// First offset in `(from, end)` where a whole record verifies
///
/// All-zero headers are skipped: zeroes verify trivially under CRC-16/ARC and
/// are what a preallocated but unwritten tail looks like.
fn find_record_after(file: &DataFile, from: u64, end: u64) -> Result<Option<u64>> {
    let span_len = usize::try_from(end - from).map_err(|_| {
        std::io::Error::new(std::io::ErrorKind::OutOfMemory, "torn tail exceeds address space")
    })?;
    let span = file.read_span(from, span_len)?;

    for start in 1..span.len() {
        let candidate = &span[start..];
        if candidate.len() < HEADER_SIZE {
            break;
        }
        if candidate[..HEADER_SIZE].iter().all(|&b| b == 0) {
            continue;
        }
        if entry::verify(candidate).is_ok() {
            return Ok(Some(from + start as u64));
        }
    }

    Ok(None)
}
