//! Log entry definitions
//!
//! Defines the fixed record header, the DELETED flag bitmask, and the
//! encode/decode/verify codec for individual log records.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use chrono::{DateTime, SecondsFormat};
use crc::{Crc, CRC_16_ARC};

use crate::error::{CaskError, Result};

/// Fixed header size: Checksum (2) + Timestamp (8) + KeyLen (4) + ValLen (4) + Flags (2)
pub const HEADER_SIZE: usize = 20;

/// Width of the checksum field at the start of every record
const CHECKSUM_SIZE: usize = 2;

/// CRC-16/ARC (IBM polynomial, reflected, zero init)
static CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Compute the CRC-16/ARC checksum of a byte region
pub fn checksum(region: &[u8]) -> u16 {
    CRC16.checksum(region)
}

// =============================================================================
// Flags
// =============================================================================

/// 16-bit record flag bitmask
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Flags(u16);

impl Flags {
    /// The record has been logically deleted
    pub const DELETED: Flags = Flags(1 << 0);

    pub const fn empty() -> Self {
        Flags(0)
    }

    /// Wrap raw bits as read from disk (unknown bits are kept)
    pub const fn from_bits(bits: u16) -> Self {
        Flags(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// True if any bit of `flag` is set
    pub fn contains(self, flag: Flags) -> bool {
        self.0 & flag.0 != 0
    }

    pub fn insert(&mut self, flag: Flags) {
        self.0 |= flag.0;
    }

    pub fn remove(&mut self, flag: Flags) {
        self.0 &= !flag.0;
    }

    pub fn toggle(&mut self, flag: Flags) {
        self.0 ^= flag.0;
    }
}

// =============================================================================
// Header
// =============================================================================

/// The fixed 20-byte record header
///
/// ```text
/// ┌──────────┬─────────────┬─────────┬─────────┬─────────┐
/// │ CRC (2)  │Timestamp (8)│KeyLen(4)│ValLen(4)│Flags (2)│
/// └──────────┴─────────────┴─────────┴─────────┴─────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// CRC-16/ARC over every byte after this field
    pub checksum: u16,

    /// Creation time (unix seconds)
    pub timestamp: i64,

    pub key_size: u32,
    pub value_size: u32,
    pub flags: Flags,
}

impl Header {
    /// Parse the five header fields from the start of `bytes`
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(CaskError::MalformedHeader {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = &bytes[..HEADER_SIZE];
        Ok(Self {
            checksum: buf.get_u16_le(),
            timestamp: buf.get_i64_le(),
            key_size: buf.get_u32_le(),
            value_size: buf.get_u32_le(),
            flags: Flags::from_bits(buf.get_u16_le()),
        })
    }

    /// Lay the header out in its on-disk form
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u16_le(self.checksum);
        buf.put_i64_le(self.timestamp);
        buf.put_u32_le(self.key_size);
        buf.put_u32_le(self.value_size);
        buf.put_u16_le(self.flags.bits());
        out
    }

    /// Checksum of this header's post-checksum bytes followed by `body`
    ///
    /// `body` is the key and value bytes, either contiguous or as two parts.
    pub fn checksum_with(&self, body: &[&[u8]]) -> u16 {
        let encoded = self.encode();
        let mut digest = CRC16.digest();
        digest.update(&encoded[CHECKSUM_SIZE..]);
        for part in body {
            digest.update(part);
        }
        digest.finalize()
    }

    /// Total record size: header + key + value
    pub fn entry_size(&self) -> u64 {
        HEADER_SIZE as u64 + self.key_size as u64 + self.value_size as u64
    }

    /// Number of key + value bytes following the header
    pub fn body_len(&self) -> usize {
        self.key_size as usize + self.value_size as usize
    }

    pub fn is_deleted(&self) -> bool {
        self.flags.contains(Flags::DELETED)
    }
}

// =============================================================================
// Entry
// =============================================================================

/// A single physical record in the log
///
/// Only built through `with_timestamp` or `decode`, so the header lengths
/// always match the key and value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    header: Header,
    key: Vec<u8>,
    value: Vec<u8>,
}

impl Entry {
    /// Create a live entry stamped with the current time
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Result<Self> {
        Self::with_timestamp(key, value, unix_now())
    }

    /// Create a live entry with an explicit timestamp
    pub fn with_timestamp(
        key: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
        timestamp: i64,
    ) -> Result<Self> {
        let key = key.into();
        let value = value.into();

        let key_size = u32::try_from(key.len())
            .map_err(|_| CaskError::EntryTooLarge { len: key.len() })?;
        let value_size = u32::try_from(value.len())
            .map_err(|_| CaskError::EntryTooLarge { len: value.len() })?;

        let mut header = Header {
            checksum: 0,
            timestamp,
            key_size,
            value_size,
            flags: Flags::empty(),
        };
        header.checksum = header.checksum_with(&[key.as_slice(), value.as_slice()]);

        Ok(Self { header, key, value })
    }

    /// Replace the flag bits, resealing the checksum
    pub fn with_flags(mut self, flags: Flags) -> Self {
        self.header.flags = flags;
        self.header.checksum = self
            .header
            .checksum_with(&[self.key.as_slice(), self.value.as_slice()]);
        self
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn into_key(self) -> Vec<u8> {
        self.key
    }

    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    /// Total encoded size in bytes
    pub fn size(&self) -> u64 {
        self.header.entry_size()
    }

    pub fn is_deleted(&self) -> bool {
        self.header.is_deleted()
    }

    /// Serialize to the on-disk layout, computing a fresh checksum
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE + self.header.body_len());
        buf.put_u16_le(0); // checksum placeholder
        buf.put_i64_le(self.header.timestamp);
        buf.put_u32_le(self.header.key_size);
        buf.put_u32_le(self.header.value_size);
        buf.put_u16_le(self.header.flags.bits());
        buf.put_slice(&self.key);
        buf.put_slice(&self.value);

        let crc = checksum(&buf[CHECKSUM_SIZE..]);
        buf[..CHECKSUM_SIZE].copy_from_slice(&crc.to_le_bytes());

        buf.freeze()
    }

    /// Parse a record from `bytes` without checking its checksum
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = Header::decode(bytes)?;

        let key_end = HEADER_SIZE + header.key_size as usize;
        let value_end = key_end + header.value_size as usize;
        if bytes.len() < value_end {
            return Err(CaskError::MalformedHeader {
                expected: value_end,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            header,
            key: bytes[HEADER_SIZE..key_end].to_vec(),
            value: bytes[key_end..value_end].to_vec(),
        })
    }
}

/// `@<RFC3339 UTC time>, Key: |<key>|, Value: |<value>|`
///
/// Timestamps outside chrono's range print as raw seconds.
impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let timestamp = match DateTime::from_timestamp(self.header.timestamp, 0) {
            Some(time) => time.to_rfc3339_opts(SecondsFormat::Secs, true),
            None => self.header.timestamp.to_string(),
        };
        write!(
            f,
            "@{}, Key: |{}|, Value: |{}|",
            timestamp,
            String::from_utf8_lossy(&self.key),
            String::from_utf8_lossy(&self.value)
        )
    }
}

/// Check the stored checksum of the record at the start of `bytes`
///
/// The checksum covers the timestamp through the last value byte; `want` is
/// the recomputed value, `got` the one stored in the header.
pub fn verify(bytes: &[u8]) -> Result<()> {
    let header = Header::decode(bytes)?;

    let end = HEADER_SIZE + header.body_len();
    if bytes.len() < end {
        return Err(CaskError::MalformedHeader {
            expected: end,
            actual: bytes.len(),
        });
    }

    let want = checksum(&bytes[CHECKSUM_SIZE..end]);
    let got = header.checksum;
    if want != got {
        return Err(CaskError::ChecksumMismatch { want, got });
    }

    Ok(())
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
