//! Tests for log entry encoding, decoding and verification
//!
//! These tests verify:
//! - Byte layout of encoded records
//! - Round-trip through encode/decode
//! - CRC-16 corruption detection
//! - Edge cases (truncation, empty key/value, flags)

use caskdb::log::{checksum, verify, Entry, Flags, Header, HEADER_SIZE};
use caskdb::CaskError;

// =============================================================================
// Layout Tests
// =============================================================================

#[test]
fn test_encoded_layout() {
    let entry = Entry::with_timestamp(b"key".to_vec(), b"value".to_vec(), 1_700_000_000).unwrap();
    let bytes = entry.encode();

    assert_eq!(bytes.len(), HEADER_SIZE + 3 + 5);
    assert_eq!(entry.size(), bytes.len() as u64);

    assert_eq!(&bytes[2..10], &1_700_000_000i64.to_le_bytes());
    assert_eq!(&bytes[10..14], &3u32.to_le_bytes());
    assert_eq!(&bytes[14..18], &5u32.to_le_bytes());
    assert_eq!(&bytes[18..20], &0u16.to_le_bytes());
    assert_eq!(&bytes[20..23], b"key");
    assert_eq!(&bytes[23..], b"value");

    let stored = u16::from_le_bytes([bytes[0], bytes[1]]);
    assert_eq!(stored, checksum(&bytes[2..]));
    assert_eq!(stored, entry.header().checksum);
}

#[test]
fn test_checksum_is_crc16_arc() {
    // Standard check value for CRC-16/ARC
    assert_eq!(checksum(b"123456789"), 0xBB3D);
    assert_eq!(checksum(b""), 0);
}

#[test]
fn test_header_encode_matches_entry_encode() {
    let entry = Entry::with_timestamp(b"k".to_vec(), b"v".to_vec(), 7).unwrap();
    let bytes = entry.encode();

    assert_eq!(&entry.header().encode()[..], &bytes[..HEADER_SIZE]);
}

// =============================================================================
// Round-Trip Tests
// =============================================================================

#[test]
fn test_encode_decode() {
    let entry = Entry::new(b"hello".to_vec(), b"babe".to_vec()).unwrap();

    let bytes = entry.encode();
    let decoded = Entry::decode(&bytes).unwrap();

    assert_eq!(decoded.key(), b"hello");
    assert_eq!(decoded.value(), b"babe");
    assert_eq!(decoded.header().timestamp, entry.header().timestamp);
    assert_eq!(decoded.header().flags, entry.header().flags);
    assert_eq!(decoded, entry);
}

#[test]
fn test_encode_decode_empty_key_and_value() {
    let entry = Entry::with_timestamp(Vec::<u8>::new(), Vec::<u8>::new(), 0).unwrap();

    let bytes = entry.encode();
    assert_eq!(bytes.len(), HEADER_SIZE);

    let decoded = Entry::decode(&bytes).unwrap();
    assert!(decoded.key().is_empty());
    assert!(decoded.value().is_empty());
    verify(&bytes).unwrap();
}

#[test]
fn test_decode_ignores_trailing_bytes() {
    let entry = Entry::with_timestamp(b"a".to_vec(), b"b".to_vec(), 1).unwrap();
    let mut bytes = entry.encode().to_vec();
    bytes.extend_from_slice(b"next record");

    let decoded = Entry::decode(&bytes).unwrap();
    assert_eq!(decoded.value(), b"b");
    verify(&bytes).unwrap();
}

#[test]
fn test_negative_timestamp_round_trips() {
    let entry = Entry::with_timestamp(b"old".to_vec(), b"days".to_vec(), -86_400).unwrap();
    let decoded = Entry::decode(&entry.encode()).unwrap();

    assert_eq!(decoded.header().timestamp, -86_400);
}

// =============================================================================
// Malformed Input Tests
// =============================================================================

#[test]
fn test_decode_header_too_short() {
    let result = Header::decode(&[0u8; HEADER_SIZE - 1]);

    assert!(matches!(
        result,
        Err(CaskError::MalformedHeader { expected: 20, actual: 19 })
    ));
}

#[test]
fn test_decode_truncated_body() {
    let entry = Entry::with_timestamp(b"key".to_vec(), b"value".to_vec(), 1).unwrap();
    let bytes = entry.encode();

    let result = Entry::decode(&bytes[..bytes.len() - 1]);
    assert!(matches!(
        result,
        Err(CaskError::MalformedHeader { expected: 28, actual: 27 })
    ));

    assert!(matches!(
        verify(&bytes[..bytes.len() - 1]),
        Err(CaskError::MalformedHeader { .. })
    ));
}

// =============================================================================
// CRC Corruption Detection Tests
// =============================================================================

#[test]
fn test_verify_clean_record() {
    let entry = Entry::new(b"key".to_vec(), b"value".to_vec()).unwrap();
    verify(&entry.encode()).unwrap();
}

#[test]
fn test_crc_corruption_in_value_detected() {
    let entry = Entry::new(b"key".to_vec(), b"value".to_vec()).unwrap();
    let mut bytes = entry.encode().to_vec();

    if let Some(byte) = bytes.last_mut() {
        *byte ^= 0xFF;
    }

    assert!(matches!(verify(&bytes), Err(CaskError::ChecksumMismatch { .. })));
}

#[test]
fn test_crc_corruption_in_stored_checksum_detected() {
    let entry = Entry::new(b"key".to_vec(), b"value".to_vec()).unwrap();
    let mut bytes = entry.encode().to_vec();
    bytes[0] ^= 0x01;

    match verify(&bytes) {
        Err(CaskError::ChecksumMismatch { want, got }) => {
            assert_eq!(want, entry.header().checksum);
            assert_eq!(got, entry.header().checksum ^ 0x01);
        }
        other => panic!("expected checksum mismatch, got {:?}", other),
    }
}

#[test]
fn test_every_single_byte_flip_detected() {
    let entry = Entry::with_timestamp(b"some-key".to_vec(), b"some-value".to_vec(), 12345).unwrap();
    let bytes = entry.encode();

    for i in 2..bytes.len() {
        let mut corrupted = bytes.to_vec();
        corrupted[i] ^= 0xFF;

        let result = verify(&corrupted);
        if (10..18).contains(&i) {
            // A flipped length field makes the record claim more bytes than exist
            assert!(result.is_err(), "flip at byte {} went unnoticed", i);
        } else {
            assert!(
                matches!(result, Err(CaskError::ChecksumMismatch { .. })),
                "flip at byte {} gave {:?}",
                i,
                result
            );
        }
    }
}

// =============================================================================
// Flags Tests
// =============================================================================

#[test]
fn test_flags_deleted_bit() {
    let mut flags = Flags::empty();
    assert!(!flags.contains(Flags::DELETED));

    flags.insert(Flags::DELETED);
    assert!(flags.contains(Flags::DELETED));
    assert_eq!(flags.bits(), 1);

    flags.remove(Flags::DELETED);
    assert!(!flags.contains(Flags::DELETED));

    flags.toggle(Flags::DELETED);
    assert!(flags.contains(Flags::DELETED));
    flags.toggle(Flags::DELETED);
    assert_eq!(flags, Flags::empty());
}

#[test]
fn test_unknown_flag_bits_preserved() {
    let entry = Entry::with_timestamp(b"k".to_vec(), b"v".to_vec(), 1)
        .unwrap()
        .with_flags(Flags::from_bits(0b1010_0000_0000_0001));

    let bytes = entry.encode();
    verify(&bytes).unwrap();

    let decoded = Entry::decode(&bytes).unwrap();
    assert_eq!(decoded.header().flags.bits(), 0b1010_0000_0000_0001);
    assert!(decoded.is_deleted());
}

#[test]
fn test_with_flags_reseals_checksum() {
    let live = Entry::with_timestamp(b"key".to_vec(), b"value".to_vec(), 5).unwrap();
    let deleted = live.clone().with_flags(Flags::DELETED);

    assert_ne!(live.header().checksum, deleted.header().checksum);
    assert_eq!(
        u16::from_le_bytes([deleted.encode()[0], deleted.encode()[1]]),
        deleted.header().checksum
    );
}

#[test]
fn test_encoded_lengths_match_header() {
    let entry = Entry::with_timestamp(b"abc".to_vec(), vec![7u8; 300], 9).unwrap();
    let bytes = entry.encode();

    assert_eq!(entry.header().key_size, 3);
    assert_eq!(entry.header().value_size, 300);
    assert_eq!(&bytes[10..14], &entry.header().key_size.to_le_bytes());
    assert_eq!(&bytes[14..18], &entry.header().value_size.to_le_bytes());
    assert_eq!(bytes.len() as u64, entry.header().entry_size());
}

#[test]
fn test_into_parts() {
    let entry = Entry::with_timestamp(b"key".to_vec(), b"value".to_vec(), 5).unwrap();

    assert_eq!(entry.clone().into_key(), b"key".to_vec());
    assert_eq!(entry.into_value(), b"value".to_vec());
}

// =============================================================================
// Display Tests
// =============================================================================

#[test]
fn test_display() {
    let entry = Entry::with_timestamp(b"hello".to_vec(), b"world".to_vec(), 42).unwrap();
    assert_eq!(entry.to_string(), "@1970-01-01T00:00:42Z, Key: |hello|, Value: |world|");
}

#[test]
fn test_display_recent_timestamp() {
    let entry = Entry::with_timestamp(b"Dire".to_vec(), b"Straits".to_vec(), 1_700_000_000).unwrap();
    assert_eq!(entry.to_string(), "@2023-11-14T22:13:20Z, Key: |Dire|, Value: |Straits|");
}

#[test]
fn test_display_out_of_range_timestamp() {
    let entry = Entry::with_timestamp(b"k".to_vec(), b"v".to_vec(), i64::MAX).unwrap();
    assert_eq!(entry.to_string(), format!("@{}, Key: |k|, Value: |v|", i64::MAX));
}
