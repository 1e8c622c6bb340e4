//! Huge-object retrieval records: the handoff boundary to the v2 B-tree.
//!
//! Indirectly-accessed huge objects carry only a B-tree key in their heap
//! ID; the v2 B-tree that maps keys to retrieval records is an external
//! collaborator. This module specifies the shape of that handoff: the four
//! huge-object record layouts stored in B-tree leaves, and the
//! [`HugeObjectIndex`] trait resolution goes through. Tree traversal itself
//! does not live in this crate.

use crate::error::FormatError;
use crate::fractal_heap::{read_sized, read_uint};

/// A huge object's retrieval record, as stored in the v2 B-tree.
///
/// `filter_mask` and `memory_size` are zero for non-filtered records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HugeObjectRecord {
    /// File address of the object.
    pub address: u64,
    /// Stored length of the object in bytes.
    pub length: u64,
    /// Filter mask (filtered records only).
    pub filter_mask: u32,
    /// De-filtered (memory) size in bytes (filtered records only).
    pub memory_size: u64,
}

impl HugeObjectRecord {
    /// Parse a directly-accessed huge object record (B-tree types 3 and 4):
    /// address, length, and for filtered records a filter mask and memory size.
    pub fn parse_direct(
        record: &[u8],
        filtered: bool,
        offset_size: u8,
        length_size: u8,
    ) -> Result<HugeObjectRecord, FormatError> {
        let (rec, _) = parse_record(record, filtered, offset_size, length_size)?;
        Ok(rec)
    }

    /// Parse an indirectly-accessed huge object record (B-tree types 1 and
    /// 2). These carry a trailing heap-ID key; returns `(record, key)`.
    pub fn parse_indirect(
        record: &[u8],
        filtered: bool,
        offset_size: u8,
        length_size: u8,
    ) -> Result<(HugeObjectRecord, u64), FormatError> {
        let (rec, pos) = parse_record(record, filtered, offset_size, length_size)?;
        let key = read_sized(record, pos, length_size)?;
        Ok((rec, key))
    }
}

fn parse_record(
    record: &[u8],
    filtered: bool,
    offset_size: u8,
    length_size: u8,
) -> Result<(HugeObjectRecord, usize), FormatError> {
    let os = offset_size as usize;
    let ls = length_size as usize;
    let address = read_sized(record, 0, offset_size)?;
    let length = read_sized(record, os, length_size)?;
    let mut pos = os + ls;
    let (filter_mask, memory_size) = if filtered {
        let mask = read_uint(record, pos, 4)? as u32;
        let mem = read_sized(record, pos + 4, length_size)?;
        pos += 4 + ls;
        (mask, mem)
    } else {
        (0, 0)
    };
    Ok((
        HugeObjectRecord {
            address,
            length,
            filter_mask,
            memory_size,
        },
        pos,
    ))
}

/// Lookup of huge-object retrieval records by B-tree key.
///
/// Implemented outside this crate by whatever walks the huge-object v2
/// B-tree; heaps whose IDs embed full records never call it.
pub trait HugeObjectIndex {
    /// Look up the record for a B-tree key; `Ok(None)` when absent.
    fn locate(&self, btree_key: u64) -> Result<Option<HugeObjectRecord>, FormatError>;
}

#[cfg(test)]
mod tests {
    #[cfg(not(feature = "std"))]
    use alloc::vec::Vec;

    use super::*;
    use crate::test_support::append_uint;

    #[test]
    fn direct_record_round_trip() {
        let mut rec = Vec::new();
        append_uint(&mut rec, 0x4000, 8);
        append_uint(&mut rec, 1234, 8);
        let parsed = HugeObjectRecord::parse_direct(&rec, false, 8, 8).unwrap();
        assert_eq!(parsed.address, 0x4000);
        assert_eq!(parsed.length, 1234);
        assert_eq!(parsed.filter_mask, 0);
        assert_eq!(parsed.memory_size, 0);
    }

    #[test]
    fn filtered_direct_record() {
        let mut rec = Vec::new();
        append_uint(&mut rec, 0x4000, 8);
        append_uint(&mut rec, 600, 8);
        append_uint(&mut rec, 0x3, 4);
        append_uint(&mut rec, 2048, 8);
        let parsed = HugeObjectRecord::parse_direct(&rec, true, 8, 8).unwrap();
        assert_eq!(parsed.filter_mask, 0x3);
        assert_eq!(parsed.memory_size, 2048);
    }

    #[test]
    fn indirect_record_carries_key() {
        let mut rec = Vec::new();
        append_uint(&mut rec, 0x9000, 8);
        append_uint(&mut rec, 77, 8);
        append_uint(&mut rec, 5, 8); // heap-ID key
        let (parsed, key) = HugeObjectRecord::parse_indirect(&rec, false, 8, 8).unwrap();
        assert_eq!(parsed.address, 0x9000);
        assert_eq!(parsed.length, 77);
        assert_eq!(key, 5);
    }

    #[test]
    fn truncated_record_is_eof() {
        let mut rec = Vec::new();
        append_uint(&mut rec, 0x9000, 8);
        let err = HugeObjectRecord::parse_direct(&rec, false, 8, 8).unwrap_err();
        assert!(matches!(err, FormatError::UnexpectedEof { .. }));
    }
}
