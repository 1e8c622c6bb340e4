//! Fractal heap block parsing: indirect index blocks ("FHIB") and direct
//! data blocks ("FHDB").
//!
//! Block kind is a variant relationship decided by the doubling-table row an
//! entry sits in, not a type hierarchy: rows whose block size is at most the
//! maximum direct block size hold direct blocks, deeper rows hold further
//! indirect blocks.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use byteorder::{ByteOrder, LittleEndian};

use crate::checksum;
use crate::error::FormatError;
use crate::fractal_heap::{ensure_len, read_sized, read_uint, FractalHeapHeader};

/// Filtered size and mask attached to a direct-block entry when the heap
/// has I/O filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilteredDirectBlock {
    /// Size of the filtered direct block in the file.
    pub size: u64,
    /// Filter mask recording which filters were skipped.
    pub filter_mask: u32,
}

/// One direct-block entry of an indirect block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectEntry {
    /// Child direct block address (undefined sentinel = not allocated).
    pub address: u64,
    /// Present when the heap has I/O filters configured.
    pub filter: Option<FilteredDirectBlock>,
}

/// Parsed fractal heap indirect block (signature "FHIB").
///
/// Entries appear in doubling-table row-major order: entry `i` sits at
/// row `i / width`, column `i % width`.
#[derive(Debug, Clone)]
pub struct IndirectBlock {
    /// File address this block was parsed at.
    pub address: u64,
    /// Offset of this block in the heap's linear address space.
    pub block_offset: u64,
    /// Number of rows this block holds.
    pub nrows: u16,
    /// K direct-block entries (rows up to the maximum direct rows).
    pub direct_entries: Vec<DirectEntry>,
    /// N indirect-block child addresses (deeper rows).
    pub indirect_entries: Vec<u64>,
}

impl IndirectBlock {
    /// Parse an indirect block with `nrows` rows at the given offset.
    ///
    /// `nrows` is the header's current row count for the root block and the
    /// doubling-table row count of the represented block size for any other
    /// indirect block. The trailing checksum is verified when the header
    /// enables block checksums.
    pub fn parse(
        file_data: &[u8],
        offset: usize,
        header: &FractalHeapHeader,
        nrows: u16,
        offset_size: u8,
        length_size: u8,
    ) -> Result<IndirectBlock, FormatError> {
        ensure_len(file_data, offset, 5)?;
        if &file_data[offset..offset + 4] != b"FHIB" {
            return Err(FormatError::InvalidIndirectBlockSignature);
        }
        let version = file_data[offset + 4];
        if version != 0 {
            return Err(FormatError::UnsupportedIndirectBlockVersion(version));
        }

        let mut pos = offset + 5;
        let back_ref = read_sized(file_data, pos, offset_size)?;
        pos += offset_size as usize;
        if back_ref != header.address {
            return Err(FormatError::HeapHeaderMismatch {
                expected: header.address,
                actual: back_ref,
            });
        }

        let offset_width = header.heap_offset_width();
        let block_offset = read_uint(file_data, pos, offset_width)?;
        pos += offset_width;

        let table = header.doubling_table();
        let k = table.direct_entry_count(nrows);
        let n = table.indirect_entry_count(nrows);

        let mut direct_entries = Vec::with_capacity(k);
        for _ in 0..k {
            let address = read_sized(file_data, pos, offset_size)?;
            pos += offset_size as usize;
            let filter = if header.filters_present() {
                let size = read_sized(file_data, pos, length_size)?;
                pos += length_size as usize;
                ensure_len(file_data, pos, 4)?;
                let filter_mask = LittleEndian::read_u32(&file_data[pos..pos + 4]);
                pos += 4;
                Some(FilteredDirectBlock { size, filter_mask })
            } else {
                None
            };
            direct_entries.push(DirectEntry { address, filter });
        }

        let mut indirect_entries = Vec::with_capacity(n);
        for _ in 0..n {
            let address = read_sized(file_data, pos, offset_size)?;
            pos += offset_size as usize;
            indirect_entries.push(address);
        }

        if header.checksum_direct_blocks() {
            ensure_len(file_data, pos, 4)?;
            let stored = LittleEndian::read_u32(&file_data[pos..pos + 4]);
            checksum::verify(&file_data[offset..pos], stored)?;
        }

        Ok(IndirectBlock {
            address: offset as u64,
            block_offset,
            nrows,
            direct_entries,
            indirect_entries,
        })
    }
}

/// Parsed fractal heap direct block (signature "FHDB").
///
/// A terminal node: everything past the fixed header (and before the
/// optional trailing checksum) is raw object data addressed by managed
/// heap IDs.
#[derive(Debug, Clone, Copy)]
pub struct DirectBlock {
    /// File address this block was parsed at.
    pub address: u64,
    /// Offset of this block in the heap's linear address space.
    pub block_offset: u64,
    /// Allocated size of the block, from the doubling table.
    pub block_size: u64,
    /// Absolute file position of the object-data region.
    pub data_start: usize,
    /// Length of the object-data region in bytes.
    pub data_len: usize,
}

impl DirectBlock {
    /// Parse a direct block of `block_size` bytes at the given offset.
    pub fn parse(
        file_data: &[u8],
        offset: usize,
        header: &FractalHeapHeader,
        block_size: u64,
        offset_size: u8,
    ) -> Result<DirectBlock, FormatError> {
        let size = block_size as usize;
        ensure_len(file_data, offset, size)?;
        if &file_data[offset..offset + 4] != b"FHDB" {
            return Err(FormatError::InvalidDirectBlockSignature);
        }
        let version = file_data[offset + 4];
        if version != 0 {
            return Err(FormatError::UnsupportedDirectBlockVersion(version));
        }

        let mut pos = offset + 5;
        let back_ref = read_sized(file_data, pos, offset_size)?;
        pos += offset_size as usize;
        if back_ref != header.address {
            return Err(FormatError::HeapHeaderMismatch {
                expected: header.address,
                actual: back_ref,
            });
        }

        let offset_width = header.heap_offset_width();
        let block_offset = read_uint(file_data, pos, offset_width)?;
        pos += offset_width;

        let trailer = if header.checksum_direct_blocks() { 4 } else { 0 };
        if offset + size < pos + trailer {
            return Err(FormatError::UnexpectedEof {
                expected: pos + trailer,
                available: offset + size,
            });
        }

        let mut data_end = offset + size;
        if header.checksum_direct_blocks() {
            // 4-byte checksum trailer, computed over the rest of the block.
            let stored = LittleEndian::read_u32(&file_data[data_end - 4..data_end]);
            checksum::verify(&file_data[offset..data_end - 4], stored)?;
            data_end -= 4;
        }

        Ok(DirectBlock {
            address: offset as u64,
            block_offset,
            block_size,
            data_start: pos,
            data_len: data_end - pos,
        })
    }

    /// Slice an object out of this block's data region.
    ///
    /// `heap_offset` is relative to the heap's linear address space, which
    /// counts block headers; it is translated into this block via the
    /// block's own offset.
    pub fn object_bytes(
        &self,
        file_data: &[u8],
        heap_offset: u64,
        length: u64,
    ) -> Result<Vec<u8>, FormatError> {
        let out_of_bounds = FormatError::ObjectOutOfBounds {
            heap_offset,
            length,
        };
        let local = heap_offset
            .checked_sub(self.block_offset)
            .ok_or(out_of_bounds.clone())?;
        let start = self.address as usize + local as usize;
        let end = start + length as usize;
        if start < self.data_start || end > self.data_start + self.data_len {
            return Err(out_of_bounds);
        }
        Ok(file_data[start..end].to_vec())
    }
}
