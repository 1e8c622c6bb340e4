//! Builders for synthetic fractal heaps used across the unit tests.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use byteorder::{ByteOrder, LittleEndian};

use crate::checksum::jenkins_lookup3;
use crate::fractal_heap::{FractalHeapHeader, FLAG_CHECKSUM_DIRECT_BLOCKS};

/// Parameters for a synthetic heap.
#[derive(Debug, Clone)]
pub struct HeapParams {
    pub offset_size: u8,
    pub length_size: u8,
    pub heap_id_length: u16,
    pub table_width: u16,
    pub starting_block_size: u64,
    pub max_direct_block_size: u64,
    pub max_managed_object_size: u32,
    pub max_heap_size: u16,
    pub checksum_blocks: bool,
    pub filter_info: Option<Vec<u8>>,
    pub undefined_root: bool,
}

impl Default for HeapParams {
    fn default() -> Self {
        HeapParams {
            offset_size: 8,
            length_size: 8,
            heap_id_length: 7,
            table_width: 4,
            starting_block_size: 256,
            max_direct_block_size: 1024,
            max_managed_object_size: 512,
            max_heap_size: 16,
            checksum_blocks: false,
            filter_info: None,
            undefined_root: false,
        }
    }
}

/// A built heap: the file bytes, the header offset, and the
/// (heap offset, data) pairs of the objects stored in it.
pub struct SyntheticHeap {
    pub file: Vec<u8>,
    pub header_offset: usize,
    pub objects: Vec<(u64, Vec<u8>)>,
}

pub fn append_uint(buf: &mut Vec<u8>, val: u64, width: usize) {
    let mut tmp = [0u8; 8];
    LittleEndian::write_uint(&mut tmp, val, width);
    buf.extend_from_slice(&tmp[..width]);
}

pub fn undefined_addr(offset_size: u8) -> u64 {
    u64::MAX >> (64 - 8 * offset_size as u32)
}

fn build_header(
    p: &HeapParams,
    root_addr: u64,
    current_rows: u16,
    allocated_managed_space: u64,
    managed_count: u64,
) -> Vec<u8> {
    let os = p.offset_size as usize;
    let ls = p.length_size as usize;
    let filter_len = p.filter_info.as_ref().map_or(0, |f| f.len()) as u16;
    let flags = if p.checksum_blocks {
        FLAG_CHECKSUM_DIRECT_BLOCKS
    } else {
        0
    };

    let mut buf = Vec::new();
    buf.extend_from_slice(b"FRHP");
    buf.push(0); // version
    buf.extend_from_slice(&p.heap_id_length.to_le_bytes());
    buf.extend_from_slice(&filter_len.to_le_bytes());
    buf.push(flags);
    buf.extend_from_slice(&p.max_managed_object_size.to_le_bytes());
    append_uint(&mut buf, 0, ls); // next huge object id
    append_uint(&mut buf, undefined_addr(p.offset_size), os); // huge btree
    append_uint(&mut buf, 0, ls); // managed free space
    append_uint(&mut buf, undefined_addr(p.offset_size), os); // free space mgr
    append_uint(&mut buf, allocated_managed_space, ls); // managed space
    append_uint(&mut buf, allocated_managed_space, ls); // allocated managed space
    append_uint(&mut buf, 0, ls); // direct block iterator offset
    append_uint(&mut buf, managed_count, ls);
    append_uint(&mut buf, 0, ls); // huge size
    append_uint(&mut buf, 0, ls); // huge count
    append_uint(&mut buf, 0, ls); // tiny size
    append_uint(&mut buf, 0, ls); // tiny count
    buf.extend_from_slice(&p.table_width.to_le_bytes());
    append_uint(&mut buf, p.starting_block_size, ls);
    append_uint(&mut buf, p.max_direct_block_size, ls);
    buf.extend_from_slice(&p.max_heap_size.to_le_bytes());
    buf.extend_from_slice(&2u16.to_le_bytes()); // starting rows in root
    append_uint(&mut buf, root_addr, os);
    buf.extend_from_slice(&current_rows.to_le_bytes());
    if let Some(info) = &p.filter_info {
        append_uint(&mut buf, p.starting_block_size, ls); // filtered root size
        buf.extend_from_slice(&0u32.to_le_bytes()); // filter mask
        buf.extend_from_slice(info);
    }
    let sum = jenkins_lookup3(&buf);
    buf.extend_from_slice(&sum.to_le_bytes());
    buf
}

fn offset_width(p: &HeapParams) -> usize {
    (p.max_heap_size as usize).div_ceil(8)
}

/// Write a direct block of `block_size` bytes into `file` at `addr`.
fn place_direct_block(
    file: &mut [u8],
    p: &HeapParams,
    header_addr: u64,
    addr: usize,
    block_offset: u64,
    block_size: usize,
    objects: &[(usize, &[u8])],
) {
    let mut buf = Vec::with_capacity(block_size);
    buf.extend_from_slice(b"FHDB");
    buf.push(0); // version
    append_uint(&mut buf, header_addr, p.offset_size as usize);
    append_uint(&mut buf, block_offset, offset_width(p));
    buf.resize(block_size, 0);
    for (local, data) in objects {
        buf[*local..*local + data.len()].copy_from_slice(data);
    }
    if p.checksum_blocks {
        let sum = jenkins_lookup3(&buf[..block_size - 4]);
        buf[block_size - 4..].copy_from_slice(&sum.to_le_bytes());
    }
    file[addr..addr + block_size].copy_from_slice(&buf);
}

/// Write an indirect block into `file` at `addr`. `entries` maps entry
/// index to child address; all other entries are undefined.
fn place_indirect_block(
    file: &mut [u8],
    p: &HeapParams,
    header_addr: u64,
    addr: usize,
    block_offset: u64,
    k: usize,
    n: usize,
    entries: &[(usize, u64)],
) {
    let os = p.offset_size as usize;
    let ls = p.length_size as usize;
    let mut buf = Vec::new();
    buf.extend_from_slice(b"FHIB");
    buf.push(0); // version
    append_uint(&mut buf, header_addr, os);
    append_uint(&mut buf, block_offset, offset_width(p));
    for i in 0..k {
        let child = entries
            .iter()
            .find(|(idx, _)| *idx == i)
            .map_or(undefined_addr(p.offset_size), |(_, a)| *a);
        append_uint(&mut buf, child, os);
        if p.filter_info.is_some() {
            append_uint(&mut buf, 0, ls); // filtered size
            buf.extend_from_slice(&0u32.to_le_bytes()); // filter mask
        }
    }
    for i in 0..n {
        let child = entries
            .iter()
            .find(|(idx, _)| *idx == k + i)
            .map_or(undefined_addr(p.offset_size), |(_, a)| *a);
        append_uint(&mut buf, child, os);
    }
    if p.checksum_blocks {
        let sum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&sum.to_le_bytes());
    }
    file[addr..addr + buf.len()].copy_from_slice(&buf);
}

impl SyntheticHeap {
    /// A heap whose root is a single direct block holding one object.
    pub fn root_direct(p: HeapParams) -> SyntheticHeap {
        let dblock_addr = 512usize;
        let block_size = p.starting_block_size as usize;
        let payload = b"fractal heap payload".to_vec();
        // Objects sit past the block header; heap offsets count that header.
        let local = 5 + p.offset_size as usize + offset_width(&p);

        let root_addr = if p.undefined_root {
            undefined_addr(p.offset_size)
        } else {
            dblock_addr as u64
        };
        let header = build_header(&p, root_addr, 0, p.starting_block_size, 1);

        let mut file = vec![0u8; dblock_addr + block_size];
        file[..header.len()].copy_from_slice(&header);
        let mut objects = Vec::new();
        if !p.undefined_root {
            place_direct_block(
                &mut file,
                &p,
                0,
                dblock_addr,
                0,
                block_size,
                &[(local, &payload)],
            );
            objects.push((local as u64, payload));
        }

        SyntheticHeap {
            file,
            header_offset: 0,
            objects,
        }
    }

    /// A heap whose root is an indirect block with three rows (the
    /// spec-example geometry: width 4, starting size 256, max direct 1024).
    ///
    /// Row 0 column 0 and row 2 column 0 hold direct blocks with one object
    /// each; every other entry is unallocated.
    pub fn root_indirect(p: HeapParams) -> SyntheticHeap {
        let iblock_addr = 512usize;
        let db0_addr = 1024usize;
        let db1_addr = 2048usize;
        let sbs = p.starting_block_size as usize;

        let header = build_header(&p, iblock_addr as u64, 3, 3 * p.starting_block_size, 2);

        let payload0 = b"row zero object".to_vec();
        let payload1 = b"row two object, in the doubled block".to_vec();
        let local = 5 + p.offset_size as usize + offset_width(&p);
        // Row 2 column 0 starts after the two starting-size rows.
        let row2_offset = 2 * p.table_width as u64 * p.starting_block_size;

        let mut file = vec![0u8; db1_addr + 2 * sbs];
        file[..header.len()].copy_from_slice(&header);
        place_indirect_block(
            &mut file,
            &p,
            0,
            iblock_addr,
            0,
            3 * p.table_width as usize,
            0,
            &[(0, db0_addr as u64), (8, db1_addr as u64)],
        );
        place_direct_block(&mut file, &p, 0, db0_addr, 0, sbs, &[(local, &payload0)]);
        place_direct_block(
            &mut file,
            &p,
            0,
            db1_addr,
            row2_offset,
            2 * sbs,
            &[(local, &payload1)],
        );

        SyntheticHeap {
            file,
            header_offset: 0,
            objects: vec![
                (local as u64, payload0),
                (row2_offset + local as u64, payload1),
            ],
        }
    }

    /// Build and parse just the header (root left undefined).
    pub fn header(p: HeapParams) -> FractalHeapHeader {
        let heap = SyntheticHeap::root_direct(HeapParams {
            undefined_root: true,
            ..p.clone()
        });
        FractalHeapHeader::parse(&heap.file, heap.header_offset, p.offset_size, p.length_size)
            .unwrap()
    }
}
