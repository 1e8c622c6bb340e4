//! HDF5 Global Heap collection parsing.
//!
//! Global heap objects are shared, reference-counted blobs grouped into
//! collections (signature "GCOL"). A collection is the unit of I/O
//! amortization: it is always parsed whole, never partially. Object data is
//! opaque at this layer — each object records where its bytes sit so
//! callers can slice them out on demand.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use crate::error::FormatError;

/// Magic signature for global heap collections.
const GCOL_SIGNATURE: [u8; 4] = [b'G', b'C', b'O', b'L'];

/// A parsed global heap collection.
#[derive(Debug, Clone)]
pub struct GlobalHeapCollection {
    /// File address of the collection.
    pub address: u64,
    /// Total size of this collection including its header.
    pub collection_size: u64,
    /// Objects in on-disk order. Indices are unique; index 0 never appears.
    pub objects: Vec<GlobalHeapObject>,
    /// Declared extent of the trailing free space (object index 0),
    /// including its own 16-byte header. Zero when the collection is full.
    pub free_space: u64,
}

/// A single object within a global heap collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalHeapObject {
    /// Object index (1-based; 0 marks trailing free space).
    pub index: u16,
    /// Reference count.
    pub reference_count: u16,
    /// Declared size of the object data in bytes.
    pub size: u64,
    /// Absolute file position of the object data.
    pub data_offset: usize,
}

/// Locator for one global heap object: collection address + object index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalHeapId {
    /// File address of the collection holding the object.
    pub collection_address: u64,
    /// Index of the object within the collection.
    pub object_index: u32,
}

fn ensure_len(data: &[u8], offset: usize, needed: usize) -> Result<(), FormatError> {
    match offset.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(FormatError::UnexpectedEof {
            expected: offset.saturating_add(needed),
            available: data.len(),
        }),
    }
}

fn read_length(data: &[u8], offset: usize, length_size: u8) -> Result<u64, FormatError> {
    let s = length_size as usize;
    ensure_len(data, offset, s)?;
    let slice = &data[offset..offset + s];
    Ok(match length_size {
        2 => u16::from_le_bytes([slice[0], slice[1]]) as u64,
        4 => u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]) as u64,
        8 => u64::from_le_bytes([
            slice[0], slice[1], slice[2], slice[3], slice[4], slice[5], slice[6], slice[7],
        ]),
        _ => return Err(FormatError::InvalidLengthSize(length_size)),
    })
}

/// Round up to the next multiple of 8 (object data padding on disk).
fn pad8(x: usize) -> usize {
    (x + 7) & !7
}

impl GlobalHeapId {
    /// Parse the on-disk locator form: collection address + 4-byte index.
    pub fn parse(
        data: &[u8],
        offset: usize,
        offset_size: u8,
    ) -> Result<GlobalHeapId, FormatError> {
        let collection_address = read_length(data, offset, offset_size)?;
        let pos = offset + offset_size as usize;
        ensure_len(data, pos, 4)?;
        let object_index =
            u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
        Ok(GlobalHeapId {
            collection_address,
            object_index,
        })
    }
}

impl GlobalHeapCollection {
    /// Parse a global heap collection at the given offset.
    ///
    /// Objects are read until the free-space marker (index 0) or until no
    /// full object header fits before the collection end. A repeated object
    /// index means the collection is corrupt.
    pub fn parse(
        file_data: &[u8],
        offset: usize,
        length_size: u8,
    ) -> Result<GlobalHeapCollection, FormatError> {
        let ls = length_size as usize;
        // signature(4) + version(1) + reserved(3) + collection_size(length_size)
        ensure_len(file_data, offset, 8 + ls)?;

        if file_data[offset..offset + 4] != GCOL_SIGNATURE {
            return Err(FormatError::InvalidGlobalHeapSignature);
        }
        let version = file_data[offset + 4];
        if version != 1 {
            return Err(FormatError::UnsupportedGlobalHeapVersion(version));
        }

        let collection_size = read_length(file_data, offset + 8, length_size)?;
        let collection_end = (offset + collection_size as usize).min(file_data.len());

        // object_index(2) + reference_count(2) + reserved(4) + size(length_size)
        let object_header_size = 8 + ls;
        let mut pos = offset + 8 + ls;
        let mut objects: Vec<GlobalHeapObject> = Vec::new();
        let mut free_space = 0u64;

        while pos + object_header_size <= collection_end {
            let index = u16::from_le_bytes([file_data[pos], file_data[pos + 1]]);
            let reference_count = u16::from_le_bytes([file_data[pos + 2], file_data[pos + 3]]);
            let size = read_length(file_data, pos + 8, length_size)?;

            if index == 0 {
                // Trailing free space; its size spans to the collection end.
                free_space = size;
                break;
            }
            if objects.iter().any(|o| o.index == index) {
                return Err(FormatError::DuplicateGlobalHeapIndex(index));
            }

            let data_offset = pos + object_header_size;
            ensure_len(file_data, data_offset, size as usize)?;
            objects.push(GlobalHeapObject {
                index,
                reference_count,
                size,
                data_offset,
            });

            // Object data is padded to an 8-byte boundary on disk.
            pos = data_offset + pad8(size as usize);
        }

        Ok(GlobalHeapCollection {
            address: offset as u64,
            collection_size,
            objects,
            free_space,
        })
    }

    /// Get an object by its index.
    pub fn object(&self, index: u16) -> Option<&GlobalHeapObject> {
        self.objects.iter().find(|o| o.index == index)
    }

    /// Slice an object's data out of the file.
    pub fn object_data<'a>(
        &self,
        file_data: &'a [u8],
        index: u16,
    ) -> Result<&'a [u8], FormatError> {
        let obj = self
            .object(index)
            .ok_or(FormatError::GlobalHeapObjectNotFound(index))?;
        ensure_len(file_data, obj.data_offset, obj.size as usize)?;
        Ok(&file_data[obj.data_offset..obj.data_offset + obj.size as usize])
    }
}

#[cfg(test)]
mod tests {
    #[cfg(not(feature = "std"))]
    use alloc::{vec, vec::Vec};

    use super::*;

    /// Build a collection from (index, ref_count, data) triples, closed by
    /// a free-space marker.
    fn build_collection(objects: &[(u16, u16, &[u8])], length_size: u8) -> Vec<u8> {
        let ls = length_size as usize;

        let mut body_size = 0usize;
        for (_, _, data) in objects {
            body_size += 8 + ls + pad8(data.len());
        }
        let free_header = 8 + ls;
        let collection_size = 8 + ls + body_size + free_header;

        let mut buf = Vec::new();
        buf.extend_from_slice(&GCOL_SIGNATURE);
        buf.push(1); // version
        buf.extend_from_slice(&[0u8; 3]);
        append_len(&mut buf, collection_size as u64, length_size);

        for (index, ref_count, data) in objects {
            buf.extend_from_slice(&index.to_le_bytes());
            buf.extend_from_slice(&ref_count.to_le_bytes());
            buf.extend_from_slice(&[0u8; 4]);
            append_len(&mut buf, data.len() as u64, length_size);
            buf.extend_from_slice(data);
            buf.resize(buf.len() + pad8(data.len()) - data.len(), 0);
        }

        // Free space marker: index 0, size covering the rest.
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&[0u8; 4]);
        append_len(&mut buf, free_header as u64, length_size);

        buf
    }

    fn append_len(buf: &mut Vec<u8>, val: u64, length_size: u8) {
        match length_size {
            4 => buf.extend_from_slice(&(val as u32).to_le_bytes()),
            8 => buf.extend_from_slice(&val.to_le_bytes()),
            _ => panic!("unsupported length size in test"),
        }
    }

    #[test]
    fn recovers_objects_and_stops_at_free_space() {
        let data = build_collection(
            &[(1, 1, b"alpha"), (2, 3, b"beta data"), (3, 1, b"gamma!")],
            8,
        );
        let coll = GlobalHeapCollection::parse(&data, 0, 8).unwrap();
        assert_eq!(coll.objects.len(), 3);
        assert_eq!(coll.object(1).unwrap().reference_count, 1);
        assert_eq!(coll.object(2).unwrap().reference_count, 3);
        assert_eq!(coll.object(2).unwrap().size, 9);
        assert_eq!(coll.object_data(&data, 1).unwrap(), b"alpha");
        assert_eq!(coll.object_data(&data, 3).unwrap(), b"gamma!");
        assert_eq!(coll.free_space, 16);
    }

    #[test]
    fn duplicate_index_is_corruption() {
        let data = build_collection(&[(1, 1, b"one"), (2, 1, b"two"), (2, 1, b"again")], 8);
        let err = GlobalHeapCollection::parse(&data, 0, 8).unwrap_err();
        assert_eq!(err, FormatError::DuplicateGlobalHeapIndex(2));
    }

    #[test]
    fn free_space_bytes_are_not_parsed_as_objects() {
        // Garbage after the index-0 marker must never be interpreted.
        let mut data = build_collection(&[(1, 1, b"only")], 8);
        let tail = data.len();
        data.resize(tail + 32, 0xEE);
        let coll = GlobalHeapCollection::parse(&data, 0, 8).unwrap();
        assert_eq!(coll.objects.len(), 1);
    }

    #[test]
    fn invalid_signature() {
        let mut data = build_collection(&[(1, 1, b"x")], 8);
        data[0] = b'X';
        let err = GlobalHeapCollection::parse(&data, 0, 8).unwrap_err();
        assert_eq!(err, FormatError::InvalidGlobalHeapSignature);
    }

    #[test]
    fn unsupported_version() {
        let mut data = build_collection(&[(1, 1, b"x")], 8);
        data[4] = 0; // version 0 does not exist for GCOL
        let err = GlobalHeapCollection::parse(&data, 0, 8).unwrap_err();
        assert_eq!(err, FormatError::UnsupportedGlobalHeapVersion(0));
    }

    #[test]
    fn four_byte_lengths() {
        let data = build_collection(&[(1, 2, b"len4")], 4);
        let coll = GlobalHeapCollection::parse(&data, 0, 4).unwrap();
        assert_eq!(coll.object_data(&data, 1).unwrap(), b"len4");
    }

    #[test]
    fn data_positions_are_eight_byte_aligned() {
        let data = build_collection(&[(1, 1, b"abc"), (2, 1, b"defg")], 8);
        let coll = GlobalHeapCollection::parse(&data, 0, 8).unwrap();
        for obj in &coll.objects {
            // Each object header starts on an 8-byte boundary, and headers
            // are 16 bytes, so data offsets are aligned too.
            assert_eq!(obj.data_offset % 8, 0);
        }
    }

    #[test]
    fn missing_object_index() {
        let data = build_collection(&[(1, 1, b"x")], 8);
        let coll = GlobalHeapCollection::parse(&data, 0, 8).unwrap();
        assert_eq!(
            coll.object_data(&data, 9).unwrap_err(),
            FormatError::GlobalHeapObjectNotFound(9)
        );
    }

    #[test]
    fn locator_parse() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0x2000u64.to_le_bytes());
        buf.extend_from_slice(&3u32.to_le_bytes());
        let id = GlobalHeapId::parse(&buf, 0, 8).unwrap();
        assert_eq!(id.collection_address, 0x2000);
        assert_eq!(id.object_index, 3);
    }
}
