//! Fractal heap ID codec.
//!
//! A heap ID is a fixed-length token (`heap_id_length` bytes, from the heap
//! header) whose first byte carries a 2-bit version in bits 6-7 and a 2-bit
//! family tag in bits 4-5: 0 = managed, 1 = huge, 2 = tiny. The remaining
//! layout depends on the family and, for huge IDs, on a policy fixed at
//! heap-creation time that is fully determined by the header: whether the
//! heap has I/O filters, and whether the full retrieval record fits in the
//! ID. Every variant pads to the heap's fixed ID length on encode.

#[cfg(not(feature = "std"))]
use alloc::{vec, vec::Vec};

use crate::error::FormatError;
use crate::fractal_heap::{read_sized, read_uint, FractalHeapHeader};

const FAMILY_MANAGED: u8 = 0;
const FAMILY_HUGE: u8 = 1;
const FAMILY_TINY: u8 = 2;

/// Tiny IDs with at most this many bytes use the one-byte (normal) header.
const TINY_NORMAL_MAX_ID_LEN: u16 = 18;

/// A decoded fractal heap ID.
///
/// Closed sum over the three families and their sub-variants; consumers
/// match exhaustively instead of inspecting tag bits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeapId {
    /// Object stored in the direct/indirect block tree, addressed by linear
    /// heap offset and length.
    Managed {
        /// Offset in the heap's linear address space.
        offset: u64,
        /// Object length in bytes.
        length: u64,
    },
    /// Huge object stored standalone; retrieval record embedded in the ID.
    HugeDirect {
        /// File address of the object.
        address: u64,
        /// Object length in bytes.
        length: u64,
    },
    /// Huge object with I/O filters; record embedded in the ID.
    HugeDirectFiltered {
        /// File address of the filtered object.
        address: u64,
        /// Stored (filtered) length in bytes.
        length: u64,
        /// Filter mask for the object.
        filter_mask: u32,
        /// De-filtered (memory) size in bytes.
        memory_size: u64,
    },
    /// Huge object reached through the huge-object v2 B-tree.
    HugeIndirect {
        /// Key to look up in the B-tree index.
        btree_key: u64,
    },
    /// Filtered huge object reached through the huge-object v2 B-tree.
    HugeIndirectFiltered {
        /// Key to look up in the B-tree index.
        btree_key: u64,
    },
    /// Tiny object embedded in the ID, one-byte length header.
    TinyNormal {
        /// The object bytes.
        data: Vec<u8>,
    },
    /// Tiny object embedded in the ID, two-byte (12-bit) length header.
    TinyExtended {
        /// The object bytes.
        data: Vec<u8>,
    },
}

/// True when huge retrieval records fit directly in the heap's IDs.
fn huge_ids_direct(header: &FractalHeapHeader, offset_size: u8, length_size: u8) -> bool {
    let mut needed = 1 + offset_size as usize + length_size as usize;
    if header.filters_present() {
        needed += 4 + length_size as usize;
    }
    header.heap_id_length as usize >= needed
}

impl HeapId {
    /// Decode a heap ID against its owning heap's header.
    pub fn decode(
        id_bytes: &[u8],
        header: &FractalHeapHeader,
        offset_size: u8,
        length_size: u8,
    ) -> Result<HeapId, FormatError> {
        if id_bytes.is_empty() {
            return Err(FormatError::HeapIdTooShort {
                expected: 1,
                actual: 0,
            });
        }
        let first = id_bytes[0];
        let version = (first >> 6) & 0x03;
        if version != 0 {
            return Err(FormatError::UnsupportedHeapIdVersion(version));
        }

        match (first >> 4) & 0x03 {
            FAMILY_MANAGED => Self::decode_managed(id_bytes, header),
            FAMILY_HUGE => Self::decode_huge(id_bytes, header, offset_size, length_size),
            FAMILY_TINY => Self::decode_tiny(id_bytes, header),
            tag => Err(FormatError::InvalidHeapIdType(tag)),
        }
    }

    fn decode_managed(
        id_bytes: &[u8],
        header: &FractalHeapHeader,
    ) -> Result<HeapId, FormatError> {
        let off_w = header.heap_offset_width();
        let len_w = header.managed_length_width();
        let needed = 1 + off_w + len_w;
        if id_bytes.len() < needed {
            return Err(FormatError::HeapIdTooShort {
                expected: needed,
                actual: id_bytes.len(),
            });
        }
        let offset = read_uint(id_bytes, 1, off_w)?;
        let length = read_uint(id_bytes, 1 + off_w, len_w)?;
        Ok(HeapId::Managed { offset, length })
    }

    fn decode_huge(
        id_bytes: &[u8],
        header: &FractalHeapHeader,
        offset_size: u8,
        length_size: u8,
    ) -> Result<HeapId, FormatError> {
        let os = offset_size as usize;
        let ls = length_size as usize;
        let filtered = header.filters_present();

        if huge_ids_direct(header, offset_size, length_size) {
            let needed = 1 + os + ls + if filtered { 4 + ls } else { 0 };
            if id_bytes.len() < needed {
                return Err(FormatError::HeapIdTooShort {
                    expected: needed,
                    actual: id_bytes.len(),
                });
            }
            let address = read_sized(id_bytes, 1, offset_size)?;
            let length = read_sized(id_bytes, 1 + os, length_size)?;
            if filtered {
                let filter_mask = read_uint(id_bytes, 1 + os + ls, 4)? as u32;
                let memory_size = read_sized(id_bytes, 1 + os + ls + 4, length_size)?;
                Ok(HeapId::HugeDirectFiltered {
                    address,
                    length,
                    filter_mask,
                    memory_size,
                })
            } else {
                Ok(HeapId::HugeDirect { address, length })
            }
        } else {
            let needed = 1 + ls;
            if id_bytes.len() < needed {
                return Err(FormatError::HeapIdTooShort {
                    expected: needed,
                    actual: id_bytes.len(),
                });
            }
            let btree_key = read_sized(id_bytes, 1, length_size)?;
            if filtered {
                Ok(HeapId::HugeIndirectFiltered { btree_key })
            } else {
                Ok(HeapId::HugeIndirect { btree_key })
            }
        }
    }

    fn decode_tiny(id_bytes: &[u8], header: &FractalHeapHeader) -> Result<HeapId, FormatError> {
        if header.heap_id_length <= TINY_NORMAL_MAX_ID_LEN {
            let length = (id_bytes[0] & 0x0F) as usize + 1;
            let capacity = id_bytes.len() - 1;
            if length > capacity {
                return Err(FormatError::TinyLengthOverflow { length, capacity });
            }
            Ok(HeapId::TinyNormal {
                data: id_bytes[1..1 + length].to_vec(),
            })
        } else {
            if id_bytes.len() < 2 {
                return Err(FormatError::HeapIdTooShort {
                    expected: 2,
                    actual: id_bytes.len(),
                });
            }
            // 12-bit length: high nibble in byte 0, low byte in byte 1.
            let length = (((id_bytes[0] & 0x0F) as usize) << 8 | id_bytes[1] as usize) + 1;
            let capacity = id_bytes.len() - 2;
            if length > capacity {
                return Err(FormatError::TinyLengthOverflow { length, capacity });
            }
            Ok(HeapId::TinyExtended {
                data: id_bytes[2..2 + length].to_vec(),
            })
        }
    }

    /// Build a tiny heap ID, selecting the sub-type from the heap's ID
    /// length: heaps with IDs of at most 18 bytes use the one-byte header
    /// (lengths 1-16), longer IDs the two-byte header (lengths 1-4096).
    pub fn tiny(data: Vec<u8>, header: &FractalHeapHeader) -> Result<HeapId, FormatError> {
        if header.heap_id_length <= TINY_NORMAL_MAX_ID_LEN {
            let capacity = (header.heap_id_length as usize - 1).min(16);
            if data.is_empty() || data.len() > capacity {
                return Err(FormatError::TinyLengthOverflow {
                    length: data.len(),
                    capacity,
                });
            }
            Ok(HeapId::TinyNormal { data })
        } else {
            let capacity = (header.heap_id_length as usize - 2).min(4096);
            if data.is_empty() || data.len() > capacity {
                return Err(FormatError::TinyLengthOverflow {
                    length: data.len(),
                    capacity,
                });
            }
            Ok(HeapId::TinyExtended { data })
        }
    }

    /// Encode this ID, zero-padded to the heap's fixed ID length.
    pub fn encode(
        &self,
        header: &FractalHeapHeader,
        offset_size: u8,
        length_size: u8,
    ) -> Result<Vec<u8>, FormatError> {
        let id_len = header.heap_id_length as usize;
        let mut out = vec![0u8; id_len];
        let os = offset_size as usize;
        let ls = length_size as usize;

        let needed = match self {
            HeapId::Managed { offset, length } => {
                let off_w = header.heap_offset_width();
                let len_w = header.managed_length_width();
                write_uint(&mut out, 1, *offset, off_w);
                write_uint(&mut out, 1 + off_w, *length, len_w);
                1 + off_w + len_w
            }
            HeapId::HugeDirect { address, length } => {
                out[0] = FAMILY_HUGE << 4;
                write_uint(&mut out, 1, *address, os);
                write_uint(&mut out, 1 + os, *length, ls);
                1 + os + ls
            }
            HeapId::HugeDirectFiltered {
                address,
                length,
                filter_mask,
                memory_size,
            } => {
                out[0] = FAMILY_HUGE << 4;
                write_uint(&mut out, 1, *address, os);
                write_uint(&mut out, 1 + os, *length, ls);
                write_uint(&mut out, 1 + os + ls, *filter_mask as u64, 4);
                write_uint(&mut out, 1 + os + ls + 4, *memory_size, ls);
                1 + os + ls + 4 + ls
            }
            HeapId::HugeIndirect { btree_key } | HeapId::HugeIndirectFiltered { btree_key } => {
                out[0] = FAMILY_HUGE << 4;
                write_uint(&mut out, 1, *btree_key, ls);
                1 + ls
            }
            HeapId::TinyNormal { data } => {
                if data.is_empty() || 1 + data.len() > id_len {
                    return Err(FormatError::TinyLengthOverflow {
                        length: data.len(),
                        capacity: id_len.saturating_sub(1),
                    });
                }
                out[0] = FAMILY_TINY << 4 | (data.len() as u8 - 1) & 0x0F;
                out[1..1 + data.len()].copy_from_slice(data);
                1 + data.len()
            }
            HeapId::TinyExtended { data } => {
                if data.is_empty() || 2 + data.len() > id_len {
                    return Err(FormatError::TinyLengthOverflow {
                        length: data.len(),
                        capacity: id_len.saturating_sub(2),
                    });
                }
                let enc = data.len() - 1;
                out[0] = FAMILY_TINY << 4 | (enc >> 8) as u8 & 0x0F;
                out[1] = enc as u8;
                out[2..2 + data.len()].copy_from_slice(data);
                2 + data.len()
            }
        };

        if needed > id_len {
            return Err(FormatError::HeapIdTooShort {
                expected: needed,
                actual: id_len,
            });
        }
        Ok(out)
    }
}

fn write_uint(buf: &mut [u8], pos: usize, val: u64, width: usize) {
    for i in 0..width.min(buf.len().saturating_sub(pos)) {
        buf[pos + i] = (val >> (8 * i)) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{HeapParams, SyntheticHeap};

    fn header_with(params: HeapParams) -> FractalHeapHeader {
        SyntheticHeap::header(params)
    }

    #[test]
    fn managed_round_trip() {
        let hdr = header_with(HeapParams::default());
        let id = HeapId::Managed {
            offset: 0x1234,
            length: 0x01FF,
        };
        let bytes = id.encode(&hdr, 8, 8).unwrap();
        assert_eq!(bytes.len(), 7);
        assert_eq!(HeapId::decode(&bytes, &hdr, 8, 8).unwrap(), id);
    }

    #[test]
    fn managed_offset_width_follows_max_heap_size() {
        // 8-bit heap: offsets fit one byte.
        let hdr8 = header_with(HeapParams {
            max_heap_size: 8,
            ..HeapParams::default()
        });
        assert_eq!(hdr8.heap_offset_width(), 1);
        let id = HeapId::Managed {
            offset: 0xAB,
            length: 3,
        };
        let bytes = id.encode(&hdr8, 8, 8).unwrap();
        assert_eq!(HeapId::decode(&bytes, &hdr8, 8, 8).unwrap(), id);

        // 9-bit heap: offsets need two bytes.
        let hdr9 = header_with(HeapParams {
            max_heap_size: 9,
            ..HeapParams::default()
        });
        assert_eq!(hdr9.heap_offset_width(), 2);
        let id = HeapId::Managed {
            offset: 0x1AB,
            length: 3,
        };
        let bytes = id.encode(&hdr9, 8, 8).unwrap();
        assert_eq!(HeapId::decode(&bytes, &hdr9, 8, 8).unwrap(), id);
    }

    #[test]
    fn unsupported_version_bits() {
        let hdr = header_with(HeapParams::default());
        let id = [0x40u8, 0, 0, 0, 0, 0, 0];
        let err = HeapId::decode(&id, &hdr, 8, 8).unwrap_err();
        assert_eq!(err, FormatError::UnsupportedHeapIdVersion(1));
    }

    #[test]
    fn reserved_family_tag() {
        let hdr = header_with(HeapParams::default());
        let id = [0x30u8, 0, 0, 0, 0, 0, 0];
        let err = HeapId::decode(&id, &hdr, 8, 8).unwrap_err();
        assert_eq!(err, FormatError::InvalidHeapIdType(3));
    }

    #[test]
    fn tiny_normal_length_nibbles() {
        let hdr = header_with(HeapParams {
            heap_id_length: 18,
            ..HeapParams::default()
        });
        // Length 1 encodes as nibble 0.
        let id = HeapId::tiny(vec![0x7F], &hdr).unwrap();
        let bytes = id.encode(&hdr, 8, 8).unwrap();
        assert_eq!(bytes[0] & 0x0F, 0);
        assert_eq!(HeapId::decode(&bytes, &hdr, 8, 8).unwrap(), id);

        // Length 16 (the 4-bit maximum) encodes as nibble 15.
        let data: Vec<u8> = (0..16).collect();
        let id = HeapId::tiny(data, &hdr).unwrap();
        let bytes = id.encode(&hdr, 8, 8).unwrap();
        assert_eq!(bytes[0] & 0x0F, 15);
        assert_eq!(HeapId::decode(&bytes, &hdr, 8, 8).unwrap(), id);
    }

    #[test]
    fn tiny_length_17_requires_extended() {
        let hdr = header_with(HeapParams {
            heap_id_length: 24,
            ..HeapParams::default()
        });
        let data: Vec<u8> = (0..17).collect();
        let id = HeapId::tiny(data.clone(), &hdr).unwrap();
        assert!(matches!(id, HeapId::TinyExtended { .. }));
        let bytes = id.encode(&hdr, 8, 8).unwrap();
        // 12-bit encoded length 16, split across the first two bytes.
        assert_eq!(bytes[0] & 0x0F, 0);
        assert_eq!(bytes[1], 16);
        match HeapId::decode(&bytes, &hdr, 8, 8).unwrap() {
            HeapId::TinyExtended { data: got } => assert_eq!(got, data),
            other => panic!("expected extended tiny ID, got {other:?}"),
        }
    }

    #[test]
    fn tiny_decoded_length_must_fit_capacity() {
        let hdr = header_with(HeapParams::default()); // id length 7
        // Nibble claims 11 bytes but only 6 follow the header byte.
        let mut id = vec![0u8; 7];
        id[0] = 0x20 | 10;
        let err = HeapId::decode(&id, &hdr, 8, 8).unwrap_err();
        assert_eq!(
            err,
            FormatError::TinyLengthOverflow {
                length: 11,
                capacity: 6
            }
        );
    }

    #[test]
    fn tiny_boundary_round_trip_near_id_length() {
        // Largest tiny payload a 7-byte ID can carry: 6 bytes.
        let hdr = header_with(HeapParams::default());
        let data: Vec<u8> = (0..6).collect();
        let id = HeapId::tiny(data, &hdr).unwrap();
        let bytes = id.encode(&hdr, 8, 8).unwrap();
        assert_eq!(HeapId::decode(&bytes, &hdr, 8, 8).unwrap(), id);
        // One more byte does not fit.
        assert!(HeapId::tiny((0..7).collect(), &hdr).is_err());
    }

    #[test]
    fn huge_policy_direct_when_record_fits() {
        // 1 + 8 + 8 = 17 bytes needed for a direct record.
        let hdr = header_with(HeapParams {
            heap_id_length: 17,
            ..HeapParams::default()
        });
        let id = HeapId::HugeDirect {
            address: 0xDEAD_0000,
            length: 4096,
        };
        let bytes = id.encode(&hdr, 8, 8).unwrap();
        assert_eq!(HeapId::decode(&bytes, &hdr, 8, 8).unwrap(), id);
    }

    #[test]
    fn huge_policy_indirect_when_record_does_not_fit() {
        let hdr = header_with(HeapParams::default()); // 7-byte IDs
        let id = HeapId::HugeIndirect { btree_key: 42 };
        let bytes = HeapId::HugeIndirect { btree_key: 42 }.encode(&hdr, 8, 8).unwrap();
        assert_eq!(HeapId::decode(&bytes, &hdr, 8, 8).unwrap(), id);
    }

    #[test]
    fn huge_filtered_variants_follow_filter_config() {
        let filtered = HeapParams {
            filter_info: Some(vec![1, 2]),
            heap_id_length: 32,
            ..HeapParams::default()
        };
        let hdr = header_with(filtered);
        let id = HeapId::HugeDirectFiltered {
            address: 0x8000,
            length: 100,
            filter_mask: 0x0000_0001,
            memory_size: 400,
        };
        let bytes = id.encode(&hdr, 8, 8).unwrap();
        assert_eq!(HeapId::decode(&bytes, &hdr, 8, 8).unwrap(), id);

        // Same filters, short IDs: indirect filtered.
        let hdr = header_with(HeapParams {
            filter_info: Some(vec![1, 2]),
            heap_id_length: 17,
            ..HeapParams::default()
        });
        let bytes = HeapId::HugeIndirectFiltered { btree_key: 7 }
            .encode(&hdr, 8, 8)
            .unwrap();
        assert_eq!(
            HeapId::decode(&bytes, &hdr, 8, 8).unwrap(),
            HeapId::HugeIndirectFiltered { btree_key: 7 }
        );
    }

    #[test]
    fn encode_rejects_layouts_longer_than_id() {
        let hdr = header_with(HeapParams {
            heap_id_length: 4,
            ..HeapParams::default()
        });
        let err = HeapId::HugeDirect {
            address: 1,
            length: 1,
        }
        .encode(&hdr, 8, 8)
        .unwrap_err();
        assert!(matches!(err, FormatError::HeapIdTooShort { .. }));
    }
}
