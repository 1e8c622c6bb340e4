//! Error types for HDF5 heap parsing.

use core::fmt;

/// Errors that can occur when parsing HDF5 heap structures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// Unexpected end of data.
    UnexpectedEof {
        /// Number of bytes expected.
        expected: usize,
        /// Number of bytes actually available.
        available: usize,
    },
    /// Invalid offset size (must be 2, 4, or 8).
    InvalidOffsetSize(u8),
    /// Invalid length size (must be 2, 4, or 8).
    InvalidLengthSize(u8),
    /// Invalid fractal heap header signature (expected "FRHP").
    InvalidFractalHeapSignature,
    /// Unsupported fractal heap header version (only 0 is defined).
    UnsupportedFractalHeapVersion(u8),
    /// Invalid fractal heap direct block signature (expected "FHDB").
    InvalidDirectBlockSignature,
    /// Unsupported fractal heap direct block version (only 0 is defined).
    UnsupportedDirectBlockVersion(u8),
    /// Invalid fractal heap indirect block signature (expected "FHIB").
    InvalidIndirectBlockSignature,
    /// Unsupported fractal heap indirect block version (only 0 is defined).
    UnsupportedIndirectBlockVersion(u8),
    /// Invalid global heap collection signature (expected "GCOL").
    InvalidGlobalHeapSignature,
    /// Unsupported global heap collection version (only 1 is defined).
    UnsupportedGlobalHeapVersion(u8),
    /// Invalid local heap signature (expected "HEAP").
    InvalidLocalHeapSignature,
    /// Unsupported local heap version (only 0 is defined).
    UnsupportedLocalHeapVersion(u8),
    /// A doubling-table parameter that must be a power of two is not.
    NotPowerOfTwo {
        /// Name of the offending header field.
        field: &'static str,
        /// The value found.
        value: u64,
    },
    /// Unsupported heap ID version (bits 6-7 of the first byte; only 0 is defined).
    UnsupportedHeapIdVersion(u8),
    /// Heap ID family tag out of range (bits 4-5 of the first byte; 3 is reserved).
    InvalidHeapIdType(u8),
    /// Heap ID shorter than its declared layout requires.
    HeapIdTooShort {
        /// Bytes the layout requires.
        expected: usize,
        /// Bytes actually present.
        actual: usize,
    },
    /// Tiny heap ID length exceeds the ID's inline capacity.
    TinyLengthOverflow {
        /// Decoded object length.
        length: usize,
        /// Inline bytes available in the ID.
        capacity: usize,
    },
    /// A child block's heap-header back-reference does not match the header.
    HeapHeaderMismatch {
        /// Address of the fractal heap header that owns the block.
        expected: u64,
        /// Address stored in the block.
        actual: u64,
    },
    /// A managed object's offset/length range falls outside its direct block.
    ObjectOutOfBounds {
        /// Offset of the object in the heap's linear address space.
        heap_offset: u64,
        /// Length of the object in bytes.
        length: u64,
    },
    /// The heap has no root block to resolve managed objects from.
    NoRootBlock,
    /// An indirect huge object ID was resolved without a B-tree index.
    HugeIndexUnavailable,
    /// A huge object B-tree key was not found in the index.
    HugeObjectNotFound(u64),
    /// Two objects in one global heap collection share an index.
    DuplicateGlobalHeapIndex(u16),
    /// No object with the given index exists in the collection.
    GlobalHeapObjectNotFound(u16),
    /// A local heap string ran past the end of the data segment
    /// without a null terminator.
    StringNotTerminated,
    /// A local heap string is not valid UTF-8.
    InvalidStringEncoding,
    /// Jenkins lookup3 checksum mismatch.
    ChecksumMismatch {
        /// The checksum stored in the file.
        expected: u32,
        /// The checksum we computed.
        computed: u32,
    },
    /// Indirect block recursion exceeded the bound implied by the header.
    RecursionLimit(u16),
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::UnexpectedEof { expected, available } => {
                write!(f, "unexpected EOF: need {expected} bytes, have {available}")
            }
            FormatError::InvalidOffsetSize(s) => {
                write!(f, "invalid offset size: {s} (must be 2, 4, or 8)")
            }
            FormatError::InvalidLengthSize(s) => {
                write!(f, "invalid length size: {s} (must be 2, 4, or 8)")
            }
            FormatError::InvalidFractalHeapSignature => {
                write!(f, "invalid fractal heap header signature")
            }
            FormatError::UnsupportedFractalHeapVersion(v) => {
                write!(f, "unsupported fractal heap header version: {v}")
            }
            FormatError::InvalidDirectBlockSignature => {
                write!(f, "invalid fractal heap direct block signature")
            }
            FormatError::UnsupportedDirectBlockVersion(v) => {
                write!(f, "unsupported fractal heap direct block version: {v}")
            }
            FormatError::InvalidIndirectBlockSignature => {
                write!(f, "invalid fractal heap indirect block signature")
            }
            FormatError::UnsupportedIndirectBlockVersion(v) => {
                write!(f, "unsupported fractal heap indirect block version: {v}")
            }
            FormatError::InvalidGlobalHeapSignature => {
                write!(f, "invalid global heap collection signature")
            }
            FormatError::UnsupportedGlobalHeapVersion(v) => {
                write!(f, "unsupported global heap collection version: {v}")
            }
            FormatError::InvalidLocalHeapSignature => {
                write!(f, "invalid local heap signature")
            }
            FormatError::UnsupportedLocalHeapVersion(v) => {
                write!(f, "unsupported local heap version: {v}")
            }
            FormatError::NotPowerOfTwo { field, value } => {
                write!(f, "{field} must be a power of two, got {value}")
            }
            FormatError::UnsupportedHeapIdVersion(v) => {
                write!(f, "unsupported heap ID version: {v}")
            }
            FormatError::InvalidHeapIdType(t) => {
                write!(f, "invalid heap ID type tag: {t}")
            }
            FormatError::HeapIdTooShort { expected, actual } => {
                write!(f, "heap ID too short: need {expected} bytes, have {actual}")
            }
            FormatError::TinyLengthOverflow { length, capacity } => {
                write!(
                    f,
                    "tiny heap ID length {length} exceeds inline capacity {capacity}"
                )
            }
            FormatError::HeapHeaderMismatch { expected, actual } => {
                write!(
                    f,
                    "block back-reference {actual:#x} does not match heap header at {expected:#x}"
                )
            }
            FormatError::ObjectOutOfBounds { heap_offset, length } => {
                write!(
                    f,
                    "managed object at heap offset {heap_offset} (length {length}) falls outside its direct block"
                )
            }
            FormatError::NoRootBlock => {
                write!(f, "fractal heap has no root block")
            }
            FormatError::HugeIndexUnavailable => {
                write!(f, "indirect huge object ID requires a v2 B-tree index")
            }
            FormatError::HugeObjectNotFound(key) => {
                write!(f, "huge object key {key} not found in B-tree index")
            }
            FormatError::DuplicateGlobalHeapIndex(idx) => {
                write!(f, "duplicate global heap object index: {idx}")
            }
            FormatError::GlobalHeapObjectNotFound(idx) => {
                write!(f, "global heap object index {idx} not found")
            }
            FormatError::StringNotTerminated => {
                write!(f, "local heap string is missing its null terminator")
            }
            FormatError::InvalidStringEncoding => {
                write!(f, "local heap string is not valid UTF-8")
            }
            FormatError::ChecksumMismatch { expected, computed } => {
                write!(
                    f,
                    "checksum mismatch: expected {expected:#010x}, computed {computed:#010x}"
                )
            }
            FormatError::RecursionLimit(depth) => {
                write!(f, "indirect block recursion exceeded sanity bound {depth}")
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for FormatError {}
