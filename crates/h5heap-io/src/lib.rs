//! Byte-source abstractions for HDF5 heap access.
//!
//! The heap parsers in `h5heap-format` consume `&[u8]` plus offsets; this
//! crate provides the sources those slices come from: owned memory, a
//! memory map, or — for callers that share one seekable handle — a
//! positioned stream reader with a strict save/seek/restore discipline.

use std::io::{self, Read, Seek};

pub mod mmap;
pub mod stream;

pub use mmap::MmapReader;
pub use stream::StreamReader;

/// Read-only access to heap-bearing file data.
///
/// Implementors expose the entire file content as a byte slice, which is
/// the interface the `h5heap-format` parsers expect.
pub trait HeapRead {
    /// Returns the entire file content as a byte slice.
    fn as_bytes(&self) -> &[u8];

    /// Returns the length of the data in bytes.
    fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// Returns true if the data is empty.
    fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }
}

/// In-memory reader backed by an owned `Vec<u8>`.
#[derive(Debug, Clone)]
pub struct MemoryReader {
    data: Vec<u8>,
}

impl MemoryReader {
    /// Create a reader from an owned byte vector.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Read an entire file into memory.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;
        Ok(Self { data })
    }

    /// Consume the reader and return the underlying bytes.
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl HeapRead for MemoryReader {
    fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

/// Convenience: fill a buffer from any `Read + Seek` source at an absolute
/// offset, restoring the stream position afterwards. See [`StreamReader`].
pub fn read_at<R: Read + Seek>(source: &mut R, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    StreamReader::new(source).read_at(offset, buf)
}
