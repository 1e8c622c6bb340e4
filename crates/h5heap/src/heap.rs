//! Heap handles over a byte source.
//!
//! [`HeapFile`] couples a [`HeapRead`] source with the container-wide
//! offset/length sizes (supplied by the enclosing file's superblock) and
//! exposes the three resolution operations the rest of a container reader
//! needs: fractal heap IDs, global heap locators, and local heap strings.

use std::cell::RefCell;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::path::Path;

use h5heap_format::error::FormatError;
use h5heap_format::fractal_heap::FractalHeapHeader;
use h5heap_format::global_heap::{GlobalHeapCollection, GlobalHeapId};
use h5heap_format::huge::HugeObjectIndex;
use h5heap_format::local_heap::LocalHeap;
use h5heap_io::{HeapRead, MemoryReader, MmapReader, StreamReader};

use crate::error::Error;

/// A heap-bearing file: a byte source plus the superblock-supplied
/// offset/length field widths.
///
/// Global heap collections are cached whole on first access — a collection
/// is the unit of I/O amortization and is never partially parsed.
pub struct HeapFile<R: HeapRead> {
    reader: R,
    offset_size: u8,
    length_size: u8,
    collections: RefCell<HashMap<u64, GlobalHeapCollection>>,
}

impl HeapFile<MemoryReader> {
    /// Read an entire file into memory.
    pub fn open<P: AsRef<Path>>(
        path: P,
        offset_size: u8,
        length_size: u8,
    ) -> Result<Self, Error> {
        Ok(Self::new(
            MemoryReader::open(path)?,
            offset_size,
            length_size,
        ))
    }

    /// Wrap an in-memory byte vector.
    pub fn from_bytes(data: Vec<u8>, offset_size: u8, length_size: u8) -> Self {
        Self::new(MemoryReader::new(data), offset_size, length_size)
    }
}

impl HeapFile<MmapReader> {
    /// Open a file with memory-mapped I/O; reads are zero-copy views.
    pub fn open_mmap<P: AsRef<Path>>(
        path: P,
        offset_size: u8,
        length_size: u8,
    ) -> Result<Self, Error> {
        Ok(Self::new(
            MmapReader::open(path)?,
            offset_size,
            length_size,
        ))
    }
}

impl<R: HeapRead> HeapFile<R> {
    /// Wrap any byte source with the container's field widths.
    pub fn new(reader: R, offset_size: u8, length_size: u8) -> Self {
        Self {
            reader,
            offset_size,
            length_size,
            collections: RefCell::new(HashMap::new()),
        }
    }

    /// The underlying file bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.reader.as_bytes()
    }

    /// Open the fractal heap whose header sits at `address`.
    pub fn fractal_heap(&self, address: u64) -> Result<FractalHeap<'_, R>, Error> {
        let header = FractalHeapHeader::parse(
            self.reader.as_bytes(),
            address as usize,
            self.offset_size,
            self.length_size,
        )?;
        Ok(FractalHeap { file: self, header })
    }

    /// Resolve a global heap object to its bytes.
    ///
    /// The collection at `collection_address` is parsed and cached whole on
    /// first access; later lookups into the same collection are in-memory.
    pub fn global_heap_object(
        &self,
        collection_address: u64,
        index: u16,
    ) -> Result<Vec<u8>, Error> {
        let mut cache = self.collections.borrow_mut();
        let collection = match cache.entry(collection_address) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(v) => v.insert(GlobalHeapCollection::parse(
                self.reader.as_bytes(),
                collection_address as usize,
                self.length_size,
            )?),
        };
        let bytes = collection.object_data(self.reader.as_bytes(), index)?;
        Ok(bytes.to_vec())
    }

    /// Resolve a [`GlobalHeapId`] locator to its object bytes.
    pub fn resolve_global_heap_id(&self, id: &GlobalHeapId) -> Result<Vec<u8>, Error> {
        let index = u16::try_from(id.object_index)
            .map_err(|_| FormatError::GlobalHeapObjectNotFound(u16::MAX))?;
        self.global_heap_object(id.collection_address, index)
    }

    /// Parse the local heap whose header sits at `address`.
    pub fn local_heap(&self, address: u64) -> Result<LocalHeap, Error> {
        Ok(LocalHeap::parse(
            self.reader.as_bytes(),
            address as usize,
            self.offset_size,
            self.length_size,
        )?)
    }

    /// Read the null-terminated string at `offset` in a local heap's data
    /// segment.
    pub fn local_heap_string(&self, heap: &LocalHeap, offset: u64) -> Result<String, Error> {
        Ok(heap.read_string(self.reader.as_bytes(), offset)?)
    }
}

/// An opened fractal heap: the parsed header plus its owning file.
pub struct FractalHeap<'f, R: HeapRead> {
    file: &'f HeapFile<R>,
    header: FractalHeapHeader,
}

impl<R: HeapRead> FractalHeap<'_, R> {
    /// The parsed heap header.
    pub fn header(&self) -> &FractalHeapHeader {
        &self.header
    }

    /// Resolve a heap ID to the object's bytes.
    ///
    /// Handles managed, tiny, and directly-accessed huge IDs. Heaps whose
    /// huge IDs go through the v2 B-tree need [`Self::read_object_indexed`].
    pub fn read_object(&self, id_bytes: &[u8]) -> Result<Vec<u8>, Error> {
        Ok(self.header.read_object(
            self.file.reader.as_bytes(),
            id_bytes,
            self.file.offset_size,
            self.file.length_size,
        )?)
    }

    /// Resolve a heap ID, looking indirect huge IDs up in `huge_index`.
    pub fn read_object_indexed(
        &self,
        id_bytes: &[u8],
        huge_index: &dyn HugeObjectIndex,
    ) -> Result<Vec<u8>, Error> {
        Ok(self.header.read_object_indexed(
            self.file.reader.as_bytes(),
            id_bytes,
            self.file.offset_size,
            self.file.length_size,
            Some(huge_index),
        )?)
    }
}

/// Read a local heap string through a shared seekable stream.
///
/// The stream position observed by other users of the handle is unchanged
/// by this call, whether it succeeds or fails — reads go through
/// [`StreamReader`]'s save/seek/restore discipline.
pub fn read_local_heap_string<S: Read + Seek>(
    heap: &LocalHeap,
    stream: &mut StreamReader<S>,
    offset: u64,
) -> Result<String, Error> {
    if offset >= heap.data_segment_size {
        return Err(Error::Format(FormatError::UnexpectedEof {
            expected: offset as usize + 1,
            available: heap.data_segment_size as usize,
        }));
    }
    let remaining = (heap.data_segment_size - offset) as usize;
    let bytes = stream.read_vec_at(heap.data_segment_address + offset, remaining)?;
    let terminator = bytes
        .iter()
        .position(|&b| b == 0)
        .ok_or(FormatError::StringNotTerminated)?;
    let s = std::str::from_utf8(&bytes[..terminator])
        .map_err(|_| FormatError::InvalidStringEncoding)?;
    Ok(s.to_string())
}
