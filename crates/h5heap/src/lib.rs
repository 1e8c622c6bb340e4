//! High-level read API for the HDF5 heap storage subsystem.
//!
//! This crate resolves the three kinds of heap references an HDF5 container
//! reader encounters: fractal heap IDs (managed/huge/tiny objects), global
//! heap locators (shared, reference-counted objects), and local heap string
//! offsets (link names). The offset/length field widths come from the
//! enclosing file's superblock and are passed in when the file is opened.
//!
//! ```no_run
//! use h5heap::HeapFile;
//!
//! let file = HeapFile::open("data.h5", 8, 8).unwrap();
//! let heap = file.fractal_heap(0x1234).unwrap();
//! let link_record = heap.read_object(&[0x00, 0x0f, 0x00, 0x2a, 0x00, 0x00, 0x00]).unwrap();
//! println!("{} bytes", link_record.len());
//! ```

pub mod error;
pub mod heap;

pub use error::Error;
pub use heap::{read_local_heap_string, FractalHeap, HeapFile};

// Re-export the format- and io-layer types callers interact with.
pub use h5heap_format::fractal_heap::FractalHeapHeader;
pub use h5heap_format::global_heap::{GlobalHeapCollection, GlobalHeapId};
pub use h5heap_format::heap_id::HeapId;
pub use h5heap_format::huge::{HugeObjectIndex, HugeObjectRecord};
pub use h5heap_format::local_heap::LocalHeap;
pub use h5heap_io::{HeapRead, MemoryReader, MmapReader, StreamReader};
