//! Memory-mapped file reader for zero-copy heap access.
//!
//! [`MmapReader`] maps the file into the process address space via
//! `memmap2`; `as_bytes()` hands the heap parsers a slice straight into the
//! kernel page cache.

use memmap2::Mmap;
use std::fs;
use std::io;
use std::path::Path;

use crate::HeapRead;

/// Read-only memory-mapped file.
pub struct MmapReader {
    _file: fs::File,
    mmap: Mmap,
}

impl MmapReader {
    /// Open a file and memory-map it for reading.
    ///
    /// The caller must ensure the underlying file is not modified by
    /// another process while the mapping is active.
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        // SAFETY: read-only mapping; the caller keeps the file unmodified
        // for the mapping's lifetime.
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self { _file: file, mmap })
    }

    /// Zero-copy access to the entire file contents.
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }

    /// Read a slice at the given offset without copying.
    ///
    /// Returns `None` if `offset + len` exceeds the file size.
    pub fn read_at(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.mmap.get(offset..offset.checked_add(len)?)
    }

    /// Returns the length of the mapped file in bytes.
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the mapped file is empty.
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Advise the OS to prefetch the given range (madvise WILLNEED).
    ///
    /// Useful before walking a block tree whose children cluster in one
    /// file region. A hint only; no-op on non-Unix platforms.
    #[cfg(unix)]
    pub fn advise_willneed(&self, offset: usize, len: usize) {
        let actual_len = len.min(self.mmap.len().saturating_sub(offset));
        if actual_len == 0 {
            return;
        }
        // SAFETY: the range lies within our valid mapping.
        unsafe {
            let ptr = self.mmap.as_ptr().add(offset);
            libc::madvise(ptr as *mut libc::c_void, actual_len, libc::MADV_WILLNEED);
        }
    }

    /// No-op on non-Unix platforms.
    #[cfg(not(unix))]
    pub fn advise_willneed(&self, _offset: usize, _len: usize) {}
}

impl HeapRead for MmapReader {
    fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}

impl std::fmt::Debug for MmapReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MmapReader")
            .field("len", &self.mmap.len())
            .finish()
    }
}
