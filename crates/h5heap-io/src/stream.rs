//! Positioned reads over a shared seekable stream.
//!
//! Heap lookups jump between non-contiguous file addresses while other
//! components may hold positions in the same stream. [`StreamReader`]
//! therefore never leaks a moved position: every read saves the current
//! position, seeks, reads, and restores the saved position on every exit
//! path — the restore lives in a drop guard so error returns restore too.
//!
//! The stream is not assumed thread-safe. One logical reader per handle;
//! concurrent readers need independent handles.

use std::io::{self, Read, Seek, SeekFrom};

/// Wraps a `Read + Seek` source with position-preserving absolute reads.
#[derive(Debug)]
pub struct StreamReader<R: Read + Seek> {
    inner: R,
}

/// Restores the saved stream position when dropped.
struct PositionGuard<'a, R: Seek> {
    inner: &'a mut R,
    saved: u64,
}

impl<R: Seek> Drop for PositionGuard<'_, R> {
    fn drop(&mut self) {
        // Nothing useful to do with a failed restore during unwind.
        let _ = self.inner.seek(SeekFrom::Start(self.saved));
    }
}

impl<R: Read + Seek> StreamReader<R> {
    /// Wrap a seekable source.
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Unwrap the underlying source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Current position of the underlying stream.
    pub fn position(&mut self) -> io::Result<u64> {
        self.inner.stream_position()
    }

    /// Fill `buf` from the absolute `offset`, restoring the stream position
    /// afterwards — including when the seek or read fails.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        let saved = self.inner.stream_position()?;
        let guard = PositionGuard {
            inner: &mut self.inner,
            saved,
        };
        guard.inner.seek(SeekFrom::Start(offset))?;
        guard.inner.read_exact(buf)?;
        Ok(())
    }

    /// Read `len` bytes at the absolute `offset` into a new vector.
    pub fn read_vec_at(&mut self, offset: u64, len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_at(offset, &mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample_stream() -> StreamReader<Cursor<Vec<u8>>> {
        StreamReader::new(Cursor::new((0u8..64).collect()))
    }

    #[test]
    fn reads_at_absolute_offsets() {
        let mut r = sample_stream();
        let mut buf = [0u8; 4];
        r.read_at(10, &mut buf).unwrap();
        assert_eq!(buf, [10, 11, 12, 13]);
        assert_eq!(r.read_vec_at(0, 3).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn position_is_preserved_across_reads() {
        let mut r = sample_stream();
        // Sentinel position: somewhere mid-stream.
        r.inner.seek(SeekFrom::Start(7)).unwrap();
        let mut buf = [0u8; 8];
        r.read_at(32, &mut buf).unwrap();
        assert_eq!(r.position().unwrap(), 7);
    }

    #[test]
    fn position_is_preserved_when_the_read_fails() {
        let mut r = sample_stream();
        r.inner.seek(SeekFrom::Start(5)).unwrap();
        let mut buf = [0u8; 16];
        // Runs past the end of the 64-byte stream.
        assert!(r.read_at(60, &mut buf).is_err());
        assert_eq!(r.position().unwrap(), 5);
    }

    #[test]
    fn works_through_a_mutable_reference() {
        let mut cursor = Cursor::new(vec![9u8; 16]);
        cursor.seek(SeekFrom::Start(3)).unwrap();
        let mut buf = [0u8; 2];
        crate::read_at(&mut cursor, 8, &mut buf).unwrap();
        assert_eq!(buf, [9, 9]);
        assert_eq!(cursor.position(), 3);
    }
}
