//! Low-level byte encoding helpers shared by the writer and reader.
//!
//! All fixed-width integers on disk are big-endian. Byte arrays are
//! length-prefixed with a 4-byte big-endian length.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Take, Write};

/// Upper bound accepted for a length prefix, matching the maximum value size.
const MAX_ARRAY_LEN: u32 = i32::MAX as u32;

/// Write a 4-byte big-endian length followed by the bytes themselves.
pub fn write_byte_array<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    w.write_u32::<BigEndian>(bytes.len() as u32)?;
    w.write_all(bytes)?;
    Ok(())
}

/// Read a length-prefixed byte array written by [`write_byte_array`].
pub fn read_byte_array<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = r.read_u32::<BigEndian>()?;
    if len > MAX_ARRAY_LEN {
        return Err(Error::corrupt(format!("byte array length {} out of range", len)));
    }
    let mut buf = vec![0u8; len as usize];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

/// Position `source` at `offset` and return a reader bounded to `len` bytes.
///
/// The bound keeps a decompressor from reading past the end of its block into
/// the next section of the file.
pub fn bounded_range<R: Read + Seek>(
    source: &mut R,
    offset: u64,
    len: u64,
) -> Result<Take<&mut R>> {
    source.seek(SeekFrom::Start(offset))?;
    Ok(source.take(len))
}

/// A `Write` adapter that counts the bytes passing through it.
///
/// The writer tracks its own file offset with this; the `Write` seam has no
/// notion of position.
#[derive(Debug)]
pub struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> CountingWriter<W> {
    /// Wrap `inner`, starting the count at zero.
    pub fn new(inner: W) -> Self {
        Self { inner, count: 0 }
    }

    /// Bytes written through this adapter so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Consume the adapter and return the underlying writer.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}
