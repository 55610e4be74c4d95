//! The fixed-size trailer at the end of every file.
//!
//! The trailer is the reader's entry point: it records the offsets at which
//! the file changes content type, plus basic statistics and the compression
//! codec ordinal. All integers are big-endian.
//!
//! Layout (60 bytes):
//! ```text
//! [magic: 8 bytes]
//! [fileinfo_offset: u64]
//! [data_index_offset: u64]
//! [data_index_count: u32]
//! [meta_index_offset: u64]
//! [meta_index_count: u32]
//! [total_uncompressed_bytes: u64]
//! [entry_count: u32]
//! [compression_codec: u32]
//! [version: u32]
//! ```

use crate::error::{Error, Result};
use crate::{MAGIC_LENGTH, TRAILER_MAGIC};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Size of the serialized trailer in bytes.
pub const TRAILER_SIZE: usize = MAGIC_LENGTH + 8 * 4 + 4 * 5;

/// The file version this engine writes and the only one it reads.
pub const FORMAT_VERSION: u32 = 1;

/// The fixed trailer record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trailer {
    /// Offset of the serialized file-info map.
    pub fileinfo_offset: u64,
    /// Offset of the data-block index. Meaningless when `data_index_count` is 0.
    pub data_index_offset: u64,
    /// Number of data blocks, which is also the data-index entry count.
    pub data_index_count: u32,
    /// Offset of the meta-block index. Zero when no meta blocks exist.
    pub meta_index_offset: u64,
    /// Number of meta blocks.
    pub meta_index_count: u32,
    /// Sum of the uncompressed sizes of all data blocks.
    pub total_uncompressed_bytes: u64,
    /// Number of key/value entries in the file.
    pub entry_count: u32,
    /// Ordinal of the compression codec used for every block.
    pub compression_codec: u32,
    /// Format version, always [`FORMAT_VERSION`].
    pub version: u32,
}

impl Trailer {
    /// A zeroed trailer at the current version, filled in by the writer.
    pub fn new() -> Self {
        Self {
            fileinfo_offset: 0,
            data_index_offset: 0,
            data_index_count: 0,
            meta_index_offset: 0,
            meta_index_count: 0,
            total_uncompressed_bytes: 0,
            entry_count: 0,
            compression_codec: 0,
            version: FORMAT_VERSION,
        }
    }

    /// Serialize the trailer onto `w`.
    pub fn serialize<W: Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(&TRAILER_MAGIC)?;
        w.write_u64::<BigEndian>(self.fileinfo_offset)?;
        w.write_u64::<BigEndian>(self.data_index_offset)?;
        w.write_u32::<BigEndian>(self.data_index_count)?;
        w.write_u64::<BigEndian>(self.meta_index_offset)?;
        w.write_u32::<BigEndian>(self.meta_index_count)?;
        w.write_u64::<BigEndian>(self.total_uncompressed_bytes)?;
        w.write_u32::<BigEndian>(self.entry_count)?;
        w.write_u32::<BigEndian>(self.compression_codec)?;
        w.write_u32::<BigEndian>(self.version)?;
        Ok(())
    }

    /// Deserialize a trailer from `r`.
    ///
    /// Fails with `BadMagic` if the sentinel is wrong and with
    /// `UnsupportedVersion` for any version other than [`FORMAT_VERSION`].
    pub fn deserialize<R: Read>(r: &mut R) -> Result<Self> {
        let mut magic = [0u8; MAGIC_LENGTH];
        r.read_exact(&mut magic)?;
        if magic != TRAILER_MAGIC {
            return Err(Error::bad_magic("trailer"));
        }

        let trailer = Self {
            fileinfo_offset: r.read_u64::<BigEndian>()?,
            data_index_offset: r.read_u64::<BigEndian>()?,
            data_index_count: r.read_u32::<BigEndian>()?,
            meta_index_offset: r.read_u64::<BigEndian>()?,
            meta_index_count: r.read_u32::<BigEndian>()?,
            total_uncompressed_bytes: r.read_u64::<BigEndian>()?,
            entry_count: r.read_u32::<BigEndian>()?,
            compression_codec: r.read_u32::<BigEndian>()?,
            version: r.read_u32::<BigEndian>()?,
        };

        if trailer.version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(trailer.version));
        }
        Ok(trailer)
    }
}

impl Default for Trailer {
    fn default() -> Self {
        Self::new()
    }
}
