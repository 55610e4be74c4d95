//! Compression codecs and pooled compressor/decompressor resources.
//!
//! A codec is identified on disk by a stable integer ordinal stored in the
//! trailer. Ordinal 0 is always "none"; named codecs take the subsequent
//! ordinals in registration order. Codecs compiled out of this build leave a
//! hole: their ordinals fail to resolve and surface as `UnknownCodec`.

use crate::error::{Error, Result};
use parking_lot::Mutex;
use std::io::{Read, Write};
use std::ops::{Deref, DerefMut};

#[cfg(any(feature = "gzip", feature = "snappy"))]
use once_cell::sync::Lazy;

/// Compression algorithms this engine can write and read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// No compression. Blocks are stored verbatim.
    None,

    /// Deflate compression with zlib framing (better ratio, slower).
    #[cfg(feature = "gzip")]
    Gz,

    /// Snappy compression (fast, moderate ratio).
    #[cfg(feature = "snappy")]
    Snappy,
}

impl Compression {
    /// The stable ordinal stored in the trailer.
    pub fn ordinal(self) -> u32 {
        match self {
            Compression::None => 0,
            #[cfg(feature = "gzip")]
            Compression::Gz => 1,
            #[cfg(feature = "snappy")]
            Compression::Snappy => 2,
        }
    }

    /// Resolve a trailer ordinal, `None` if unknown or compiled out.
    pub fn from_ordinal(ordinal: u32) -> Option<Self> {
        match ordinal {
            0 => Some(Compression::None),
            #[cfg(feature = "gzip")]
            1 => Some(Compression::Gz),
            #[cfg(feature = "snappy")]
            2 => Some(Compression::Snappy),
            _ => None,
        }
    }

    /// Codec name accepted by [`by_name`](Compression::by_name).
    pub fn name(self) -> &'static str {
        match self {
            Compression::None => "none",
            #[cfg(feature = "gzip")]
            Compression::Gz => "gz",
            #[cfg(feature = "snappy")]
            Compression::Snappy => "snappy",
        }
    }

    /// Look up a codec by name.
    pub fn by_name(name: &str) -> Option<Self> {
        match name {
            "none" => Some(Compression::None),
            #[cfg(feature = "gzip")]
            "gz" => Some(Compression::Gz),
            #[cfg(feature = "snappy")]
            "snappy" => Some(Compression::Snappy),
            _ => None,
        }
    }

    /// Compress `block` into `sink` and return the compressed byte count.
    pub fn compress_into<W: Write>(self, block: &[u8], sink: &mut W) -> Result<u64> {
        match self {
            Compression::None => {
                sink.write_all(block)?;
                Ok(block.len() as u64)
            }
            #[cfg(feature = "gzip")]
            Compression::Gz => {
                let mut compressor = gz_compressors().take();
                compressor.reset();
                let mut compressed = Vec::with_capacity(block.len() / 2 + 128);
                let mut input = block;
                loop {
                    let before_in = compressor.total_in();
                    let status = compressor
                        .compress_vec(input, &mut compressed, flate2::FlushCompress::Finish)
                        .map_err(|e| {
                            Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
                        })?;
                    let consumed = (compressor.total_in() - before_in) as usize;
                    input = &input[consumed..];
                    match status {
                        flate2::Status::StreamEnd => break,
                        // Out of output space; grow and feed the rest through.
                        _ => compressed.reserve(block.len() / 2 + 128),
                    }
                }
                sink.write_all(&compressed)?;
                Ok(compressed.len() as u64)
            }
            #[cfg(feature = "snappy")]
            Compression::Snappy => {
                let mut encoder = snappy_encoders().take();
                let compressed = encoder.compress_vec(block).map_err(|e| {
                    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
                })?;
                sink.write_all(&compressed)?;
                Ok(compressed.len() as u64)
            }
        }
    }

    /// Inflate exactly `uncompressed_len` bytes from `source`.
    ///
    /// The source must already be bounded to the block's on-disk span so a
    /// codec cannot read into the next section of the file.
    pub fn decompress_from<R: Read>(self, mut source: R, uncompressed_len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; uncompressed_len];
        match self {
            Compression::None => {
                source.read_exact(&mut buf)?;
            }
            #[cfg(feature = "gzip")]
            Compression::Gz => {
                let mut compressed = Vec::new();
                source.read_to_end(&mut compressed)?;
                let mut decompressor = gz_decompressors().take();
                decompressor.reset(true);
                let mut input = compressed.as_slice();
                loop {
                    let written = decompressor.total_out() as usize;
                    let before_in = decompressor.total_in();
                    let status = decompressor
                        .decompress(input, &mut buf[written..], flate2::FlushDecompress::Finish)
                        .map_err(|e| Error::decompression_failed(e.to_string()))?;
                    let consumed = (decompressor.total_in() - before_in) as usize;
                    let produced = decompressor.total_out() as usize - written;
                    input = &input[consumed..];
                    match status {
                        flate2::Status::StreamEnd => break,
                        // No movement on either side means a truncated stream
                        // or one larger than the recorded size.
                        _ if consumed == 0 && produced == 0 => {
                            return Err(Error::decompression_failed(
                                "deflate stream did not terminate at the expected size",
                            ));
                        }
                        _ => {}
                    }
                }
                if decompressor.total_out() as usize != uncompressed_len {
                    return Err(Error::decompression_failed(format!(
                        "expected {} bytes, codec produced {}",
                        uncompressed_len,
                        decompressor.total_out()
                    )));
                }
            }
            #[cfg(feature = "snappy")]
            Compression::Snappy => {
                let mut compressed = Vec::new();
                source.read_to_end(&mut compressed)?;
                let mut decoder = snappy_decoders().take();
                let n = decoder
                    .decompress(&compressed, &mut buf)
                    .map_err(|e| Error::decompression_failed(e.to_string()))?;
                if n != uncompressed_len {
                    return Err(Error::decompression_failed(format!(
                        "expected {} bytes, codec produced {}",
                        uncompressed_len, n
                    )));
                }
            }
        }
        Ok(buf)
    }
}

impl Default for Compression {
    fn default() -> Self {
        Compression::None
    }
}

/// Names of the codecs compiled into this build.
pub fn supported_compressions() -> Vec<&'static str> {
    let mut names = vec![Compression::None.name()];
    #[cfg(feature = "gzip")]
    names.push(Compression::Gz.name());
    #[cfg(feature = "snappy")]
    names.push(Compression::Snappy.name());
    names
}

/// Retained pool entries per resource kind.
const POOL_CAPACITY: usize = 16;

/// A small thread-safe pool of reusable codec resources.
///
/// [`take`](Pool::take) hands out a guard that returns the resource on drop,
/// so a resource makes it back into the pool on every exit path.
pub struct Pool<T> {
    items: Mutex<Vec<T>>,
    make: fn() -> T,
}

impl<T> Pool<T> {
    /// Create an empty pool that builds fresh resources with `make`.
    pub fn new(make: fn() -> T) -> Self {
        Self { items: Mutex::new(Vec::new()), make }
    }

    /// Borrow a resource, constructing one if the pool is empty.
    pub fn take(&self) -> Pooled<'_, T> {
        let item = self.items.lock().pop().unwrap_or_else(self.make);
        Pooled { pool: self, item: Some(item) }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.items.lock().len()
    }
}

/// Scoped borrow of a pooled resource.
pub struct Pooled<'a, T> {
    pool: &'a Pool<T>,
    item: Option<T>,
}

impl<T> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().unwrap()
    }
}

impl<T> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.item.as_mut().unwrap()
    }
}

impl<T> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(item) = self.item.take() {
            let mut items = self.pool.items.lock();
            if items.len() < POOL_CAPACITY {
                items.push(item);
            }
        }
    }
}

#[cfg(feature = "gzip")]
fn gz_compressors() -> &'static Pool<flate2::Compress> {
    static POOL: Lazy<Pool<flate2::Compress>> =
        Lazy::new(|| Pool::new(|| flate2::Compress::new(flate2::Compression::default(), true)));
    &POOL
}

#[cfg(feature = "gzip")]
fn gz_decompressors() -> &'static Pool<flate2::Decompress> {
    static POOL: Lazy<Pool<flate2::Decompress>> =
        Lazy::new(|| Pool::new(|| flate2::Decompress::new(true)));
    &POOL
}

#[cfg(feature = "snappy")]
fn snappy_encoders() -> &'static Pool<snap::raw::Encoder> {
    static POOL: Lazy<Pool<snap::raw::Encoder>> = Lazy::new(|| Pool::new(snap::raw::Encoder::new));
    &POOL
}

#[cfg(feature = "snappy")]
fn snappy_decoders() -> &'static Pool<snap::raw::Decoder> {
    static POOL: Lazy<Pool<snap::raw::Decoder>> = Lazy::new(|| Pool::new(snap::raw::Decoder::new));
    &POOL
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_ordinals_are_stable() {
        assert_eq!(Compression::None.ordinal(), 0);
        assert_eq!(Compression::from_ordinal(0), Some(Compression::None));
        #[cfg(feature = "gzip")]
        {
            assert_eq!(Compression::Gz.ordinal(), 1);
            assert_eq!(Compression::from_ordinal(1), Some(Compression::Gz));
        }
        #[cfg(feature = "snappy")]
        {
            assert_eq!(Compression::Snappy.ordinal(), 2);
            assert_eq!(Compression::from_ordinal(2), Some(Compression::Snappy));
        }
        assert_eq!(Compression::from_ordinal(99), None);
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(Compression::by_name("none"), Some(Compression::None));
        assert_eq!(Compression::by_name("lzo"), None);
        assert!(supported_compressions().contains(&"none"));
    }

    fn round_trip(codec: Compression, payload: &[u8]) {
        let mut sink = Vec::new();
        let compressed_len = codec.compress_into(payload, &mut sink).unwrap();
        assert_eq!(compressed_len, sink.len() as u64);

        let restored = codec.decompress_from(Cursor::new(sink), payload.len()).unwrap();
        assert_eq!(restored, payload);
    }

    #[test]
    fn test_none_round_trip() {
        round_trip(Compression::None, b"uncompressed payload bytes");
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_gz_round_trip() {
        let payload: Vec<u8> = b"abcdefgh".repeat(1000);
        round_trip(Compression::Gz, &payload);
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_gz_pooled_state_resets_between_blocks() {
        // Consecutive blocks reuse the same pooled deflate state; each must
        // come back as an independent, complete stream.
        round_trip(Compression::Gz, &b"first block contents".repeat(500));
        round_trip(Compression::Gz, &b"second, rather different contents".repeat(300));
        round_trip(Compression::Gz, b"short");
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_gz_corrupt_input() {
        let payload: Vec<u8> = b"abcdefgh".repeat(200);
        let mut sink = Vec::new();
        Compression::Gz.compress_into(&payload, &mut sink).unwrap();
        sink.truncate(sink.len() / 2);

        let err = Compression::Gz
            .decompress_from(Cursor::new(sink), payload.len())
            .unwrap_err();
        assert!(matches!(err, Error::DecompressionFailed(_)));
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn test_snappy_round_trip() {
        let payload: Vec<u8> = b"abcdefgh".repeat(1000);
        round_trip(Compression::Snappy, &payload);
    }

    #[cfg(feature = "snappy")]
    #[test]
    fn test_snappy_corrupt_input() {
        let err = Compression::Snappy
            .decompress_from(Cursor::new(vec![0xFF, 0xFE, 0xFD]), 16)
            .unwrap_err();
        assert!(matches!(err, Error::DecompressionFailed(_)));
    }

    #[test]
    fn test_pool_returns_on_drop() {
        let pool: Pool<Vec<u8>> = Pool::new(Vec::new);
        {
            let mut a = pool.take();
            a.push(1);
            let _b = pool.take();
            assert_eq!(pool.len(), 0);
        }
        assert_eq!(pool.len(), 2);
        // A further borrow reuses a pooled resource rather than growing.
        drop(pool.take());
        assert_eq!(pool.len(), 2);
    }
}
