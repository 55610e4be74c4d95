//! # hfile - An Immutable, Sorted, Block-Structured Key/Value File Format
//!
//! A file of sorted key/value pairs; both keys and values are uninterpreted
//! byte arrays. A streaming [`Writer`] chunks appended entries into
//! compressed blocks, and a [`Reader`] locates keys by binary search over a
//! block index, decoding blocks lazily as a [`Scanner`] moves through them.
//!
//! ## File Format
//!
//! ```text
//! [Data Block 1]
//! [Data Block 2]
//! ...
//! [Data Block N]
//! [Meta Block 1]      // named auxiliary payloads (optional)
//! ...
//! [FileInfo]          // small ordered metadata map
//! [Data Block Index]  // present iff there are data blocks
//! [Meta Block Index]  // present iff there are meta blocks
//! [Trailer: 60B]      // locates every other section
//! ```
//!
//! Every section opens with an 8-byte magic; a mismatch on read is a hard
//! error. An empty file is just `[FileInfo][Trailer]`.
//!
//! ## Block Format
//!
//! A data block is the block magic followed by entries, each encoded as a
//! 4-byte big-endian key length, 4-byte big-endian value length, then the
//! key and value bytes. Blocks are cut when their uncompressed size reaches
//! the configured target (64 KiB by default), so a block may overrun the
//! target by one entry but an entry never spans blocks.
//!
//! ## Picking a block size
//!
//! Larger blocks favor sequential scans; smaller blocks favor point reads
//! but grow the in-memory index and cost one codec flush each. Between 8 KiB
//! and 1 MiB is reasonable for general use.
//!
//! ## Example
//!
//! ```no_run
//! use hfile::{Reader, Writer};
//!
//! # fn main() -> hfile::Result<()> {
//! let mut writer = Writer::create("table.hf")?;
//! writer.append(b"apple", b"red")?;
//! writer.append(b"banana", b"yellow")?;
//! writer.close()?;
//!
//! let mut reader = Reader::open("table.hf", None)?;
//! reader.load_metadata()?;
//! let mut scanner = reader.scanner();
//! if scanner.seek_to(b"apple")? == hfile::SeekOutcome::Exact {
//!     println!("apple => {:?}", scanner.value()?);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cache;
pub mod comparator;
pub mod compress;
pub mod config;
pub mod encoding;
pub mod error;
pub mod fileinfo;
pub mod index;
pub mod reader;
pub mod scanner;
pub mod trailer;
pub mod writer;

pub use cache::{BlockCache, CacheKey};
pub use comparator::{Comparator, LexicographicComparator};
pub use compress::{supported_compressions, Compression};
pub use config::WriterOptions;
pub use error::{Error, Result};
pub use fileinfo::FileInfo;
pub use reader::Reader;
pub use scanner::{Scanner, SeekOutcome};
pub use trailer::{Trailer, TRAILER_SIZE};
pub use writer::Writer;

/// Length of every section magic, in bytes.
pub const MAGIC_LENGTH: usize = 8;

/// Sentinel opening every data block.
pub const DATA_BLOCK_MAGIC: [u8; MAGIC_LENGTH] = *b"DATABLK*";

/// Sentinel opening a serialized block index.
pub const INDEX_BLOCK_MAGIC: [u8; MAGIC_LENGTH] = [b'I', b'D', b'X', b'B', b'L', b'K', 41, 43];

/// Sentinel opening every meta block.
pub const META_BLOCK_MAGIC: [u8; MAGIC_LENGTH] = [b'M', b'E', b'T', b'A', b'B', b'L', b'K', 99];

/// Sentinel opening the trailer.
pub const TRAILER_MAGIC: [u8; MAGIC_LENGTH] = [b'T', b'R', b'A', b'B', b'L', b'K', 34, 36];

/// Maximum length of a key, in bytes.
pub const MAX_KEY_LENGTH: usize = 64 * 1024;

/// Default target uncompressed block size, in bytes.
pub const DEFAULT_BLOCK_SIZE: usize = 64 * 1024;
