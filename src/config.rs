//! Configuration options for writing a file.

use crate::comparator::{self, Comparator};
use crate::compress::Compression;
use crate::error::{Error, Result};
use crate::DEFAULT_BLOCK_SIZE;
use std::sync::Arc;

/// Options controlling how a [`Writer`](crate::Writer) lays out a file.
#[derive(Clone)]
pub struct WriterOptions {
    /// Target uncompressed size of a data block (in bytes).
    /// Blocks may overrun this by one entry.
    /// Default: 64 KiB
    pub block_size: usize,

    /// Compression codec applied to every block.
    /// Default: `Compression::None`
    pub compression: Compression,

    /// Total order the appended keys must follow. Its identity string is
    /// persisted so readers can resolve the same order.
    /// Default: byte-wise lexicographic
    pub comparator: Arc<dyn Comparator>,

    /// Reserve space for a bloom filter. Currently has no effect.
    /// Default: false
    pub bloom_filter: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            compression: Compression::None,
            comparator: comparator::lexicographic(),
            bloom_filter: false,
        }
    }
}

impl WriterOptions {
    /// Creates a new WriterOptions with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the target block size.
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the compression codec.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Sets the key comparator.
    pub fn comparator(mut self, comparator: Arc<dyn Comparator>) -> Self {
        self.comparator = comparator;
        self
    }

    /// Reserves bloom-filter space. Currently has no effect.
    pub fn bloom_filter(mut self, value: bool) -> Self {
        self.bloom_filter = value;
        self
    }

    /// Validates the options and returns an error if any are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 {
            return Err(Error::invalid_argument("block_size must be > 0"));
        }
        Ok(())
    }
}

impl std::fmt::Debug for WriterOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriterOptions")
            .field("block_size", &self.block_size)
            .field("compression", &self.compression)
            .field("comparator", &self.comparator.id())
            .field("bloom_filter", &self.bloom_filter)
            .finish()
    }
}
