//! The block index: an in-memory sorted array mapping each block's first key
//! to its file offset and uncompressed size.
//!
//! Because the index stores the *first* key of every block, a binary-search
//! miss resolves to the predecessor block, which is the only block that can
//! contain the probed key. Two instances exist per file: the data-block index
//! (ordered by the file's comparator) and the meta-block index (always
//! ordered byte-wise by block name).

use crate::comparator::Comparator;
use crate::encoding;
use crate::error::{Error, Result};
use crate::{INDEX_BLOCK_MAGIC, MAGIC_LENGTH};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Seek, SeekFrom, Write};
use std::sync::Arc;

/// Rough heap cost of the index struct itself plus its three arrays.
const BASE_HEAP_SIZE: usize = 4 * 8;

/// Sorted index over the blocks of one file section.
pub struct BlockIndex {
    first_keys: Vec<Vec<u8>>,
    offsets: Vec<u64>,
    sizes: Vec<u32>,
    comparator: Arc<dyn Comparator>,
    heap_size: usize,
}

impl BlockIndex {
    /// An empty index ordered by `comparator`.
    pub fn new(comparator: Arc<dyn Comparator>) -> Self {
        Self {
            first_keys: Vec::new(),
            offsets: Vec::new(),
            sizes: Vec::new(),
            comparator,
            heap_size: BASE_HEAP_SIZE,
        }
    }

    /// Append an entry. Blocks are produced in key order, so entries arrive
    /// already sorted.
    pub fn add(&mut self, first_key: Vec<u8>, offset: u64, uncompressed_size: u32) {
        self.heap_size += 2 * 4 + first_key.len();
        self.first_keys.push(first_key);
        self.offsets.push(offset);
        self.sizes.push(uncompressed_size);
    }

    /// Number of indexed blocks.
    pub fn count(&self) -> usize {
        self.first_keys.len()
    }

    /// True if no blocks are indexed.
    pub fn is_empty(&self) -> bool {
        self.first_keys.is_empty()
    }

    /// First key of block `i`.
    pub fn first_key(&self, i: usize) -> &[u8] {
        &self.first_keys[i]
    }

    /// File offset of block `i`.
    pub fn offset(&self, i: usize) -> u64 {
        self.offsets[i]
    }

    /// Uncompressed size of block `i`, magic included.
    pub fn uncompressed_size(&self, i: usize) -> u32 {
        self.sizes[i]
    }

    /// Estimated heap footprint in bytes, for memory-pressure accounting.
    pub fn heap_size(&self) -> usize {
        self.heap_size
    }

    /// Index of the block that may contain `key`, or `None` if the key
    /// precedes every key in the file.
    ///
    /// An exact match on a block's first key returns that block; otherwise
    /// the predecessor block is returned, since any key between two first
    /// keys can only live in the earlier block.
    pub fn block_containing_key(&self, key: &[u8]) -> Option<usize> {
        match self
            .first_keys
            .binary_search_by(|probe| self.comparator.compare(probe, key))
        {
            Ok(pos) => Some(pos),
            Err(0) => None,
            Err(ins) => Some(ins - 1),
        }
    }

    /// Approximate median key, taken from block boundaries only.
    pub fn midkey(&self) -> Result<&[u8]> {
        if self.first_keys.is_empty() {
            return Err(Error::Empty);
        }
        Ok(&self.first_keys[(self.count() - 1) / 2])
    }

    /// Write an index section: the index magic, then per entry the block
    /// offset, uncompressed size, and length-prefixed first key.
    ///
    /// Writes nothing when `keys` is empty. The two ends of this
    /// serialization must stay in step with [`read_index`](Self::read_index).
    pub fn write_index<W: Write>(
        w: &mut W,
        keys: &[Vec<u8>],
        offsets: &[u64],
        sizes: &[u32],
    ) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        w.write_all(&INDEX_BLOCK_MAGIC)?;
        for i in 0..keys.len() {
            w.write_u64::<BigEndian>(offsets[i])?;
            w.write_u32::<BigEndian>(sizes[i])?;
            encoding::write_byte_array(w, &keys[i])?;
        }
        Ok(())
    }

    /// Read an index of `count` entries starting at `offset`.
    ///
    /// A zero-entry index occupies no bytes, so nothing is read for it.
    pub fn read_index<R: Read + Seek>(
        comparator: Arc<dyn Comparator>,
        source: &mut R,
        offset: u64,
        count: usize,
    ) -> Result<Self> {
        let mut index = Self::new(comparator);
        if count == 0 {
            return Ok(index);
        }

        source.seek(SeekFrom::Start(offset))?;
        let mut magic = [0u8; MAGIC_LENGTH];
        source.read_exact(&mut magic)?;
        if magic != INDEX_BLOCK_MAGIC {
            return Err(Error::bad_magic("block index"));
        }

        for _ in 0..count {
            let block_offset = source.read_u64::<BigEndian>()?;
            let size = source.read_u32::<BigEndian>()?;
            let key = encoding::read_byte_array(source)?;
            index.add(key, block_offset, size);
        }
        Ok(index)
    }
}

impl std::fmt::Debug for BlockIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockIndex")
            .field("count", &self.count())
            .field("comparator", &self.comparator.id())
            .field("heap_size", &self.heap_size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::lexicographic;
    use std::io::Cursor;

    fn sample_index() -> BlockIndex {
        let mut index = BlockIndex::new(lexicographic());
        index.add(b"apple".to_vec(), 0, 100);
        index.add(b"mango".to_vec(), 100, 120);
        index.add(b"peach".to_vec(), 220, 90);
        index
    }

    #[test]
    fn test_block_containing_key() {
        let index = sample_index();

        // Exact first-key hits.
        assert_eq!(index.block_containing_key(b"apple"), Some(0));
        assert_eq!(index.block_containing_key(b"mango"), Some(1));
        assert_eq!(index.block_containing_key(b"peach"), Some(2));

        // Keys between first keys resolve to the predecessor block.
        assert_eq!(index.block_containing_key(b"banana"), Some(0));
        assert_eq!(index.block_containing_key(b"nectarine"), Some(1));

        // Past the last first key: the last block may still contain it.
        assert_eq!(index.block_containing_key(b"zucchini"), Some(2));

        // Before the first key of the file.
        assert_eq!(index.block_containing_key(b"aardvark"), None);
    }

    #[test]
    fn test_midkey() {
        let index = sample_index();
        assert_eq!(index.midkey().unwrap(), b"mango");

        let empty = BlockIndex::new(lexicographic());
        assert!(matches!(empty.midkey().unwrap_err(), Error::Empty));
    }

    #[test]
    fn test_serialize_round_trip() {
        let index = sample_index();
        let keys: Vec<Vec<u8>> = (0..index.count()).map(|i| index.first_key(i).to_vec()).collect();
        let offsets: Vec<u64> = (0..index.count()).map(|i| index.offset(i)).collect();
        let sizes: Vec<u32> = (0..index.count()).map(|i| index.uncompressed_size(i)).collect();

        let mut buf = Vec::new();
        BlockIndex::write_index(&mut buf, &keys, &offsets, &sizes).unwrap();

        let restored =
            BlockIndex::read_index(lexicographic(), &mut Cursor::new(buf), 0, 3).unwrap();
        assert_eq!(restored.count(), 3);
        for i in 0..3 {
            assert_eq!(restored.first_key(i), index.first_key(i));
            assert_eq!(restored.offset(i), index.offset(i));
            assert_eq!(restored.uncompressed_size(i), index.uncompressed_size(i));
        }
    }

    #[test]
    fn test_empty_index_writes_nothing() {
        let mut buf = Vec::new();
        BlockIndex::write_index(&mut buf, &[], &[], &[]).unwrap();
        assert!(buf.is_empty());

        let restored =
            BlockIndex::read_index(lexicographic(), &mut Cursor::new(buf), 0, 0).unwrap();
        assert!(restored.is_empty());
    }

    #[test]
    fn test_read_index_bad_magic() {
        let keys = vec![b"a".to_vec()];
        let mut buf = Vec::new();
        BlockIndex::write_index(&mut buf, &keys, &[0], &[10]).unwrap();
        buf[0] ^= 0xFF;

        let err =
            BlockIndex::read_index(lexicographic(), &mut Cursor::new(buf), 0, 1).unwrap_err();
        assert!(matches!(err, Error::BadMagic(_)));
    }

    #[test]
    fn test_heap_size_grows_with_entries() {
        let mut index = BlockIndex::new(lexicographic());
        let before = index.heap_size();
        index.add(b"key".to_vec(), 0, 10);
        assert_eq!(index.heap_size(), before + 8 + 3);
    }
}
