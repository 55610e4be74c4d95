//! Scanner positioning over the logical key sequence of a file.
//!
//! A scanner owns at most one decoded block at a time plus a cursor into it.
//! The cursor always points at the key bytes of the current entry; the entry
//! header (two 4-byte lengths) sits just before it. A scanner starts out
//! unseeked; queries in that state fail, and `next` past the last entry
//! returns the scanner to it.

use crate::error::{Error, Result};
use crate::reader::Reader;
use bytes::Bytes;
use std::cmp::Ordering;
use std::io::{Read, Seek};

/// Size of an entry header: 4-byte key length plus 4-byte value length.
const ENTRY_HEADER_SIZE: usize = 8;

/// Result of [`Scanner::seek_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// The key precedes every key in the file; the scanner is not positioned.
    Before,
    /// The cursor sits exactly on the requested key.
    Exact,
    /// The cursor sits on the greatest key less than the requested key.
    Previous,
}

/// Scanner over the entries of one file, in comparator order.
///
/// Multiple scanners over one reader may run in parallel threads; each
/// scanner itself is single-threaded.
pub struct Scanner<'r, R> {
    reader: &'r Reader<R>,
    /// Currently loaded block, magic already stripped. `None` means unseeked.
    block: Option<Bytes>,
    curr_block: usize,
    /// Offset of the current entry's key bytes within `block`.
    pos: usize,
    curr_key_len: usize,
    curr_value_len: usize,
    block_fetches: u64,
}

impl<'r, R: Read + Seek> Scanner<'r, R> {
    pub(crate) fn new(reader: &'r Reader<R>) -> Self {
        Self {
            reader,
            block: None,
            curr_block: 0,
            pos: 0,
            curr_key_len: 0,
            curr_value_len: 0,
            block_fetches: 0,
        }
    }

    /// True once a seek has positioned the scanner.
    pub fn is_seeked(&self) -> bool {
        self.block.is_some()
    }

    /// Number of blocks this scanner has loaded from its reader.
    pub fn block_fetches(&self) -> u64 {
        self.block_fetches
    }

    /// The key under the cursor, as a view into the block buffer.
    pub fn key(&self) -> Result<&[u8]> {
        let block = self.block.as_ref().ok_or(Error::NotSeeked)?;
        block
            .get(self.pos..self.pos + self.curr_key_len)
            .ok_or_else(|| Error::corrupt("entry key extends past the end of its block"))
    }

    /// The value under the cursor, as a view into the block buffer.
    pub fn value(&self) -> Result<&[u8]> {
        let block = self.block.as_ref().ok_or(Error::NotSeeked)?;
        let start = self.pos + self.curr_key_len;
        block
            .get(start..start + self.curr_value_len)
            .ok_or_else(|| Error::corrupt("entry value extends past the end of its block"))
    }

    /// Position on the first entry of the file.
    ///
    /// Returns `false` on an empty file.
    pub fn seek_to_first(&mut self) -> Result<bool> {
        if self.reader.block_count()? == 0 {
            return Ok(false);
        }
        self.load_block(0)?;
        let block = self.current_block()?;
        let (key_len, value_len) = entry_header(&block, 0)?;
        self.set_position(ENTRY_HEADER_SIZE, key_len, value_len);
        Ok(true)
    }

    /// Position on `key`, or on its greatest predecessor.
    ///
    /// `Before` is returned, and the position left untouched, when `key`
    /// precedes every key in the file.
    pub fn seek_to(&mut self, key: &[u8]) -> Result<SeekOutcome> {
        let block = match self.reader.block_containing_key(key)? {
            Some(block) => block,
            None => return Ok(SeekOutcome::Before),
        };
        self.load_block(block)?;
        self.block_seek(key, false)
    }

    /// Position on the entry just before `key`.
    ///
    /// Returns `false` when no entry precedes `key`, which includes `key`
    /// being the first key of the file.
    pub fn seek_before(&mut self, key: &[u8]) -> Result<bool> {
        let mut block = match self.reader.block_containing_key(key)? {
            Some(block) => block,
            None => return Ok(false),
        };
        let comparator = self.reader.comparator()?;
        if comparator.compare(self.reader.index_first_key(block)?, key) == Ordering::Equal {
            // The key opens this block, so its predecessor is the last entry
            // of the block before it.
            if block == 0 {
                return Ok(false);
            }
            block -= 1;
        }
        self.load_block(block)?;
        self.block_seek(key, true)?;
        Ok(true)
    }

    /// Advance to the next entry, crossing block boundaries as needed.
    ///
    /// Returns `false` at the end of the file, after which the scanner is
    /// unseeked again.
    pub fn next(&mut self) -> Result<bool> {
        let block = self.block.clone().ok_or(Error::NotSeeked)?;
        let next_pos = self.pos + self.curr_key_len + self.curr_value_len;

        if next_pos >= block.len() {
            self.curr_block += 1;
            if self.curr_block >= self.reader.block_count()? {
                self.clear();
                return Ok(false);
            }
            let next_block = self.reader.read_block(self.curr_block)?;
            self.block_fetches += 1;
            let (key_len, value_len) = entry_header(&next_block, 0)?;
            self.block = Some(next_block);
            self.set_position(ENTRY_HEADER_SIZE, key_len, value_len);
            return Ok(true);
        }

        let (key_len, value_len) = entry_header(&block, next_pos)?;
        self.set_position(next_pos + ENTRY_HEADER_SIZE, key_len, value_len);
        Ok(true)
    }

    /// Linear seek within the loaded block.
    ///
    /// Walks entries from the top of the block comparing each key with the
    /// target. On an overshoot it backs up by `last_len + 16`: the previous
    /// entry's payload plus two consumed header pairs. Running off the end of
    /// the block instead backs up by `last_len + 8`, because the final
    /// header pair was consumed but no further one was read. The asymmetry is
    /// load-bearing; both constants are relative to the post-magic buffer.
    fn block_seek(&mut self, key: &[u8], seek_before: bool) -> Result<SeekOutcome> {
        let block = self.current_block()?;
        let comparator = self.reader.comparator()?;
        let mut pos = 0usize;
        let mut last_len = 0usize;

        loop {
            let (key_len, value_len) = entry_header(&block, pos)?;
            let key_start = pos + ENTRY_HEADER_SIZE;
            let entry_key = block
                .get(key_start..key_start + key_len)
                .ok_or_else(|| Error::corrupt("entry key extends past the end of its block"))?;

            match comparator.compare(key, entry_key) {
                Ordering::Equal => {
                    if seek_before {
                        return self.adopt_entry_at(&block, rewind(key_start, last_len + 16)?);
                    }
                    self.set_position(key_start, key_len, value_len);
                    return Ok(SeekOutcome::Exact);
                }
                Ordering::Less => {
                    // Overshot: the target sorts before this entry, so the
                    // previous entry is the greatest key below it.
                    return self.adopt_entry_at(&block, rewind(key_start, last_len + 16)?);
                }
                Ordering::Greater => {
                    pos = key_start + key_len + value_len;
                    last_len = key_len + value_len;
                    if pos >= block.len() {
                        break;
                    }
                }
            }
        }

        // The target sorts after every key in the block; adopt the final
        // entry. Only one header pair to step back over here.
        self.adopt_entry_at(&block, rewind(pos, last_len + ENTRY_HEADER_SIZE)?)
    }

    /// Make the entry whose header starts at `header_pos` the current one.
    fn adopt_entry_at(&mut self, block: &Bytes, header_pos: usize) -> Result<SeekOutcome> {
        let (key_len, value_len) = entry_header(block, header_pos)?;
        self.set_position(header_pos + ENTRY_HEADER_SIZE, key_len, value_len);
        Ok(SeekOutcome::Previous)
    }

    /// Ensure `block` is the loaded block. Reloading the same block is skipped;
    /// intra-block seeks restart from the top of the buffer anyway.
    fn load_block(&mut self, block: usize) -> Result<()> {
        match &self.block {
            Some(_) if self.curr_block == block => {}
            _ => {
                self.block = Some(self.reader.read_block(block)?);
                self.curr_block = block;
                self.block_fetches += 1;
            }
        }
        Ok(())
    }

    fn current_block(&self) -> Result<Bytes> {
        self.block.clone().ok_or(Error::NotSeeked)
    }

    fn set_position(&mut self, pos: usize, key_len: usize, value_len: usize) {
        self.pos = pos;
        self.curr_key_len = key_len;
        self.curr_value_len = value_len;
    }

    fn clear(&mut self) {
        self.block = None;
        self.curr_block = 0;
        self.pos = 0;
        self.curr_key_len = 0;
        self.curr_value_len = 0;
    }
}

/// Read the two big-endian length fields of the entry header at `pos`.
fn entry_header(block: &[u8], pos: usize) -> Result<(usize, usize)> {
    let header = block
        .get(pos..pos + ENTRY_HEADER_SIZE)
        .ok_or_else(|| Error::corrupt("entry header extends past the end of its block"))?;
    let key_len = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as usize;
    let value_len = u32::from_be_bytes([header[4], header[5], header[6], header[7]]) as usize;
    Ok((key_len, value_len))
}

/// Step the cursor back by `amount`, failing on underflow rather than
/// wrapping. Underflow here means the block contents disagree with the index.
fn rewind(pos: usize, amount: usize) -> Result<usize> {
    pos.checked_sub(amount)
        .ok_or_else(|| Error::corrupt("seek backtracked past the start of a block"))
}
