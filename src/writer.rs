//! Streaming writer producing a well-formed file from sorted appends.
//!
//! Entries are buffered into the current block and the block is pushed
//! through the compression codec once its uncompressed size reaches the
//! target. Closing the writer appends, in order: the final data block, any
//! buffered meta blocks, the file-info map, the data-block index, the
//! meta-block index, and the fixed trailer.

use crate::config::WriterOptions;
use crate::encoding::CountingWriter;
use crate::error::{Error, Result};
use crate::fileinfo::{self, FileInfo};
use crate::index::BlockIndex;
use crate::trailer::Trailer;
use crate::{DATA_BLOCK_MAGIC, MAGIC_LENGTH, MAX_KEY_LENGTH, META_BLOCK_MAGIC};
use bytes::{BufMut, BytesMut};
use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// The data block currently being filled.
///
/// The buffer holds the uncompressed block bytes, magic included, so its
/// length is exactly the uncompressed size recorded in the index.
struct CurrentBlock {
    begin: u64,
    first_key: Vec<u8>,
    buf: BytesMut,
}

impl CurrentBlock {
    fn new(begin: u64, first_key: Vec<u8>) -> Self {
        let mut buf = BytesMut::new();
        buf.put_slice(&DATA_BLOCK_MAGIC);
        Self { begin, first_key, buf }
    }
}

/// Writer builds a file from key/value pairs appended in comparator order.
///
/// A writer is single-use: [`close`](Writer::close) consumes it. A write that
/// fails midway leaves the sink in an undefined state and the partial file
/// must be discarded.
///
/// Usage:
/// ```no_run
/// use hfile::Writer;
///
/// # fn main() -> hfile::Result<()> {
/// let mut writer = Writer::create("table.hf")?;
/// writer.append(b"key1", b"value1")?;
/// writer.append(b"key2", b"value2")?;
/// writer.close()?;
/// # Ok(())
/// # }
/// ```
pub struct Writer<W: Write> {
    sink: CountingWriter<W>,
    name: String,
    options: WriterOptions,

    block: Option<CurrentBlock>,
    last_key: Option<Vec<u8>>,

    entry_count: u32,
    key_length_total: u64,
    value_length_total: u64,
    total_uncompressed_bytes: u64,

    block_keys: Vec<Vec<u8>>,
    block_offsets: Vec<u64>,
    block_sizes: Vec<u32>,

    meta_blocks: Vec<(Vec<u8>, Vec<u8>)>,
    fileinfo: FileInfo,
}

impl Writer<BufWriter<File>> {
    /// Create a file at `path` with default options.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_options(path, WriterOptions::default())
    }

    /// Create a file at `path` with the given options.
    pub fn create_with_options<P: AsRef<Path>>(path: P, options: WriterOptions) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let file = File::create(path)?;
        let mut writer = Self::new(BufWriter::new(file), options)?;
        writer.name = name;
        Ok(writer)
    }
}

impl<W: Write> Writer<W> {
    /// Wrap an arbitrary byte sink. The writer tracks its own offset, so the
    /// sink must be positioned at the start of the file-to-be.
    pub fn new(sink: W, options: WriterOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            sink: CountingWriter::new(sink),
            name: "<sink>".to_string(),
            options,
            block: None,
            last_key: None,
            entry_count: 0,
            key_length_total: 0,
            value_length_total: 0,
            total_uncompressed_bytes: 0,
            block_keys: Vec::new(),
            block_offsets: Vec::new(),
            block_sizes: Vec::new(),
            meta_blocks: Vec::new(),
            fileinfo: FileInfo::new(),
        })
    }

    /// Add a key/value pair.
    ///
    /// Keys must arrive strictly increasing under the writer's comparator.
    pub fn append(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.check_value(value)?;

        // Boundary check happens before the entry is written; an entry is
        // never split across blocks, so a block can overrun the target by
        // one entry.
        if self.block.as_ref().map_or(false, |b| b.buf.len() >= self.options.block_size) {
            self.finish_block()?;
        }

        let begin = self.sink.count();
        let block = self
            .block
            .get_or_insert_with(|| CurrentBlock::new(begin, key.to_vec()));

        block.buf.put_u32(key.len() as u32);
        block.buf.put_u32(value.len() as u32);
        block.buf.put_slice(key);
        block.buf.put_slice(value);

        self.key_length_total += key.len() as u64;
        self.value_length_total += value.len() as u64;
        self.last_key = Some(key.to_vec());
        self.entry_count += 1;
        Ok(())
    }

    /// Buffer a named meta block for emission during close.
    ///
    /// Meta blocks are expensive (one codec flush each); batch serialized
    /// data into few blocks rather than writing one per datum. Small metadata
    /// belongs in [`append_file_info`](Writer::append_file_info) instead.
    /// Re-using a name replaces the earlier payload.
    pub fn append_meta_block(&mut self, name: &str, bytes: &[u8]) {
        let name = name.as_bytes().to_vec();
        if let Some(entry) = self.meta_blocks.iter_mut().find(|(n, _)| *n == name) {
            entry.1 = bytes.to_vec();
        } else {
            self.meta_blocks.push((name, bytes.to_vec()));
        }
    }

    /// Add a user entry to the file-info map.
    ///
    /// Keys starting with the reserved `hfile.` prefix are rejected.
    pub fn append_file_info(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.fileinfo.append(key, value)
    }

    /// Number of entries appended so far.
    pub fn entry_count(&self) -> u32 {
        self.entry_count
    }

    /// Finalize the file and flush the sink. Returns the total file length.
    pub fn close(mut self) -> Result<u64> {
        self.finish_block()?;

        let mut trailer = Trailer::new();

        // Meta blocks, ordered by name so the meta index can binary search.
        let mut meta_blocks = std::mem::take(&mut self.meta_blocks);
        meta_blocks.sort_by(|a, b| a.0.cmp(&b.0));
        let mut meta_offsets = Vec::with_capacity(meta_blocks.len());
        let mut meta_sizes = Vec::with_capacity(meta_blocks.len());
        for (_, payload) in &meta_blocks {
            meta_offsets.push(self.sink.count());
            meta_sizes.push((MAGIC_LENGTH + payload.len()) as u32);
            self.write_meta_block(payload)?;
        }

        trailer.fileinfo_offset = self.write_fileinfo()?;

        trailer.data_index_offset = self.sink.count();
        BlockIndex::write_index(
            &mut self.sink,
            &self.block_keys,
            &self.block_offsets,
            &self.block_sizes,
        )?;

        if !meta_blocks.is_empty() {
            trailer.meta_index_offset = self.sink.count();
            let names: Vec<Vec<u8>> = meta_blocks.iter().map(|(n, _)| n.clone()).collect();
            BlockIndex::write_index(&mut self.sink, &names, &meta_offsets, &meta_sizes)?;
        }

        trailer.data_index_count = self.block_keys.len() as u32;
        trailer.meta_index_count = meta_blocks.len() as u32;
        trailer.total_uncompressed_bytes = self.total_uncompressed_bytes;
        trailer.entry_count = self.entry_count;
        trailer.compression_codec = self.options.compression.ordinal();
        trailer.serialize(&mut self.sink)?;

        self.sink.flush()?;
        log::debug!(
            "closed writer={} entries={} blocks={} length={}",
            self.name,
            self.entry_count,
            trailer.data_index_count,
            self.sink.count()
        );
        Ok(self.sink.count())
    }

    /// Compress the current block into the sink and record its index entry.
    fn finish_block(&mut self) -> Result<()> {
        let block = match self.block.take() {
            Some(block) => block,
            None => return Ok(()),
        };
        let uncompressed = block.buf.len() as u32;
        self.options.compression.compress_into(&block.buf, &mut self.sink)?;

        self.block_keys.push(block.first_key);
        self.block_offsets.push(block.begin);
        self.block_sizes.push(uncompressed);
        self.total_uncompressed_bytes += uncompressed as u64;
        Ok(())
    }

    fn write_meta_block(&mut self, payload: &[u8]) -> Result<()> {
        let mut buf = BytesMut::with_capacity(MAGIC_LENGTH + payload.len());
        buf.put_slice(&META_BLOCK_MAGIC);
        buf.put_slice(payload);
        self.options.compression.compress_into(&buf, &mut self.sink)?;
        Ok(())
    }

    /// Inject the engine's reserved entries and serialize the file-info map.
    /// Returns the offset it was written at.
    fn write_fileinfo(&mut self) -> Result<u64> {
        if let Some(last_key) = &self.last_key {
            self.fileinfo.insert(fileinfo::LASTKEY, last_key);
        }
        let avg_key_len = match self.entry_count {
            0 => 0u32,
            n => (self.key_length_total / n as u64) as u32,
        };
        let avg_value_len = match self.entry_count {
            0 => 0u32,
            n => (self.value_length_total / n as u64) as u32,
        };
        self.fileinfo.insert(fileinfo::AVG_KEY_LEN, &avg_key_len.to_be_bytes());
        self.fileinfo.insert(fileinfo::AVG_VALUE_LEN, &avg_value_len.to_be_bytes());
        self.fileinfo
            .insert(fileinfo::COMPARATOR, self.options.comparator.id().as_bytes());

        let pos = self.sink.count();
        self.fileinfo.serialize(&mut self.sink)?;
        Ok(pos)
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(Error::invalid_key("key cannot be empty"));
        }
        if key.len() > MAX_KEY_LENGTH {
            return Err(Error::invalid_key(format!(
                "key length {} > maximum {}",
                key.len(),
                MAX_KEY_LENGTH
            )));
        }
        if let Some(last_key) = &self.last_key {
            if self.options.comparator.compare(last_key, key) != Ordering::Less {
                return Err(Error::out_of_order(format!(
                    "key {:?} is not strictly greater than the previous key {:?}",
                    String::from_utf8_lossy(key),
                    String::from_utf8_lossy(last_key)
                )));
            }
        }
        Ok(())
    }

    fn check_value(&self, value: &[u8]) -> Result<()> {
        if value.len() > i32::MAX as usize {
            return Err(Error::invalid_value(format!("value length {} too large", value.len())));
        }
        Ok(())
    }
}

impl<W: Write> std::fmt::Display for Writer<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "writer={}, compression={}",
            self.name,
            self.options.compression.name()
        )
    }
}
