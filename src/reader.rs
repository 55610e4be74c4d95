//! Random-access reader over a finished file.
//!
//! Opening a reader does no I/O; [`load_metadata`](Reader::load_metadata)
//! reads the trailer, the file-info map and both block indices in one pass.
//! After that the reader is immutable and may be shared across threads; data
//! blocks are decompressed lazily as scanners ask for them, optionally
//! through a shared [`BlockCache`].

use crate::cache::{BlockCache, CacheKey};
use crate::comparator::{self, Comparator};
use crate::compress::Compression;
use crate::encoding;
use crate::error::{Error, Result};
use crate::fileinfo::{self, FileInfo};
use crate::index::BlockIndex;
use crate::scanner::Scanner;
use crate::trailer::{Trailer, TRAILER_SIZE};
use crate::{DATA_BLOCK_MAGIC, MAGIC_LENGTH, META_BLOCK_MAGIC};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::fs::File;
use std::hash::{Hash, Hasher};
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Reader provides random access to a file written by [`Writer`](crate::Writer).
///
/// Usage:
/// ```no_run
/// use hfile::Reader;
///
/// # fn main() -> hfile::Result<()> {
/// let mut reader = Reader::open("table.hf", None)?;
/// reader.load_metadata()?;
/// let mut scanner = reader.scanner();
/// if scanner.seek_to_first()? {
///     println!("{:?} => {:?}", scanner.key()?, scanner.value()?);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Reader<R> {
    source: Mutex<R>,
    length: u64,
    name: String,
    file_id: u64,
    cache: Option<Arc<BlockCache>>,

    // Populated by load_metadata.
    trailer: Option<Trailer>,
    compression: Option<Compression>,
    fileinfo: Option<FileInfo>,
    data_index: Option<BlockIndex>,
    meta_index: Option<BlockIndex>,
    comparator: Option<Arc<dyn Comparator>>,
    last_key: Option<Vec<u8>>,
    avg_key_len: u32,
    avg_value_len: u32,

    cache_hits: AtomicU64,
    block_loads: AtomicU64,
}

impl Reader<File> {
    /// Open the file at `path`. No bytes are read until
    /// [`load_metadata`](Reader::load_metadata).
    pub fn open<P: AsRef<Path>>(path: P, cache: Option<Arc<BlockCache>>) -> Result<Self> {
        let name = path.as_ref().display().to_string();
        let file = File::open(path)?;
        let length = file.metadata()?.len();
        Ok(Self::new(file, length, name, cache))
    }
}

impl<R: Read + Seek> Reader<R> {
    /// Wrap an arbitrary seekable byte source of known `length`.
    ///
    /// `name` identifies this file in log output and in block-cache keys.
    pub fn new(
        source: R,
        length: u64,
        name: impl Into<String>,
        cache: Option<Arc<BlockCache>>,
    ) -> Self {
        let name = name.into();
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        let file_id = hasher.finish();
        Self {
            source: Mutex::new(source),
            length,
            name,
            file_id,
            cache,
            trailer: None,
            compression: None,
            fileinfo: None,
            data_index: None,
            meta_index: None,
            comparator: None,
            last_key: None,
            avg_key_len: 0,
            avg_value_len: 0,
            cache_hits: AtomicU64::new(0),
            block_loads: AtomicU64::new(0),
        }
    }

    /// Read the trailer, file-info map and block indices.
    ///
    /// Must be called once before any other read operation; afterwards the
    /// reader is immutable. Calling it again is a no-op.
    pub fn load_metadata(&mut self) -> Result<&FileInfo> {
        if self.fileinfo.is_some() {
            return self.require_fileinfo();
        }
        if self.length < TRAILER_SIZE as u64 {
            return Err(Error::corrupt(format!(
                "file length {} shorter than the trailer",
                self.length
            )));
        }

        let trailer = {
            let mut source = self.source.lock();
            source.seek(SeekFrom::Start(self.length - TRAILER_SIZE as u64))?;
            Trailer::deserialize(&mut *source)?
        };

        let compression = Compression::from_ordinal(trailer.compression_codec)
            .ok_or(Error::UnknownCodec(trailer.compression_codec))?;

        let fi = {
            let mut source = self.source.lock();
            source.seek(SeekFrom::Start(trailer.fileinfo_offset))?;
            FileInfo::deserialize(&mut *source)?
        };

        self.last_key = fi.get(fileinfo::LASTKEY).map(|v| v.to_vec());
        self.avg_key_len = read_stat(&fi, fileinfo::AVG_KEY_LEN)?;
        self.avg_value_len = read_stat(&fi, fileinfo::AVG_VALUE_LEN)?;

        let comparator_id = fi
            .get(fileinfo::COMPARATOR)
            .map(|v| String::from_utf8_lossy(v).into_owned())
            .ok_or_else(|| Error::UnknownComparator("<missing>".to_string()))?;
        let cmp = comparator::resolve(&comparator_id)?;

        {
            let mut source = self.source.lock();
            self.data_index = Some(BlockIndex::read_index(
                cmp.clone(),
                &mut *source,
                trailer.data_index_offset,
                trailer.data_index_count as usize,
            )?);
            // Meta-block names are always ordered byte-wise, whatever the
            // file's key comparator is.
            self.meta_index = if trailer.meta_index_count > 0 {
                Some(BlockIndex::read_index(
                    comparator::lexicographic(),
                    &mut *source,
                    trailer.meta_index_offset,
                    trailer.meta_index_count as usize,
                )?)
            } else {
                None
            };
        }

        log::debug!(
            "loaded reader={} entries={} blocks={} compression={}",
            self.name,
            trailer.entry_count,
            trailer.data_index_count,
            compression.name()
        );

        self.trailer = Some(trailer);
        self.compression = Some(compression);
        self.comparator = Some(cmp);
        self.fileinfo = Some(fi);
        self.require_fileinfo()
    }

    /// Create a scanner over this file. No seeks or reads happen on creation;
    /// dropping the scanner is all the cleanup there is.
    pub fn scanner(&self) -> Scanner<'_, R> {
        Scanner::new(self)
    }

    /// Retrieve the named meta block, decompressed and stripped of its magic.
    ///
    /// Returns `None` if the file has no meta blocks or no block of that name.
    pub fn get_meta_block(&self, name: &str) -> Result<Option<Bytes>> {
        let trailer = self.trailer()?;
        let meta_index = match &self.meta_index {
            Some(index) if !index.is_empty() => index,
            _ => return Ok(None),
        };

        let name_bytes = name.as_bytes();
        let block = match meta_index.block_containing_key(name_bytes) {
            Some(block) => block,
            None => return Ok(None),
        };
        if meta_index.first_key(block) != name_bytes {
            return Ok(None);
        }

        let offset = meta_index.offset(block);
        let end = if block == meta_index.count() - 1 {
            trailer.fileinfo_offset
        } else {
            meta_index.offset(block + 1)
        };
        let uncompressed_size = meta_index.uncompressed_size(block) as usize;

        let raw = {
            let mut source = self.source.lock();
            let bounded = encoding::bounded_range(&mut *source, offset, end - offset)?;
            self.compression()?.decompress_from(bounded, uncompressed_size)?
        };
        if raw.len() < MAGIC_LENGTH || raw[..MAGIC_LENGTH] != META_BLOCK_MAGIC {
            return Err(Error::bad_magic(format!("meta block {}", name)));
        }
        Ok(Some(Bytes::from(raw).slice(MAGIC_LENGTH..)))
    }

    /// Load data block `block`, consulting the cache first.
    ///
    /// The returned buffer starts at the first entry (the magic has been
    /// validated and stripped) and is an independent view: advancing through
    /// it never disturbs the cached copy.
    pub(crate) fn read_block(&self, block: usize) -> Result<Bytes> {
        let index = self.data_index()?;
        if block >= index.count() {
            return Err(Error::invalid_argument(format!(
                "block {} out of range, file has {}",
                block,
                index.count()
            )));
        }

        self.block_loads.fetch_add(1, Ordering::Relaxed);
        let cache_key = CacheKey::new(self.file_id, block as u64);
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(&cache_key) {
                self.cache_hits.fetch_add(1, Ordering::Relaxed);
                return Ok(cached);
            }
        }

        let trailer = self.trailer()?;
        let offset = index.offset(block);
        let end = if block == index.count() - 1 {
            // The last data block ends where the first meta block begins, or
            // at the file-info section when there are no meta blocks.
            match self.meta_index.as_ref().filter(|m| !m.is_empty()) {
                Some(meta_index) => meta_index.offset(0),
                None => trailer.fileinfo_offset,
            }
        } else {
            index.offset(block + 1)
        };
        let uncompressed_size = index.uncompressed_size(block) as usize;

        let raw = {
            let mut source = self.source.lock();
            let bounded = encoding::bounded_range(&mut *source, offset, end - offset)?;
            self.compression()?.decompress_from(bounded, uncompressed_size)?
        };
        if raw.len() < MAGIC_LENGTH || raw[..MAGIC_LENGTH] != DATA_BLOCK_MAGIC {
            return Err(Error::bad_magic(format!("data block {}", block)));
        }

        let body = Bytes::from(raw).slice(MAGIC_LENGTH..);
        if let Some(cache) = &self.cache {
            cache.insert(cache_key, body.clone());
        }
        Ok(body)
    }

    /// Index of the data block that may contain `key`; `None` when the key
    /// precedes the file.
    pub(crate) fn block_containing_key(&self, key: &[u8]) -> Result<Option<usize>> {
        Ok(self.data_index()?.block_containing_key(key))
    }

    /// Number of data blocks.
    pub(crate) fn block_count(&self) -> Result<usize> {
        Ok(self.data_index()?.count())
    }

    /// First key of data block `block`.
    pub(crate) fn index_first_key(&self, block: usize) -> Result<&[u8]> {
        Ok(self.data_index()?.first_key(block))
    }

    /// First key in the file, `None` when the file is empty.
    pub fn first_key(&self) -> Result<Option<&[u8]>> {
        let index = self.data_index()?;
        Ok(if index.is_empty() { None } else { Some(index.first_key(0)) })
    }

    /// Last key in the file, `None` when the file is empty.
    pub fn last_key(&self) -> Result<Option<&[u8]>> {
        self.require_loaded()?;
        Ok(self.last_key.as_deref())
    }

    /// Approximate median key, taken from block boundaries only.
    pub fn midkey(&self) -> Result<&[u8]> {
        self.data_index()?.midkey()
    }

    /// Number of key/value entries in the file.
    pub fn entries(&self) -> Result<u32> {
        Ok(self.trailer()?.entry_count)
    }

    /// Average key length recorded at write time.
    pub fn avg_key_len(&self) -> Result<u32> {
        self.require_loaded()?;
        Ok(self.avg_key_len)
    }

    /// Average value length recorded at write time.
    pub fn avg_value_len(&self) -> Result<u32> {
        self.require_loaded()?;
        Ok(self.avg_value_len)
    }

    /// The comparator this file's keys are ordered under.
    pub fn comparator(&self) -> Result<&Arc<dyn Comparator>> {
        self.comparator.as_ref().ok_or(Error::NotLoaded)
    }

    /// Estimated heap footprint of the loaded indices.
    pub fn index_size(&self) -> Result<usize> {
        let data = self.data_index()?.heap_size();
        let meta = self.meta_index.as_ref().map_or(0, |m| m.heap_size());
        Ok(data + meta)
    }

    /// Length of the underlying file in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// The name this reader was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Block reads served from the cache.
    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    /// Total block read requests, cached or not.
    pub fn block_loads(&self) -> u64 {
        self.block_loads.load(Ordering::Relaxed)
    }

    fn require_loaded(&self) -> Result<()> {
        if self.fileinfo.is_some() {
            Ok(())
        } else {
            Err(Error::NotLoaded)
        }
    }

    fn require_fileinfo(&self) -> Result<&FileInfo> {
        self.fileinfo.as_ref().ok_or(Error::NotLoaded)
    }

    fn trailer(&self) -> Result<&Trailer> {
        self.trailer.as_ref().ok_or(Error::NotLoaded)
    }

    fn data_index(&self) -> Result<&BlockIndex> {
        self.data_index.as_ref().ok_or(Error::NotLoaded)
    }

    fn compression(&self) -> Result<Compression> {
        self.compression.ok_or(Error::NotLoaded)
    }
}

impl<R: Read + Seek> std::fmt::Display for Reader<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reader={}", self.name)?;
        if let (Some(trailer), Some(compression)) = (&self.trailer, &self.compression) {
            write!(
                f,
                ", compression={}, entries={}, avgKeyLen={}, avgValueLen={}",
                compression.name(),
                trailer.entry_count,
                self.avg_key_len,
                self.avg_value_len
            )?;
        }
        write!(f, ", length={}", self.length)
    }
}

/// Decode a 4-byte big-endian statistic from the file-info map.
fn read_stat(fi: &FileInfo, key: &[u8]) -> Result<u32> {
    let value = fi.get(key).ok_or_else(|| {
        Error::corrupt(format!("file info missing {}", String::from_utf8_lossy(key)))
    })?;
    let bytes: [u8; 4] = value.try_into().map_err(|_| {
        Error::corrupt(format!(
            "file info entry {} is not a 4-byte integer",
            String::from_utf8_lossy(key)
        ))
    })?;
    Ok(u32::from_be_bytes(bytes))
}
