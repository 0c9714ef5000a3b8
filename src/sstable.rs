//! Immutable sorted-table files: the on-disk union of every other module in
//! this crate.
//!
//! ```text
//! [ data_block_0 ][ data_block_1 ] ... [ data_block_k-1 ]
//! [ filter_block ]
//! [ meta_index_block ]
//! [ index_block ]
//! [ footer (18 bytes) ]
//! ```
//!
//! [`SstableWriter`] buffers records into 4 KiB data blocks, builds a
//! parallel filter bitmap per data block and an index block of boundary
//! keys, then finalizes the meta-index, index, and footer. Every byte
//! written feeds a running SHA-256 digest whose hex digest becomes the
//! file's identity, its filename stem, and its block-cache key. [`SstableReader`]
//! opens a published file read-only through a whole-file mmap and answers
//! point lookups by walking footer → index → filter → data block, exactly
//! the order [`SstableWriter`] lays them out in.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::block::{BlockHandle, BlockReader, BlockWriter};
use crate::cache::{BlockCache, CacheKey};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::file::{sst_file, MmapReader, TempFile};
use crate::filter::{FilterBlockReader, FilterBlockWriter};
use crate::footer::{FooterBlockReader, FooterBlockWriter, FOOTER_SIZE};
use crate::key::{self, cmp_internal};

/// Data blocks are finalized once their estimated size crosses this
/// threshold. Confirmed against the source's `need_flush_size_ = 1 << 12`.
const FLUSH_THRESHOLD: usize = 4096;

/// The meta-index entry name under which the filter block's handle is
/// stored. The meta-index block holds exactly this one entry.
const FILTER_META_KEY: &[u8] = b"filter.bloom";

/// Descriptive metadata produced once an SSTable has been fully written.
///
/// An orchestrator (out of scope here) uses this to register the new file
/// with a level and decide when to trigger compaction.
#[derive(Debug, Clone)]
pub struct FileMetaData {
    /// Lowercase hex SHA-256 of the file's contents; also its filename stem
    /// and its block-cache key.
    pub id: Arc<str>,
    /// Total file size in bytes.
    pub size: u64,
    /// Number of records written.
    pub key_count: u64,
    /// Owning level; set by the orchestrator, defaulted to 0 here.
    pub level: u32,
    /// Largest sequence number among the file's records.
    pub max_seq: u64,
    /// Smallest internal key written.
    pub min_key: Vec<u8>,
    /// Largest internal key written.
    pub max_key: Vec<u8>,
}

impl PartialEq for FileMetaData {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for FileMetaData {}

impl PartialOrd for FileMetaData {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FileMetaData {
    /// Orders by min internal key, per the data model's "Ordered by min
    /// internal key" rule.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        cmp_internal(&self.min_key, &other.min_key)
    }
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").unwrap();
    }
    out
}

/// Streams sorted internal-key/value records into a new SSTable file.
///
/// Callers must call [`add`](Self::add) with strictly ascending internal
/// keys (per [`cmp_internal`]), matching the block writer's own contract.
pub struct SstableWriter {
    tmp: TempFile,
    offset: u64,
    data_block: BlockWriter,
    index_block: BlockWriter,
    filter_writer: Option<FilterBlockWriter>,
    hasher: Sha256,
    key_count: u64,
    max_seq: u64,
    min_key: Option<Vec<u8>>,
    max_key: Option<Vec<u8>>,
}

impl SstableWriter {
    /// Opens a fresh temp file under `sst_dir` to write into.
    pub fn new(sst_dir: impl AsRef<Path>, options: &Options) -> Result<Self> {
        Ok(Self {
            tmp: TempFile::open(sst_dir, "sst")?,
            offset: 0,
            data_block: BlockWriter::new(),
            index_block: BlockWriter::new(),
            filter_writer: Some(FilterBlockWriter::new(options.bits_per_key)),
            hasher: Sha256::new(),
            key_count: 0,
            max_seq: 0,
            min_key: None,
            max_key: None,
        })
    }

    /// Appends one record, flushing the current data block once it crosses
    /// [`FLUSH_THRESHOLD`].
    pub fn add(&mut self, internal_key: &[u8], value: &[u8]) -> Result<()> {
        let (user_key, seq, _) = key::decode_internal(internal_key)?;

        self.data_block.add(internal_key, value)?;
        // The filter is keyed by user key, not internal key: a lookup only
        // ever knows the user key and a snapshot seq, never the exact seq a
        // write landed at, so insertion and lookup must hash the same bytes
        // for `may_contain` to ever see a real hit.
        self.filter_writer
            .as_mut()
            .expect("filter writer consumed before finalize")
            .update(user_key);

        self.key_count += 1;
        self.max_seq = self.max_seq.max(seq);
        if self.min_key.is_none() {
            self.min_key = Some(internal_key.to_vec());
        }
        self.max_key = Some(internal_key.to_vec());

        if self.data_block.estimated_size() > FLUSH_THRESHOLD {
            self.flush_data_block(internal_key)?;
        }
        Ok(())
    }

    /// Finalizes the current data block (if non-empty), writes it at the
    /// current offset, tells the filter writer to flush its bitmap for it,
    /// and stages an index entry keyed by `boundary_key` — the last key
    /// just added to the outgoing block.
    fn flush_data_block(&mut self, boundary_key: &[u8]) -> Result<()> {
        if self.data_block.empty() {
            return Ok(());
        }
        let bytes = self.data_block.finalize();
        let handle = self.write_raw(&bytes)?;
        self.filter_writer
            .as_mut()
            .expect("filter writer consumed before finalize")
            .keys_to_block();
        self.index_block.add(boundary_key, &handle.encode())?;
        self.data_block.reset();
        Ok(())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<BlockHandle> {
        let offset = self.offset;
        self.tmp.append(bytes)?;
        self.hasher.update(bytes);
        self.offset += bytes.len() as u64;
        Ok(BlockHandle::new(offset as u32, bytes.len() as u32))
    }

    /// Flushes any trailing partial data block and bitmap, writes the
    /// filter, meta-index, index, and footer blocks, and atomically
    /// publishes the file under `sst_dir` as `<sha256>.sst`.
    pub fn finalize(mut self, sst_dir: impl AsRef<Path>) -> Result<FileMetaData> {
        if !self.data_block.empty() {
            let last = self
                .max_key
                .clone()
                .expect("a non-empty data block implies at least one added key");
            self.flush_data_block(&last)?;
        }

        let filter_writer = self
            .filter_writer
            .take()
            .expect("filter writer consumed before finalize");
        let filter_bytes = filter_writer.finalize();
        let filter_handle = self.write_raw(&filter_bytes)?;

        let mut meta_block = BlockWriter::new();
        meta_block.add(FILTER_META_KEY, &filter_handle.encode())?;
        let meta_bytes = meta_block.finalize();
        let meta_handle = self.write_raw(&meta_bytes)?;

        let index_bytes = self.index_block.finalize();
        let index_handle = self.write_raw(&index_bytes)?;

        let mut footer_writer = FooterBlockWriter::new();
        footer_writer.add(meta_handle, index_handle);
        let footer_bytes = footer_writer.finalize()?;
        self.tmp.append(&footer_bytes)?;
        self.hasher.update(&footer_bytes);
        let size = self.offset + footer_bytes.len() as u64;

        let digest = self.hasher.finalize();
        let id: Arc<str> = Arc::from(hex_digest(&digest));

        let final_path = sst_file(sst_dir.as_ref(), &id);
        self.tmp.publish(&final_path)?;

        Ok(FileMetaData {
            id,
            size,
            key_count: self.key_count,
            level: 0,
            max_seq: self.max_seq,
            min_key: self.min_key.unwrap_or_default(),
            max_key: self.max_key.unwrap_or_default(),
        })
    }
}

/// A read-only, memory-mapped handle onto one published SSTable.
pub struct SstableReader {
    id: Arc<str>,
    mmap: MmapReader,
    index: Arc<BlockReader>,
    filter: FilterBlockReader,
}

impl SstableReader {
    /// Opens `path`, parses its footer, meta-index, filter, and index
    /// blocks. Data blocks are loaded lazily, through the block cache, on
    /// each [`get`](Self::get).
    pub fn open(path: impl AsRef<Path>, id: Arc<str>) -> Result<Self> {
        let mmap = MmapReader::open(path)?;
        let size = mmap.size();
        if size < FOOTER_SIZE as u64 {
            return Err(Error::UnsupportedFormat(
                "sstable file shorter than its footer".into(),
            ));
        }

        let footer_bytes = mmap.read(size - FOOTER_SIZE as u64, FOOTER_SIZE as u64)?;
        let footer = FooterBlockReader::parse(footer_bytes)?;

        let meta_bytes = Self::read_block(&mmap, footer.meta_handle())?;
        let meta_block = BlockReader::parse(meta_bytes)?;
        let (_, filter_handle_bytes) = meta_block
            .get(FILTER_META_KEY)?
            .filter(|(k, _)| k.as_slice() == FILTER_META_KEY)
            .ok_or_else(|| Error::FilterBlock("meta-index missing filter.bloom entry".into()))?;
        let filter_handle = BlockHandle::decode(&filter_handle_bytes)?;

        let filter_bytes = Self::read_block(&mmap, filter_handle)?;
        let filter = FilterBlockReader::parse(filter_bytes)?;

        let index_bytes = Self::read_block(&mmap, footer.index_handle())?;
        let index = Arc::new(BlockReader::parse(index_bytes)?);

        Ok(Self {
            id,
            mmap,
            index,
            filter,
        })
    }

    fn read_block(mmap: &MmapReader, handle: BlockHandle) -> Result<Vec<u8>> {
        Ok(mmap
            .read(handle.offset as u64, handle.size as u64)?
            .to_vec())
    }

    /// This table's content-derived identity, used as its block-cache key
    /// prefix.
    pub fn id(&self) -> &Arc<str> {
        &self.id
    }

    fn load_data_block(&self, handle: BlockHandle) -> Result<Arc<BlockReader>> {
        let bytes = Self::read_block(&self.mmap, handle)?;
        Ok(Arc::new(BlockReader::parse(bytes)?))
    }

    /// Looks up `user_key` as of `snapshot_seq`.
    ///
    /// 1. The index block's lower bound on [`key::probe_for`] locates the
    ///    data block boundary that may hold the key.
    /// 2. The filter for that block index is consulted; a definite miss
    ///    short-circuits the data block read.
    /// 3. The data block (from `cache`, populated on miss) is probed the
    ///    same way, and [`key::save_if_user_key_matches`] resolves the
    ///    result.
    pub fn get(
        &self,
        user_key: &[u8],
        snapshot_seq: u64,
        cache: &mut BlockCache,
    ) -> Result<Option<Vec<u8>>> {
        if self.index.is_empty() {
            return Ok(None);
        }

        let probe = key::probe_for(user_key, snapshot_seq);

        let Some((_, handle_bytes)) = self.index.get(&probe)? else {
            return Ok(None);
        };
        let handle = BlockHandle::decode(&handle_bytes)?;
        let block_index = self.block_index_for(handle);

        // Queried by user key, matching how the writer fed the filter (see
        // `SstableWriter::add`) — the probe's seq/type suffix has no
        // relation to what any record was actually written with.
        if !self.filter.may_contain(block_index, user_key) {
            return Ok(None);
        }

        let cache_key = CacheKey::new(Arc::clone(&self.id), handle.offset);
        let block = match cache.get(&cache_key) {
            Some(block) => block,
            None => {
                let block = self.load_data_block(handle)?;
                cache.put(cache_key, Arc::clone(&block));
                block
            }
        };

        let Some((rk, rv)) = block.get(&probe)? else {
            return Ok(None);
        };
        Ok(key::save_if_user_key_matches(&rk, &rv, user_key).map(|(_, v)| v.to_vec()))
    }

    /// Maps a data block's handle to its position among filter bitmaps.
    ///
    /// Both were built in lockstep — the `n`th data block flush produced
    /// the `n`th filter bitmap — so this recovers the index by counting
    /// index-block entries whose handle offset precedes `handle`'s.
    fn block_index_for(&self, handle: BlockHandle) -> usize {
        let mut count = 0usize;
        let mut iter = self.index.iter();
        let _ = iter.advance();
        while iter.valid() {
            if let Some((_, v)) = iter.fetch() {
                if let Ok(h) = BlockHandle::decode(v) {
                    if h.offset < handle.offset {
                        count += 1;
                    } else {
                        break;
                    }
                }
            }
            let _ = iter.advance();
        }
        count
    }
}
