//! # strata
//!
//! The sorted-table core of an LSM-tree key-value storage engine: an
//! internal-key codec, prefix-compressed blocks, Bloom filter blocks, an
//! SSTable writer/reader, a process-wide block cache, a WAL-backed memtable,
//! and the file abstractions they're all built on.
//!
//! This crate stops at the boundary an orchestrator would sit above: it does
//! not decide when to freeze a memtable, schedule a flush, pick compaction
//! candidates, or track which SSTables belong to which level. What it gives
//! an orchestrator is everything needed to build one: a way to accept writes
//! durably, serve point lookups against both the active memtable and
//! on-disk tables, and turn a full memtable into a new immutable file.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`key`] | Internal-key codec and the total order every other module sorts by |
//! | [`block`] | Prefix-compressed record blocks (data, index, meta-index) |
//! | [`filter`] | Bloom filter blocks for negative point-lookup short-circuiting |
//! | [`footer`] | The fixed-size trailer that anchors an SSTable's meta-index and index |
//! | [`sstable`] | Immutable, sorted, on-disk tables assembled from the above |
//! | [`cache`] | Bounded LRU cache of parsed data blocks, shared across SSTables |
//! | [`memtable`] | The WAL-backed, in-memory write buffer ahead of the SSTable layer |
//! | [`wal`] | Write-ahead log record framing and replay |
//! | [`file`] | Buffered writable files, sequential/mmap/random-access readers, temp files |
//! | [`config`] | Caller-supplied tunables ([`config::Options`]) |
//! | [`error`] | The crate-wide [`error::Error`] and [`error::Result`] |
//!
//! ## Key Features
//!
//! - **WAL-first durability** — every memtable write is appended to its WAL
//!   generation, optionally synced, and only then applied in memory.
//! - **Multi-version keys** — every user key is wrapped with a sequence
//!   number and operation tag; reads resolve the newest version visible at a
//!   given snapshot sequence rather than just the latest write.
//! - **Bloom filter lookups** — each SSTable data block has a paired bitmap
//!   consulted before ever reading the block itself.
//! - **Content-addressed SSTables** — a table's filename and cache-key prefix
//!   are the SHA-256 of its own bytes.
//! - **Shared block cache** — parsed data blocks are cached by
//!   `(sstable id, block offset)` across every open table.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use strata::cache::BlockCache;
//! use strata::config::Options;
//! use strata::key::{encode_internal, OpType};
//! use strata::memtable::Memtable;
//! use strata::sstable::SstableReader;
//! use strata::wal::WalWriter;
//!
//! let options = Options::default();
//!
//! let wal = WalWriter::create("/tmp/my_db/wal/0.wal").unwrap();
//! let memtable = Memtable::new(Some(wal), options.sync_writes);
//!
//! let ik = encode_internal(b"hello", 1, OpType::Put);
//! memtable.put_tee_wal(&ik, b"world").unwrap();
//! assert_eq!(memtable.get(b"hello", u64::MAX).unwrap().unwrap(), b"world");
//!
//! let meta = memtable.build_sstable("/tmp/my_db/sst", &options).unwrap();
//! memtable.drop_wal().unwrap();
//!
//! let path = strata::file::sst_file("/tmp/my_db/sst", &meta.id);
//! let reader = SstableReader::open(&path, Arc::clone(&meta.id)).unwrap();
//! let mut cache = BlockCache::new(options.block_cache_capacity);
//! assert_eq!(
//!     reader.get(b"hello", u64::MAX, &mut cache).unwrap().unwrap(),
//!     b"world"
//! );
//! ```

#![allow(dead_code)]

pub mod block;
pub mod cache;
pub mod config;
pub mod error;
pub mod file;
pub mod filter;
pub mod footer;
pub mod key;
pub mod memtable;
pub mod sstable;
pub mod wal;
