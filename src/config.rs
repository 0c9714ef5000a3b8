//! Caller-supplied engine options.
//!
//! `Options` collects every tunable named in the external interface; parsing
//! a config file into one is an orchestrator concern and out of scope here.
//! `background_workers` and `level_files_limit` are carried verbatim for a
//! future orchestrator to read — this crate does not spawn workers or pick
//! compaction candidates itself.

/// Tunables for the storage core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Create the database directory layout on open if it does not exist.
    pub create_if_not_exists: bool,
    /// Bloom filter bits per key, fed to [`crate::filter::BloomFilter::new`].
    pub bits_per_key: u32,
    /// Memtable byte threshold at which it should be frozen and flushed.
    pub memtable_max_bytes: usize,
    /// Block cache capacity, in entries.
    pub block_cache_capacity: usize,
    /// Size of the background flush/compaction worker pool. Stored for the
    /// orchestrator; this crate does not run workers.
    pub background_workers: usize,
    /// Whether every memtable write fsyncs its WAL record before returning.
    pub sync_writes: bool,
    /// Per-level file count that should trigger compaction. Stored for the
    /// orchestrator; this crate does not implement compaction.
    pub level_files_limit: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_not_exists: false,
            bits_per_key: 10,
            memtable_max_bytes: 4 * 1024 * 1024,
            block_cache_capacity: 2048,
            background_workers: 1,
            sync_writes: false,
            level_files_limit: 4,
        }
    }
}
