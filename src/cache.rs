//! Bounded LRU cache of parsed data blocks, keyed by `(sstable_id, offset)`.
//!
//! The source parameterizes one `LRUCache` template over a lock policy
//! (`NullLock` for single-threaded use, `std::mutex` for shared use). Rust
//! has no free lunch there — a generic lock parameter would need a trait
//! plus a guard associated type for little benefit — so this module exposes
//! two concrete types instead: [`BlockCache`] for single-threaded ownership
//! and [`SharedBlockCache`] for an `Arc`-shared, mutex-guarded cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use crate::block::BlockReader;
use crate::error::{Error, Result};

/// Identifies one cached block within one SSTable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub sstable_id: Arc<str>,
    pub offset: u32,
}

impl CacheKey {
    pub fn new(sstable_id: Arc<str>, offset: u32) -> Self {
        Self { sstable_id, offset }
    }
}

struct Entry<V> {
    value: V,
    last_used: u64,
}

/// A fixed-capacity least-recently-used map.
///
/// Eviction tracks recency with a monotonic logical clock rather than an
/// intrusive linked list: `get`/`put` are O(1), eviction is O(n) in the
/// current size. For the small, bounded capacities a block cache runs at
/// this is simpler than a linked-list-based LRU and avoids unsafe code.
pub struct LruCache<K, V> {
    capacity: usize,
    entries: HashMap<K, Entry<V>>,
    clock: u64,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::new(),
            clock: 0,
        }
    }

    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Inserts or overwrites `key`, marking it most-recently-used. Evicts
    /// the least-recently-used entries if this pushes the cache over
    /// capacity.
    pub fn put(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        let tick = self.tick();
        self.entries.insert(
            key,
            Entry {
                value,
                last_used: tick,
            },
        );
        while self.entries.len() > self.capacity {
            self.evict_oldest();
        }
    }

    fn evict_oldest(&mut self) {
        if let Some(oldest) = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used)
            .map(|(k, _)| k.clone())
        {
            self.entries.remove(&oldest);
        }
    }

    /// Looks up `key`, marking it most-recently-used on a hit.
    pub fn get(&mut self, key: &K) -> Option<&V>
    where
        V: Clone,
    {
        let tick = self.tick();
        match self.entries.get_mut(key) {
            Some(entry) => {
                entry.last_used = tick;
                Some(&entry.value)
            }
            None => None,
        }
    }

    pub fn remove(&mut self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Single-threaded block cache.
pub struct BlockCache {
    inner: LruCache<CacheKey, Arc<BlockReader>>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: LruCache::new(capacity),
        }
    }

    pub fn put(&mut self, key: CacheKey, block: Arc<BlockReader>) {
        self.inner.put(key, block);
    }

    pub fn get(&mut self, key: &CacheKey) -> Option<Arc<BlockReader>> {
        self.inner.get(key).cloned()
    }

    pub fn remove(&mut self, key: &CacheKey) -> bool {
        self.inner.remove(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

/// Block cache shared across threads behind a mutex.
pub struct SharedBlockCache {
    inner: Mutex<LruCache<CacheKey, Arc<BlockReader>>>,
}

impl SharedBlockCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, LruCache<CacheKey, Arc<BlockReader>>>> {
        self.inner
            .lock()
            .map_err(|_| Error::Internal("block cache mutex poisoned".into()))
    }

    pub fn put(&self, key: CacheKey, block: Arc<BlockReader>) -> Result<()> {
        self.lock()?.put(key, block);
        Ok(())
    }

    pub fn get(&self, key: &CacheKey) -> Result<Option<Arc<BlockReader>>> {
        Ok(self.lock()?.get(key).cloned())
    }

    pub fn remove(&self, key: &CacheKey) -> Result<bool> {
        Ok(self.lock()?.remove(key))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    pub fn clear(&self) -> Result<()> {
        self.lock()?.clear();
        Ok(())
    }
}
