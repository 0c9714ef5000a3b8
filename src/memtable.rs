//! The mutable, in-memory write buffer ahead of the SSTable layer.
//!
//! A memtable holds every record accepted since its WAL generation was
//! opened, ordered by internal key. Writes go through [`Memtable::put_tee_wal`],
//! which appends to the WAL before touching the in-memory map, so a crash
//! between the two never loses an acknowledged write. Freezing a memtable and
//! flushing it to an SSTable are orchestrator decisions, out of scope here;
//! this module only streams the data out via [`Memtable::build_sstable`] when
//! asked.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::RwLock;

use tracing::warn;

use crate::error::{Error, Result};
use crate::key::{self, cmp_internal};
use crate::sstable::{FileMetaData, SstableWriter};
use crate::wal::{self, WalWriter};
use crate::config::Options;

/// Wraps an internal key so it can key a [`BTreeMap`] under [`cmp_internal`]
/// rather than raw byte order, which disagrees with it whenever the
/// little-endian sequence suffix is involved (the same divergence
/// `BlockWriter::add` guards against).
#[derive(Debug, Clone, Eq, PartialEq)]
struct InternalKey(Vec<u8>);

impl Ord for InternalKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        cmp_internal(&self.0, &other.0)
    }
}

impl PartialOrd for InternalKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

struct Inner {
    table: BTreeMap<InternalKey, Vec<u8>>,
    size: usize,
    wal: Option<WalWriter>,
}

/// An ordered, WAL-backed write buffer for one generation of writes.
pub struct Memtable {
    inner: RwLock<Inner>,
    sync_writes: bool,
}

impl Memtable {
    /// Builds an empty memtable. `wal` is `None` only for throwaway memtables
    /// used in tests; a production memtable always owns a WAL.
    pub fn new(wal: Option<WalWriter>, sync_writes: bool) -> Self {
        Self {
            inner: RwLock::new(Inner {
                table: BTreeMap::new(),
                size: 0,
                wal,
            }),
            sync_writes,
        }
    }

    /// Inserts or overwrites `internal_key`. A DELETE-typed key is stored
    /// with an empty value regardless of what `value` carries, matching the
    /// tombstone convention the rest of the crate relies on.
    pub fn put(&self, internal_key: &[u8], value: &[u8]) -> Result<()> {
        let (_, _, op) = key::decode_internal(internal_key)?;
        let stored: &[u8] = if op == key::OpType::Delete { &[] } else { value };

        let mut inner = self.inner.write().map_err(|_| Error::Internal("memtable lock poisoned".into()))?;
        let key = InternalKey(internal_key.to_vec());
        let added = stored.len() + internal_key.len();
        if let Some(old) = inner.table.insert(key, stored.to_vec()) {
            inner.size -= old.len();
        }
        inner.size += added;
        Ok(())
    }

    /// Writes `internal_key`/`value` to the WAL first, optionally syncs, and
    /// only then applies them in memory. If the WAL step fails the in-memory
    /// map is left untouched, so the memtable never diverges from what the
    /// WAL can replay.
    pub fn put_tee_wal(&self, internal_key: &[u8], value: &[u8]) -> Result<()> {
        let (_, _, op) = key::decode_internal(internal_key)?;
        let stored: &[u8] = if op == key::OpType::Delete { &[] } else { value };
        let payload = wal::encode_kv_payload(internal_key, stored);

        let mut inner = self.inner.write().map_err(|_| Error::Internal("memtable lock poisoned".into()))?;
        let wal = inner.wal.as_mut().ok_or(Error::DbClosed)?;
        wal.add_record(&payload)?;
        if self.sync_writes {
            wal.sync()?;
        }

        let key = InternalKey(internal_key.to_vec());
        let added = stored.len() + internal_key.len();
        if let Some(old) = inner.table.insert(key, stored.to_vec()) {
            inner.size -= old.len();
        }
        inner.size += added;
        Ok(())
    }

    /// Looks up `user_key` as of `snapshot_seq`. Locates the first entry at
    /// or after [`key::probe_for`]`(user_key, snapshot_seq)`; if its user key
    /// matches, resolves PUT/DELETE via [`key::save_if_user_key_matches`].
    pub fn get(&self, user_key: &[u8], snapshot_seq: u64) -> Result<Option<Vec<u8>>> {
        let inner = self.inner.read().map_err(|_| Error::Internal("memtable lock poisoned".into()))?;
        let probe = InternalKey(key::probe_for(user_key, snapshot_seq));
        let Some((k, v)) = inner.table.range(probe..).next() else {
            return Ok(None);
        };
        Ok(key::save_if_user_key_matches(&k.0, v, user_key).map(|(_, v)| v.to_vec()))
    }

    /// Invokes `f` with every `(internal_key, value)` pair in ascending
    /// order. The read lock is held for the whole call, so `f` sees a
    /// consistent snapshot even under concurrent writers.
    pub fn for_each(&self, mut f: impl FnMut(&[u8], &[u8])) -> Result<()> {
        let inner = self.inner.read().map_err(|_| Error::Internal("memtable lock poisoned".into()))?;
        for (k, v) in inner.table.iter() {
            f(&k.0, v);
        }
        Ok(())
    }

    /// Streams every record through a fresh [`SstableWriter`] rooted at
    /// `sst_dir`, producing the published file's metadata.
    pub fn build_sstable(&self, sst_dir: impl AsRef<Path>, options: &Options) -> Result<FileMetaData> {
        let inner = self.inner.read().map_err(|_| Error::Internal("memtable lock poisoned".into()))?;
        let mut writer = SstableWriter::new(sst_dir.as_ref(), options)?;
        for (k, v) in inner.table.iter() {
            writer.add(&k.0, v)?;
        }
        writer.finalize(sst_dir)
    }

    /// Syncs, closes, and unlinks the WAL. Subsequent writes through
    /// [`put_tee_wal`](Self::put_tee_wal) fail with [`Error::DbClosed`] until
    /// a new memtable is built on a fresh WAL generation.
    pub fn drop_wal(&self) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| Error::Internal("memtable lock poisoned".into()))?;
        if let Some(wal) = inner.wal.take() {
            wal.close_and_unlink()?;
        }
        Ok(())
    }

    /// Cumulative bytes of keys and values currently stored.
    pub fn size(&self) -> usize {
        self.inner.read().map(|i| i.size).unwrap_or(0)
    }

    /// Whether any record is present.
    pub fn empty(&self) -> bool {
        self.inner.read().map(|i| i.table.is_empty()).unwrap_or(true)
    }
}

impl Drop for Memtable {
    /// Best-effort cleanup of a WAL generation that was never explicitly
    /// dropped via [`drop_wal`](Self::drop_wal) (e.g. a memtable discarded
    /// without ever reaching a flush). Errors are logged, not propagated —
    /// there is no caller left to hand them to.
    fn drop(&mut self) {
        let mut inner = match self.inner.write() {
            Ok(inner) => inner,
            Err(_) => return,
        };
        if let Some(mut wal) = inner.wal.take() {
            if let Err(e) = wal.sync() {
                warn!(error = %e, "memtable drop: failed to sync WAL");
            }
            if let Err(e) = wal.close() {
                warn!(error = %e, "memtable drop: failed to close WAL");
            }
        }
    }
}
