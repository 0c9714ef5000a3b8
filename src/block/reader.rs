use std::sync::Arc;

use crate::error::{Error, Result};
use crate::key::cmp_internal;

use super::RECORD_HEADER_LEN;

/// A parsed block, ready for point lookups or forward iteration.
///
/// Owns its data outright (rather than borrowing from the mmap or cache that
/// produced it) so that `Arc<BlockReader>` handles can be cached and handed
/// out freely without entangling their lifetime with the file they came
/// from — the idiomatic Rust rendering of the source's
/// `enable_shared_from_this` pattern.
#[derive(Debug)]
pub struct BlockReader {
    /// Record bytes only, with the restart trailer stripped off.
    data: Vec<u8>,
    /// Byte offsets of each restart point's record, within `data`.
    restarts: Vec<u32>,
}

struct Decoded {
    key: Vec<u8>,
    value_start: usize,
    value_end: usize,
    next_offset: usize,
    shared_len: usize,
}

impl BlockReader {
    /// Parses the trailing restart count and restart-offset array from the
    /// tail of `raw`, which must be exactly what [`BlockWriter::finalize`]
    /// produced.
    ///
    /// [`BlockWriter::finalize`]: super::BlockWriter::finalize
    pub fn parse(mut raw: Vec<u8>) -> Result<Self> {
        if raw.len() < 4 {
            return Err(Error::UnsupportedFormat(
                "block shorter than its trailing restart count".into(),
            ));
        }
        let restart_count =
            u32::from_le_bytes(raw[raw.len() - 4..].try_into().unwrap()) as usize;
        let trailer_len = 4 + restart_count * 4;
        if raw.len() < trailer_len {
            return Err(Error::UnsupportedFormat(format!(
                "block of {} bytes too short for {} restart points",
                raw.len(),
                restart_count
            )));
        }

        let restarts_start = raw.len() - trailer_len;
        let mut restarts = Vec::with_capacity(restart_count);
        for i in 0..restart_count {
            let off = restarts_start + i * 4;
            restarts.push(u32::from_le_bytes(raw[off..off + 4].try_into().unwrap()));
        }

        raw.truncate(restarts_start);
        Ok(Self { data: raw, restarts })
    }

    /// Whether the block holds no records.
    pub fn is_empty(&self) -> bool {
        self.restarts.is_empty()
    }

    fn decode_at(&self, offset: usize, prev_key: &[u8]) -> Result<Decoded> {
        let d = &self.data;
        if offset + RECORD_HEADER_LEN > d.len() {
            return Err(Error::UnsupportedFormat(
                "block record header runs past end of block".into(),
            ));
        }
        let shared_len = u32::from_le_bytes(d[offset..offset + 4].try_into().unwrap()) as usize;
        let unshared_len =
            u32::from_le_bytes(d[offset + 4..offset + 8].try_into().unwrap()) as usize;
        let value_len =
            u32::from_le_bytes(d[offset + 8..offset + 12].try_into().unwrap()) as usize;

        let key_start = offset + RECORD_HEADER_LEN;
        let key_end = key_start
            .checked_add(unshared_len)
            .ok_or_else(|| Error::UnsupportedFormat("block record length overflow".into()))?;
        let value_end = key_end
            .checked_add(value_len)
            .ok_or_else(|| Error::UnsupportedFormat("block record length overflow".into()))?;
        if value_end > d.len() {
            return Err(Error::UnsupportedFormat(
                "block record body runs past end of block".into(),
            ));
        }
        if shared_len > prev_key.len() {
            return Err(Error::UnsupportedFormat(
                "block record shares more bytes than the previous key has".into(),
            ));
        }

        let mut key = Vec::with_capacity(shared_len + unshared_len);
        key.extend_from_slice(&prev_key[..shared_len]);
        key.extend_from_slice(&d[key_start..key_end]);

        Ok(Decoded {
            key,
            value_start: key_end,
            value_end,
            next_offset: value_end,
            shared_len,
        })
    }

    /// Decodes the full key stored at a restart point. By construction its
    /// `shared_len` must be zero; a nonzero value indicates a corrupt or
    /// foreign block.
    fn restart_key(&self, restart_idx: usize) -> Result<Vec<u8>> {
        let offset = self.restarts[restart_idx] as usize;
        let decoded = self.decode_at(offset, &[])?;
        if decoded.shared_len != 0 {
            return Err(Error::UnsupportedFormat(
                "restart-point record has a nonzero shared_len".into(),
            ));
        }
        Ok(decoded.key)
    }

    /// Largest restart index whose full key is `<= target`, or `0` if every
    /// restart key exceeds `target`.
    fn bsearch_restart(&self, target: &[u8]) -> Result<usize> {
        let mut lo = 0usize;
        let mut hi = self.restarts.len(); // exclusive
        while lo + 1 < hi {
            let mid = lo + (hi - lo) / 2;
            let key = self.restart_key(mid)?;
            if cmp_internal(&key, target) != std::cmp::Ordering::Greater {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Lower-bound lookup: returns the first record with key `>= target`, or
    /// `Ok(None)` if every key in the block is `< target`.
    pub fn get(&self, target: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        if self.restarts.is_empty() {
            return Ok(None);
        }

        let start_restart = self.bsearch_restart(target)?;
        let run_end = if start_restart + 1 < self.restarts.len() {
            self.restarts[start_restart + 1] as usize
        } else {
            self.data.len()
        };

        let mut offset = self.restarts[start_restart] as usize;
        let mut prev_key: Vec<u8> = Vec::new();
        let mut consumed = 0usize;
        while offset < run_end && consumed < super::RESTART_INTERVAL {
            let decoded = self.decode_at(offset, &prev_key)?;
            if cmp_internal(&decoded.key, target) != std::cmp::Ordering::Less {
                let value = self.data[decoded.value_start..decoded.value_end].to_vec();
                return Ok(Some((decoded.key, value)));
            }
            offset = decoded.next_offset;
            prev_key = decoded.key;
            consumed += 1;
        }

        // Fell through the run without a match: the answer, if any, is the
        // very next restart's full key.
        if start_restart + 1 < self.restarts.len() {
            let next_key = self.restart_key(start_restart + 1)?;
            if cmp_internal(&next_key, target) != std::cmp::Ordering::Less {
                let offset = self.restarts[start_restart + 1] as usize;
                let decoded = self.decode_at(offset, &[])?;
                let value = self.data[decoded.value_start..decoded.value_end].to_vec();
                return Ok(Some((decoded.key, value)));
            }
        }
        Ok(None)
    }

    /// Creates a fresh forward-only iterator over this block.
    pub fn iter(self: &Arc<Self>) -> BlockIterator {
        BlockIterator::new(Arc::clone(self))
    }
}

/// Observable iterator state. Only [`BlockIterator::advance`] and
/// [`BlockIterator::fetch`] are observable transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Invalid,
    Valid,
    AtEnd,
}

/// Forward-only cursor over a [`BlockReader`].
///
/// Two iterators compare equal iff they share the same container and the
/// same byte position.
#[derive(Debug)]
pub struct BlockIterator {
    block: Arc<BlockReader>,
    state: State,
    pos: usize,
    next_pos: usize,
    cur_key: Vec<u8>,
    cur_value: Vec<u8>,
}

impl BlockIterator {
    fn new(block: Arc<BlockReader>) -> Self {
        Self {
            block,
            state: State::Invalid,
            pos: 0,
            next_pos: 0,
            cur_key: Vec::new(),
            cur_value: Vec::new(),
        }
    }

    /// Advances to the next record. From `Invalid`, moves to the first
    /// record. From `AtEnd`, this is a no-op. Fails only on a malformed
    /// block.
    pub fn advance(&mut self) -> Result<()> {
        let next_offset = match self.state {
            State::Invalid => 0,
            State::AtEnd => return Ok(()),
            State::Valid => self.next_pos,
        };

        if self.block.is_empty() || next_offset >= self.block.data.len() {
            self.state = State::AtEnd;
            return Ok(());
        }

        let prev_key: &[u8] = match self.state {
            State::Invalid => &[],
            _ => &self.cur_key,
        };
        let decoded = self.block.decode_at(next_offset, prev_key)?;
        let value = self.block.data[decoded.value_start..decoded.value_end].to_vec();

        self.pos = next_offset;
        self.next_pos = decoded.next_offset;
        self.cur_key = decoded.key;
        self.cur_value = value;
        self.state = State::Valid;
        Ok(())
    }

    /// Returns the current key/value, or `None` if the iterator is not
    /// positioned on a record. Idempotent: repeated calls without an
    /// intervening `advance` return the same result.
    pub fn fetch(&self) -> Option<(&[u8], &[u8])> {
        match self.state {
            State::Valid => Some((&self.cur_key, &self.cur_value)),
            _ => None,
        }
    }

    /// Whether the iterator is positioned on a record.
    pub fn valid(&self) -> bool {
        self.state == State::Valid
    }
}

impl PartialEq for BlockIterator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.block, &other.block) && self.state == other.state && {
            match self.state {
                State::Valid => self.pos == other.pos,
                _ => true,
            }
        }
    }
}
