use crate::error::{Error, Result};
use crate::key::cmp_internal;

use super::RESTART_INTERVAL;

/// Builds one block's worth of prefix-compressed records.
///
/// Callers must supply keys in strictly ascending order; `add` rejects any
/// key that is not greater than the previously added one.
#[derive(Debug, Default)]
pub struct BlockWriter {
    entries: usize,
    restarts: Vec<u32>,
    last_key: Vec<u8>,
    buffer: Vec<u8>,
}

impl BlockWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one record. Every [`RESTART_INTERVAL`]-th call starts a new
    /// restart run and stores the key in full; the rest store only the
    /// suffix that differs from `last_key`.
    ///
    /// "Ascending" is judged by [`cmp_internal`], not by byte order of the
    /// raw key: this block doubles as both a data/index block (keyed by
    /// internal key, whose little-endian seq suffix does not sort the same
    /// as its numeric value) and a meta-index block (keyed by a plain
    /// string, for which `cmp_internal` falls back to byte order). Binary
    /// search in [`BlockReader`](super::BlockReader) assumes the same order.
    pub fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        if self.entries > 0 && cmp_internal(key, &self.last_key) != std::cmp::Ordering::Greater {
            return Err(Error::InvalidArgument(
                "block records must be added in strictly ascending key order".into(),
            ));
        }

        let shared_len = if self.entries % RESTART_INTERVAL == 0 {
            self.restarts.push(self.buffer.len() as u32);
            0
        } else {
            let max_shared = key.len().min(self.last_key.len());
            let mut n = 0;
            while n < max_shared && key[n] == self.last_key[n] {
                n += 1;
            }
            n
        };

        let unshared_len = key.len() - shared_len;
        self.buffer
            .extend_from_slice(&(shared_len as u32).to_le_bytes());
        self.buffer
            .extend_from_slice(&(unshared_len as u32).to_le_bytes());
        self.buffer
            .extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.buffer.extend_from_slice(&key[shared_len..]);
        self.buffer.extend_from_slice(value);

        self.entries += 1;
        self.last_key.clear();
        self.last_key.extend_from_slice(key);
        Ok(())
    }

    /// Appends the restart-point trailer and returns the complete block
    /// bytes. Does not reset the writer's internal state — call [`reset`]
    /// before reusing it for another block.
    ///
    /// [`reset`]: BlockWriter::reset
    pub fn finalize(&self) -> Vec<u8> {
        let mut out = self.buffer.clone();
        for &offset in &self.restarts {
            out.extend_from_slice(&offset.to_le_bytes());
        }
        out.extend_from_slice(&(self.restarts.len() as u32).to_le_bytes());
        out
    }

    /// Projected size of [`finalize`](Self::finalize)'s output without
    /// building it.
    pub fn estimated_size(&self) -> usize {
        self.buffer.len() + (self.restarts.len() + 1) * 4
    }

    /// Empties the writer so it can build another block.
    pub fn reset(&mut self) {
        self.entries = 0;
        self.restarts.clear();
        self.last_key.clear();
        self.buffer.clear();
    }

    /// Whether any record has been added since the last reset.
    pub fn empty(&self) -> bool {
        self.entries == 0
    }
}
