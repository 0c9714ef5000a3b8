//! Per-data-block Bloom filter bitmaps.
//!
//! One bitmap is produced per data block, sized from the number of keys
//! buffered since the previous flush. The block's layout, tail to head:
//!
//! ```text
//! bitmap_0 | .. | bitmap_{n-1} | off_0(4) .. off_{n-1}(4) | offsets_begin(4) | n(4) | "bf:" | bits_per_key(4) | info_len(4)
//! ```
//!
//! Hashing uses two independently-seeded 32-bit MurmurHash3 values combined
//! by double hashing (`h1 + i*h2 mod m`) to stand in for `k` independent hash
//! functions, the same trick LevelDB's Bloom filter uses to avoid computing
//! `k` real hashes per key.

use crate::error::{Error, Result};

const INFO_PREFIX: &[u8] = b"bf:";

fn rotate_left32(value: u32, count: u32) -> u32 {
    value.rotate_left(count & 31)
}

/// MurmurHash3 (x86, 32-bit) of `data` under `seed`.
pub fn murmur3_32(seed: u32, data: &[u8]) -> u32 {
    const C1: u32 = 0xcc9e2d51;
    const C2: u32 = 0x1b873593;
    const R1: u32 = 15;
    const R2: u32 = 13;
    const M: u32 = 5;
    const N: u32 = 0xe6546b64;

    let mut h = seed;
    let chunks = data.chunks_exact(4);
    let tail = chunks.remainder();
    for chunk in chunks {
        let mut k = u32::from_le_bytes(chunk.try_into().unwrap());
        k = k.wrapping_mul(C1);
        k = rotate_left32(k, R1);
        k = k.wrapping_mul(C2);
        h ^= k;
        h = rotate_left32(h, R2).wrapping_mul(M).wrapping_add(N);
    }

    let mut k1 = 0u32;
    for (i, &byte) in tail.iter().enumerate().rev() {
        k1 ^= (byte as u32) << (8 * i);
    }
    if !tail.is_empty() {
        k1 = k1.wrapping_mul(C1);
        k1 = rotate_left32(k1, R1);
        k1 = k1.wrapping_mul(C2);
        h ^= k1;
    }

    h ^= data.len() as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

/// Bloom filter parameterized by bits-per-key; the hash-function count `k`
/// is derived from it once, at construction.
#[derive(Debug, Clone, Copy)]
pub struct BloomFilter {
    bits_per_key: u32,
    k: u32,
}

impl BloomFilter {
    pub fn new(bits_per_key: u32) -> Self {
        let k = ((bits_per_key as f64) * 0.69).round() as i64;
        let k = k.clamp(1, 30) as u32;
        Self { bits_per_key, k }
    }

    pub fn bits_per_key(&self) -> u32 {
        self.bits_per_key
    }

    /// Builds one bitmap covering every key in `keys`.
    pub fn build_bitmap(&self, keys: &[Vec<u8>]) -> Vec<u8> {
        let n = keys.len() as u64;
        let bitmap_bits = (n * self.bits_per_key as u64 + 7) * 8;
        let bitmap_bits = bitmap_bits.max(8);
        let bitmap_len = (bitmap_bits / 8) as usize;
        let mut bitmap = vec![0u8; bitmap_len];

        for key in keys {
            let h1 = murmur3_32(0xe2c6928a, key) as u64;
            let h2 = murmur3_32(0xbaea8a8f, key) as u64;
            for j in 0..self.k as u64 {
                let bit_pos = (h1.wrapping_add(j.wrapping_mul(h2)) % bitmap_bits) as usize;
                bitmap[bit_pos / 8] |= 1 << (bit_pos % 8);
            }
        }
        bitmap
    }

    /// Whether `key` might be a member of the set that produced `bitmap`.
    /// `false` is a definitive answer; `true` may be a false positive.
    pub fn may_contain(&self, key: &[u8], bitmap: &[u8]) -> bool {
        if bitmap.is_empty() {
            return false;
        }
        let bitmap_bits = (bitmap.len() as u64) * 8;
        let h1 = murmur3_32(0xe2c6928a, key) as u64;
        let h2 = murmur3_32(0xbaea8a8f, key) as u64;
        for j in 0..self.k as u64 {
            let bit_pos = (h1.wrapping_add(j.wrapping_mul(h2)) % bitmap_bits) as usize;
            if bitmap[bit_pos / 8] & (1 << (bit_pos % 8)) == 0 {
                return false;
            }
        }
        true
    }

    fn info_suffix(&self) -> Vec<u8> {
        let mut out = INFO_PREFIX.to_vec();
        out.extend_from_slice(&self.bits_per_key.to_le_bytes());
        out
    }
}

/// Accumulates keys across a sequence of data blocks and produces one
/// bitmap per block.
#[derive(Debug)]
pub struct FilterBlockWriter {
    filter: BloomFilter,
    pending_keys: Vec<Vec<u8>>,
    offsets: Vec<u32>,
    buffer: Vec<u8>,
}

impl FilterBlockWriter {
    pub fn new(bits_per_key: u32) -> Self {
        Self {
            filter: BloomFilter::new(bits_per_key),
            pending_keys: Vec::new(),
            offsets: Vec::new(),
            buffer: Vec::new(),
        }
    }

    /// Records a key seen while building the current data block.
    pub fn update(&mut self, key: &[u8]) {
        self.pending_keys.push(key.to_vec());
    }

    /// Flushes buffered keys into a new bitmap, associated with the data
    /// block boundary just reached. A no-op if no keys are pending.
    pub fn keys_to_block(&mut self) {
        self.offsets.push(self.buffer.len() as u32);
        let bitmap = self.filter.build_bitmap(&self.pending_keys);
        self.buffer.extend_from_slice(&bitmap);
        self.pending_keys.clear();
    }

    /// Flushes any pending keys, then appends the offset array and filter
    /// metadata, and returns the complete filter block.
    pub fn finalize(mut self) -> Vec<u8> {
        if !self.pending_keys.is_empty() {
            self.keys_to_block();
        }

        let offsets_begin = self.buffer.len() as u32;
        let offsets_count = self.offsets.len() as u32;
        for &offset in &self.offsets {
            self.buffer.extend_from_slice(&offset.to_le_bytes());
        }
        self.buffer.extend_from_slice(&offsets_begin.to_le_bytes());
        self.buffer.extend_from_slice(&offsets_count.to_le_bytes());

        let info = self.filter.info_suffix();
        self.buffer.extend_from_slice(&info);
        self.buffer
            .extend_from_slice(&(info.len() as u32).to_le_bytes());
        self.buffer
    }
}

/// Parses and queries a filter block produced by [`FilterBlockWriter`].
#[derive(Debug)]
pub struct FilterBlockReader {
    bytes: Vec<u8>,
    filter: BloomFilter,
    offsets_begin: usize,
    offsets_count: usize,
}

impl FilterBlockReader {
    pub fn parse(bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() < 4 {
            return Err(Error::FilterBlock("filter block shorter than info_len".into()));
        }
        let info_len_offset = bytes.len() - 4;
        let info_len = u32::from_le_bytes(bytes[info_len_offset..].try_into().unwrap()) as usize;
        if info_len == 0 || info_len > info_len_offset {
            return Err(Error::FilterBlock(format!(
                "invalid filter info length {info_len}"
            )));
        }

        let info_offset = info_len_offset - info_len;
        let info = &bytes[info_offset..info_len_offset];
        if info.len() < INFO_PREFIX.len() || &info[..INFO_PREFIX.len()] != INFO_PREFIX {
            return Err(Error::FilterBlock(
                "unrecognized filter algorithm prefix".into(),
            ));
        }
        let bits_per_key_bytes = &info[INFO_PREFIX.len()..];
        if bits_per_key_bytes.len() < 4 {
            return Err(Error::FilterBlock("truncated bits_per_key field".into()));
        }
        let bits_per_key = u32::from_le_bytes(bits_per_key_bytes[..4].try_into().unwrap());
        let filter = BloomFilter::new(bits_per_key);

        if info_offset < 4 {
            return Err(Error::FilterBlock("missing offsets_count field".into()));
        }
        let offsets_count_offset = info_offset - 4;
        let offsets_count =
            u32::from_le_bytes(bytes[offsets_count_offset..offsets_count_offset + 4].try_into().unwrap())
                as usize;

        if offsets_count_offset < 4 {
            return Err(Error::FilterBlock("missing offsets_begin field".into()));
        }
        let offsets_begin_offset = offsets_count_offset - 4;
        let offsets_begin = u32::from_le_bytes(
            bytes[offsets_begin_offset..offsets_begin_offset + 4]
                .try_into()
                .unwrap(),
        ) as usize;

        if offsets_begin > offsets_begin_offset {
            return Err(Error::FilterBlock("offsets_begin out of range".into()));
        }
        if offsets_count > 0 {
            let first =
                u32::from_le_bytes(bytes[offsets_begin..offsets_begin + 4].try_into().unwrap());
            if first != 0 {
                return Err(Error::FilterBlock(
                    "first filter offset must be zero".into(),
                ));
            }
        }

        Ok(Self {
            bytes,
            filter,
            offsets_begin,
            offsets_count,
        })
    }

    fn bitmap_bounds(&self, block_index: usize) -> Option<(usize, usize)> {
        if block_index >= self.offsets_count {
            return None;
        }
        let entry = |i: usize| -> usize {
            let off = self.offsets_begin + i * 4;
            u32::from_le_bytes(self.bytes[off..off + 4].try_into().unwrap()) as usize
        };
        let start = entry(block_index);
        let end = if block_index + 1 == self.offsets_count {
            self.offsets_begin
        } else {
            entry(block_index + 1)
        };
        Some((start, end))
    }

    /// Whether `key` might be present in data block `block_index`. Returns
    /// `false` for an out-of-range block index.
    pub fn may_contain(&self, block_index: usize, key: &[u8]) -> bool {
        match self.bitmap_bounds(block_index) {
            Some((start, end)) if start <= end && end <= self.bytes.len() => {
                self.filter.may_contain(key, &self.bytes[start..end])
            }
            _ => false,
        }
    }
}
